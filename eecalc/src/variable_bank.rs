use compact_str::CompactString;
use thiserror::Error;

use crate::quantity::{Quantity, Real};
use crate::unit::Unit;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariableError {
    #[error("Undefined variable: '{0}'")]
    Undefined(CompactString),

    #[error(
        "Cannot assign a value in {} to '{name}', which already holds {}",
        assigned.full_name(),
        fixed.full_name()
    )]
    UnitConflict {
        name: CompactString,
        fixed: Unit,
        assigned: Unit,
    },

    #[error("Cannot assign to '{0}', only variables can be assigned")]
    NotAssignable(CompactString),
}

type Result<T, E = VariableError> = std::result::Result<T, E>;

/// Index of an entry in a [`VariableBank`]. Only meaningful for the bank that handed it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    name: CompactString,
    unit: Unit,
    /// `None` until the first assignment has been evaluated.
    value: Option<Real>,
}

impl VariableEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn quantity(&self) -> Option<Quantity> {
        self.value.map(|value| Quantity::new(value, self.unit))
    }

    fn is_assigned(&self) -> bool {
        self.value.is_some()
    }

    fn check_unit(&self, unit: Unit) -> Result<()> {
        if self.is_assigned() && self.unit != unit {
            Err(VariableError::UnitConflict {
                name: self.name.clone(),
                fixed: self.unit,
                assigned: unit,
            })
        } else {
            Ok(())
        }
    }
}

/// Named, unit-tagged cells that live as long as an evaluation session.
///
/// Entries are never removed. A variable's unit is fixed by its first successful
/// assignment; later assignments have to use the same unit.
#[derive(Debug, Clone, Default)]
pub struct VariableBank {
    entries: Vec<VariableEntry>,
}

impl VariableBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, name: &str) -> Option<VariableId> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(VariableId)
    }

    pub fn get(&self, name: &str) -> Result<&VariableEntry> {
        self.find(name)
            .map(|VariableId(index)| &self.entries[index])
            .filter(|entry| entry.is_assigned())
            .ok_or_else(|| VariableError::Undefined(name.into()))
    }

    pub(crate) fn id_of(&self, name: &str) -> Result<VariableId> {
        let id = self
            .find(name)
            .ok_or_else(|| VariableError::Undefined(name.into()))?;
        if self.entries[id.0].is_assigned() {
            Ok(id)
        } else {
            Err(VariableError::Undefined(name.into()))
        }
    }

    pub fn assign(&mut self, name: &str, quantity: Quantity) -> Result<VariableId> {
        let id = self.declare(name, quantity.unit())?;
        self.assign_id(id, name, quantity)?;
        Ok(id)
    }

    /// Reserves an entry for a pending assignment of a value in `unit`.
    ///
    /// Fails if the variable already holds a value in a different unit. An entry that
    /// was declared but never assigned takes on the new unit.
    pub(crate) fn declare(&mut self, name: &str, unit: Unit) -> Result<VariableId> {
        match self.find(name) {
            Some(id) => {
                let entry = &mut self.entries[id.0];
                entry.check_unit(unit)?;
                entry.unit = unit;
                Ok(id)
            }
            None => {
                self.entries.push(VariableEntry {
                    name: name.into(),
                    unit,
                    value: None,
                });
                Ok(VariableId(self.entries.len() - 1))
            }
        }
    }

    pub(crate) fn assign_id(
        &mut self,
        id: VariableId,
        name: &str,
        quantity: Quantity,
    ) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id.0)
            .filter(|entry| entry.name == name)
            .ok_or_else(|| VariableError::Undefined(name.into()))?;
        entry.check_unit(quantity.unit())?;
        entry.unit = quantity.unit();
        entry.value = Some(quantity.value());
        Ok(())
    }

    pub(crate) fn read(&self, id: VariableId, name: &str) -> Result<Quantity> {
        self.entries
            .get(id.0)
            .filter(|entry| entry.name == name)
            .and_then(VariableEntry::quantity)
            .ok_or_else(|| VariableError::Undefined(name.into()))
    }

    /// All variables that currently hold a value, in order of first declaration.
    pub fn iter(&self) -> impl Iterator<Item = &VariableEntry> {
        self.entries.iter().filter(|entry| entry.is_assigned())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
