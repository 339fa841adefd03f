//! Arithmetic on quantities written with unit suffixes, like `1W * 10s`.
//!
//! Input is tokenized, parsed into a tree of [`Value`] nodes whose units are checked
//! as the tree is built, and then evaluated to a [`Quantity`]. A [`Session`] keeps the
//! variables that assignments such as `x = 5V` create.

pub mod ast;
pub mod diagnostic;
pub mod parser;
pub mod pretty_print;
pub mod quantity;
pub mod span;
pub mod tokenizer;
pub mod unit;
pub mod variable_bank;

use thiserror::Error;

pub use ast::{RuntimeError, Value};
pub use parser::ParseError;
pub use quantity::{Quantity, Real};
pub use unit::{BaseUnit, Unit};
pub use variable_bank::{VariableBank, VariableEntry};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EecalcError {
    #[error("{0}")]
    ParseError(ParseError),
    #[error("{0}")]
    RuntimeError(RuntimeError),
}

impl EecalcError {
    /// The unit, variable or arithmetic error behind this error, regardless of whether
    /// it surfaced while building the tree or while evaluating it.
    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            EecalcError::ParseError(ParseError {
                kind: parser::ParseErrorKind::RuntimeError(e),
                ..
            }) => Some(e),
            EecalcError::ParseError(_) => None,
            EecalcError::RuntimeError(e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, EecalcError>;

/// One evaluation session: a variable bank plus the operations that use it.
///
/// Sessions share nothing but the static unit catalog.
#[derive(Debug, Clone, Default)]
pub struct Session {
    variables: VariableBank,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the folded value tree for `input`. Assignments are not performed
    /// until the tree is passed to [`Session::evaluate_value`].
    pub fn parse(&mut self, input: &str) -> Result<Value> {
        parser::parse(input, &mut self.variables).map_err(EecalcError::ParseError)
    }

    pub fn evaluate_value(&mut self, value: &Value) -> Result<Quantity> {
        value
            .evaluate(&mut self.variables)
            .map_err(EecalcError::RuntimeError)
    }

    pub fn evaluate(&mut self, input: &str) -> Result<Quantity> {
        let value = self.parse(input)?;
        self.evaluate_value(&value)
    }

    pub fn variables(&self) -> &VariableBank {
        &self.variables
    }

    pub fn set_variable(&mut self, name: &str, quantity: Quantity) -> Result<()> {
        self.variables
            .assign(name, quantity)
            .map(|_| ())
            .map_err(|e| EecalcError::RuntimeError(e.into()))
    }
}
