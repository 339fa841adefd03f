use compact_str::CompactString;
use thiserror::Error;

use crate::pretty_print::PrettyPrint;
use crate::quantity::{Quantity, Real};
use crate::unit::{Unit, UnitMismatch};
use crate::variable_bank::{VariableBank, VariableError, VariableId};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArithmeticError {
    #[error("Division by zero: {lhs} {operator} {rhs}")]
    DivisionByZero {
        operator: BinaryOperator,
        lhs: Quantity,
        rhs: Quantity,
    },

    #[error("Exponent must be an integer, got {0}")]
    NonIntegerExponent(Real),

    #[error(
        "Exponentiation is only defined for scalars, got {} ^ {}",
        base.full_name(),
        exponent.full_name()
    )]
    NonScalarPower { base: Unit, exponent: Unit },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error(transparent)]
    UnitMismatch(#[from] UnitMismatch),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

type Result<T, E = RuntimeError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    /// Stores the right-hand side in the variable on the left and yields it.
    AssignUpdate,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::AssignUpdate => "=",
        }
    }

    fn result_unit(self, lhs: Unit, rhs: Unit) -> Result<Unit> {
        match self {
            BinaryOperator::Add | BinaryOperator::Subtract => Ok(lhs.same_as(rhs)?),
            BinaryOperator::Multiply => Ok(lhs.multiply(rhs)?),
            BinaryOperator::Divide => Ok(lhs.divide(rhs)?),
            BinaryOperator::Power if lhs.is_scalar() && rhs.is_scalar() => Ok(Unit::scalar()),
            BinaryOperator::Power => Err(ArithmeticError::NonScalarPower {
                base: lhs,
                exponent: rhs,
            }
            .into()),
            BinaryOperator::AssignUpdate => Ok(rhs),
        }
    }

    /// The numeric part of the operation. Shared by constant folding and evaluation.
    fn apply(self, lhs: Quantity, rhs: Quantity) -> Result<Real, ArithmeticError> {
        let (l, r) = (lhs.value(), rhs.value());
        let division_by_zero = || ArithmeticError::DivisionByZero {
            operator: self,
            lhs,
            rhs,
        };

        match self {
            BinaryOperator::Add => Ok(l + r),
            BinaryOperator::Subtract => Ok(l - r),
            BinaryOperator::Multiply => Ok(l * r),
            BinaryOperator::Divide if r == 0.0 => Err(division_by_zero()),
            BinaryOperator::Divide => Ok(l / r),
            BinaryOperator::Power => {
                if r.fract() != 0.0 {
                    return Err(ArithmeticError::NonIntegerExponent(r));
                }
                if l == 0.0 && r < 0.0 {
                    return Err(division_by_zero());
                }
                if r.abs() <= Real::from(i32::MAX) {
                    Ok(l.powi(r as i32))
                } else {
                    Ok(l.powf(r))
                }
            }
            BinaryOperator::AssignUpdate => Ok(r),
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    AbsoluteValue,
}

impl UnaryOperator {
    fn apply(self, value: Real) -> Real {
        match self {
            UnaryOperator::Negate => -value,
            UnaryOperator::AbsoluteValue => value.abs(),
        }
    }
}

/// A reference to a variable bank entry. The tree never owns the entry; its value is
/// read through the bank whenever the node is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub name: CompactString,
    pub(crate) id: VariableId,
    pub unit: Unit,
}

/// A node of the unit-checked value tree.
///
/// The unit of every node is determined when the node is built. Nodes whose operands
/// are all constants are folded into a single [`Value::Constant`] right away.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Constant(Quantity),
    BinaryOp {
        op: BinaryOperator,
        lhs: Box<Value>,
        rhs: Box<Value>,
        unit: Unit,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Value>,
    },
    Variable(VariableRef),
}

impl Value {
    pub fn constant(value: Real, unit: Unit) -> Self {
        Value::Constant(Quantity::new(value, unit))
    }

    /// Builds `lhs op rhs`, checking units and folding constant operands.
    ///
    /// Assignments need a declared target and are built by the parser, so
    /// [`BinaryOperator::AssignUpdate`] is rejected here.
    pub fn binary(op: BinaryOperator, lhs: Value, rhs: Value) -> Result<Value> {
        if op == BinaryOperator::AssignUpdate {
            return Err(VariableError::NotAssignable(lhs.pretty_print().into()).into());
        }

        let unit = op.result_unit(lhs.unit(), rhs.unit())?;

        match (&lhs, &rhs) {
            (Value::Constant(l), Value::Constant(r)) => {
                Ok(Value::Constant(Quantity::new(op.apply(*l, *r)?, unit)))
            }
            _ => Ok(Value::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                unit,
            }),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Value) -> Value {
        match operand {
            Value::Constant(q) => Value::constant(op.apply(q.value()), q.unit()),
            operand => Value::UnaryOp {
                op,
                operand: Box::new(operand),
            },
        }
    }

    /// Never folded, since evaluating it has a side effect on the bank.
    pub(crate) fn assignment(target: VariableRef, rhs: Value) -> Value {
        let unit = rhs.unit();
        Value::BinaryOp {
            op: BinaryOperator::AssignUpdate,
            lhs: Box::new(Value::Variable(target)),
            rhs: Box::new(rhs),
            unit,
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            Value::Constant(q) => q.unit(),
            Value::BinaryOp { unit, .. } => *unit,
            Value::UnaryOp { operand, .. } => operand.unit(),
            Value::Variable(variable) => variable.unit,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }

    pub fn evaluate(&self, bank: &mut VariableBank) -> Result<Quantity> {
        match self {
            Value::Constant(q) => Ok(*q),
            Value::BinaryOp {
                op: BinaryOperator::AssignUpdate,
                lhs,
                rhs,
                unit,
            } => {
                let Value::Variable(target) = lhs.as_ref() else {
                    return Err(VariableError::NotAssignable(lhs.pretty_print().into()).into());
                };
                let value = Quantity::new(rhs.evaluate(bank)?.value(), *unit);
                bank.assign_id(target.id, &target.name, value)?;
                Ok(value)
            }
            Value::BinaryOp { op, lhs, rhs, unit } => {
                let l = lhs.evaluate(bank)?;
                let r = rhs.evaluate(bank)?;
                Ok(Quantity::new(op.apply(l, r)?, *unit))
            }
            Value::UnaryOp { op, operand } => {
                let q = operand.evaluate(bank)?;
                Ok(Quantity::new(op.apply(q.value()), q.unit()))
            }
            Value::Variable(variable) => Ok(bank.read(variable.id, &variable.name)?),
        }
    }

    pub fn as_real(&self, bank: &mut VariableBank) -> Result<Real> {
        Ok(self.evaluate(bank)?.value())
    }
}

impl PrettyPrint for BinaryOperator {
    fn pretty_print(&self) -> String {
        match self {
            BinaryOperator::Multiply => " × ".into(),
            BinaryOperator::Power => "^".into(),
            op => format!(" {} ", op.symbol()),
        }
    }
}

impl PrettyPrint for Value {
    fn pretty_print(&self) -> String {
        match self {
            Value::Constant(q) => q.pretty_print().into(),
            Value::Variable(variable) => variable.name.to_string(),
            Value::BinaryOp {
                op: BinaryOperator::AssignUpdate,
                lhs,
                rhs,
                ..
            } => format!("{} = {}", lhs.pretty_print(), rhs.pretty_print()),
            Value::BinaryOp { op, lhs, rhs, .. } => format!(
                "({}{}{})",
                lhs.pretty_print(),
                op.pretty_print(),
                rhs.pretty_print()
            ),
            Value::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => format!("-({})", operand.pretty_print()),
            Value::UnaryOp {
                op: UnaryOperator::AbsoluteValue,
                operand,
            } => format!("abs({})", operand.pretty_print()),
        }
    }
}

#[cfg(test)]
macro_rules! constant {
    ( $value:expr ) => {{
        $crate::ast::Value::Constant($crate::quantity::Quantity::from_scalar($value))
    }};
    ( $value:expr, $unit:ident ) => {{
        $crate::ast::Value::constant(
            $value,
            $crate::unit::Unit::new($crate::unit::BaseUnit::$unit),
        )
    }};
}

#[cfg(test)]
macro_rules! binop {
    ( $lhs:expr, $op:ident, $rhs:expr, $unit:ident ) => {{
        $crate::ast::Value::BinaryOp {
            op: $crate::ast::BinaryOperator::$op,
            lhs: Box::new($lhs),
            rhs: Box::new($rhs),
            unit: $crate::unit::Unit::new($crate::unit::BaseUnit::$unit),
        }
    }};
}

#[cfg(test)]
macro_rules! unop {
    ( $op:ident, $operand:expr ) => {{
        $crate::ast::Value::UnaryOp {
            op: $crate::ast::UnaryOperator::$op,
            operand: Box::new($operand),
        }
    }};
}

#[cfg(test)]
pub(crate) use binop;
#[cfg(test)]
pub(crate) use constant;
#[cfg(test)]
pub(crate) use unop;
