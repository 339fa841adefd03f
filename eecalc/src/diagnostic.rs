use codespan_reporting::diagnostic::LabelStyle;

use crate::ast::{ArithmeticError, RuntimeError};
use crate::parser::{ParseError, ParseErrorKind};
use crate::variable_bank::VariableError;
use crate::EecalcError;

/// Diagnostics refer to the single line that was evaluated, so there is no file id.
pub type Diagnostic = codespan_reporting::diagnostic::Diagnostic<()>;

pub trait ErrorDiagnostic {
    fn diagnostic(&self) -> Diagnostic;
}

fn is_unit_error(error: &RuntimeError) -> bool {
    matches!(
        error,
        RuntimeError::UnitMismatch(_)
            | RuntimeError::Variable(VariableError::UnitConflict { .. })
            | RuntimeError::Arithmetic(ArithmeticError::NonScalarPower { .. })
    )
}

impl ErrorDiagnostic for ParseError {
    fn diagnostic(&self) -> Diagnostic {
        let message = match &self.kind {
            ParseErrorKind::TokenizerError(_) => "while tokenizing",
            ParseErrorKind::UnexpectedToken { .. } | ParseErrorKind::InvalidNumber(_) => {
                "while parsing"
            }
            ParseErrorKind::RuntimeError(e) if is_unit_error(e) => "while checking units",
            ParseErrorKind::RuntimeError(_) => "runtime error",
        };

        Diagnostic::error()
            .with_message(message)
            .with_labels(vec![self
                .span
                .diagnostic_label(LabelStyle::Primary)
                .with_message(self.kind.to_string())])
    }
}

impl ErrorDiagnostic for RuntimeError {
    fn diagnostic(&self) -> Diagnostic {
        let message = if is_unit_error(self) {
            "while checking units"
        } else {
            "runtime error"
        };
        Diagnostic::error()
            .with_message(message)
            .with_notes(vec![self.to_string()])
    }
}

impl ErrorDiagnostic for EecalcError {
    fn diagnostic(&self) -> Diagnostic {
        match self {
            EecalcError::ParseError(e) => e.diagnostic(),
            EecalcError::RuntimeError(e) => e.diagnostic(),
        }
    }
}
