use thiserror::Error;

use crate::value::ValueKind;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EvalError {
    #[error("Parameter \"{0}\" is not defined")]
    UnknownParameter(String),
    #[error("Parameter \"{0}\" is null")]
    NullParameter(String),
    #[error("Function \"{0}\" is not defined")]
    UnknownFunction(String),
    #[error("Function \"{0}\" is not defined, did you mean \"{1}\"?")]
    UnknownFunctionSuggestion(String, String),
    #[error("Invalid number of arguments in \"{0}\", expected {1} but got {2}")]
    InvalidNumberOfArguments(String, u8, u8),
    #[error("Operator \"{op}\" is not defined for {left} and {right}")]
    InvalidTypes {
        op: String,
        left: ValueKind,
        right: ValueKind,
    },
    #[error("Cannot convert {0} to {1}")]
    InvalidConversion(ValueKind, ValueKind),
    #[error("Arithmetic overflow in \"{0}\"")]
    Overflow(String),
    #[error("Division by zero")]
    ZeroDivision,
    #[error("Iterated parameters must have the same length, expected {0} but got {1}")]
    ParameterLengthMismatch(usize, usize),
}

impl EvalError {
    pub(crate) fn invalid_types(op: impl ToString, left: ValueKind, right: ValueKind) -> Self {
        EvalError::InvalidTypes {
            op: op.to_string(),
            left,
            right,
        }
    }
}
