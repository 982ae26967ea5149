use thiserror::Error;

use crate::value::ValueKind;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CompileError {
    #[error("Parameter \"{0}\" is not defined")]
    UnknownParameter(String),
    #[error("Context has no member \"{0}\"")]
    UnknownMember(String),
    #[error("Context has no method \"{0}\"")]
    UnknownMethod(String),
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
    #[error("Expression produces {got}, cannot return it as {expected}")]
    ReturnType { expected: ValueKind, got: ValueKind },
}

impl CompileError {
    pub(crate) fn invalid_types(op: impl ToString, left: ValueKind, right: ValueKind) -> Self {
        CompileError::InvalidTypes {
            op: op.to_string(),
            left,
            right,
        }
    }
}
