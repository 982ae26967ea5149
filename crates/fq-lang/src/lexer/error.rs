use thiserror::Error;

use crate::range::Range;

#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    #[error("Unexpected character `{1}`")]
    UnexpectedChar(Range, char),
    #[error("Invalid date time literal `{1}`")]
    InvalidDateTime(Range, String),
    #[error("Invalid number literal `{1}`")]
    InvalidNumber(Range, String),
    #[error("Unterminated string literal")]
    UnterminatedString(Range),
}

impl LexerError {
    pub fn range(&self) -> &Range {
        match self {
            LexerError::UnexpectedChar(range, _) => range,
            LexerError::InvalidDateTime(range, _) => range,
            LexerError::InvalidNumber(range, _) => range,
            LexerError::UnterminatedString(range) => range,
        }
    }
}
