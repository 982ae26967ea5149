use thiserror::Error;

use crate::lexer::token::Token;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    UnexpectedToken(Token),
    #[error("Unexpected EOF detected")]
    UnexpectedEofDetected,
    #[error("Expected a closing parenthesis `)` but got `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedClosingParen(Token),
    #[error("Expected `:` in ternary expression but got `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedColon(Token),
}

impl ParseError {
    pub fn token(&self) -> Option<&Token> {
        match self {
            ParseError::UnexpectedToken(token) => Some(token),
            ParseError::UnexpectedEofDetected => None,
            ParseError::ExpectedClosingParen(token) => Some(token),
            ParseError::ExpectedColon(token) => Some(token),
        }
    }
}
