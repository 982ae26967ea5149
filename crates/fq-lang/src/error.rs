use itertools::Itertools;
use miette::{Diagnostic, LabeledSpan, SourceCode, SourceOffset, SourceSpan};
use thiserror::Error;

use crate::ast::error::ParseError;
use crate::compile::error::CompileError;
use crate::eval::error::EvalError;
use crate::lexer::error::LexerError;
use crate::range::Range;

/// One syntax problem with its position in the source text.
#[derive(Error, Debug, PartialEq, Clone)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: usize,
}

/// All syntax problems found in one parse.
#[derive(Error, Debug, PartialEq, Clone)]
pub struct SyntaxErrors(pub Vec<SyntaxError>);

impl std::fmt::Display for SyntaxErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().map(|e| e.to_string()).join("; "))
    }
}

impl From<LexerError> for SyntaxErrors {
    fn from(error: LexerError) -> Self {
        let range = error.range();
        SyntaxErrors(vec![SyntaxError {
            message: error.to_string(),
            line: range.start.line,
            column: range.start.column,
        }])
    }
}

impl From<ParseError> for SyntaxErrors {
    fn from(error: ParseError) -> Self {
        let range = error.token().map(|t| t.range).unwrap_or(Range::default());
        SyntaxErrors(vec![SyntaxError {
            message: error.to_string(),
            line: range.start.line,
            column: range.start.column,
        }])
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum InnerError {
    #[error("{0}")]
    Syntax(SyntaxErrors),
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("{0}")]
    Compile(#[from] CompileError),
}

/// The error surfaced to callers: the underlying cause plus the source text
/// and the offset to point at when rendering a diagnostic.
#[derive(Error, Debug, PartialEq, Clone)]
#[error("{cause}")]
pub struct Error {
    pub cause: InnerError,
    source_code: String,
    location: SourceSpan,
}

impl Error {
    pub(crate) fn from_syntax(errors: SyntaxErrors, source_code: String) -> Self {
        let location = errors
            .0
            .first()
            .map(|e| {
                SourceSpan::new(
                    SourceOffset::from_location(&source_code, e.line as usize, e.column),
                    1,
                )
            })
            .unwrap_or_else(|| {
                SourceSpan::new(SourceOffset::from_location(&source_code, 0, 0), 1)
            });

        Self {
            cause: InnerError::Syntax(errors),
            source_code,
            location,
        }
    }

    pub(crate) fn from_eval(error: EvalError, source_code: String) -> Self {
        let location = SourceSpan::new(SourceOffset::from_location(&source_code, 0, 0), 1);
        Self {
            cause: InnerError::Eval(error),
            source_code,
            location,
        }
    }

    pub(crate) fn from_compile(error: CompileError, source_code: String) -> Self {
        let location = SourceSpan::new(SourceOffset::from_location(&source_code, 0, 0), 1);
        Self {
            cause: InnerError::Compile(error),
            source_code,
            location,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match &self.cause {
            InnerError::Syntax(_) => "fq::syntax",
            InnerError::Eval(_) => "fq::eval",
            InnerError::Compile(_) => "fq::compile",
        };
        Some(Box::new(code))
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.source_code)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.cause.to_string()),
            self.location,
        ))))
    }
}
