//! A small dynamically typed formula language.
//!
//! Formulas are parsed into an immutable tree and evaluated either by a
//! tree-walking interpreter or compiled into a native callable. Parsed trees
//! are shared through a cache that holds them only as long as some
//! expression still uses them.
//!
//! ```rust
//! use fq_lang::{Expression, Value};
//!
//! let mut expr = Expression::new("price * qty");
//! expr.set_parameter("price", 2.5f64);
//! expr.set_parameter("qty", 4i64);
//!
//! assert_eq!(expr.evaluate().unwrap(), Value::F64(10.0));
//! ```
//!
//! Compiled lambdas read their identifiers from a host context:
//!
//! ```rust
//! use fq_lang::{Expression, LambdaContext, Value, ValueKind};
//!
//! struct Sensor {
//!     reading: f64,
//! }
//!
//! impl LambdaContext for Sensor {
//!     const FIELDS: &'static [(&'static str, ValueKind)] = &[("reading", ValueKind::F64)];
//!
//!     fn field(&self, _index: usize) -> Value {
//!         Value::F64(self.reading)
//!     }
//! }
//!
//! let expr = Expression::new("reading > 20.0");
//! let lambda = expr.to_lambda_with_context::<Sensor, bool>().unwrap();
//! assert!(lambda(&Sensor { reading: 21.5 }).unwrap());
//! ```

mod ast;
mod cache;
mod compile;
mod error;
mod eval;
mod expression;
mod lexer;
mod number;
mod options;
mod range;
mod value;

use std::sync::Arc;

pub use ast::error::ParseError;
pub use ast::{Args, BinaryOp, Expr, Ident, Node, UnaryOp};
pub use cache::ExpressionCache;
pub use compile::error::CompileError;
pub use compile::{FromValue, LambdaContext};
pub use error::{Error, InnerError, SyntaxError, SyntaxErrors};
pub use eval::error::EvalError;
pub use eval::{
    FunctionCall, FunctionHook, Parameter, ParameterHook, ParameterRequest, Parameters,
};
pub use expression::Expression;
pub use lexer::Lexer;
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use options::EvaluateOptions;
pub use range::{Position, Range};
pub use value::{Value, ValueKind};

/// Parses a formula into its tree without building an [`Expression`].
pub fn parse(code: &str) -> Result<Arc<Node>, SyntaxErrors> {
    let tokens = Lexer::tokenize(code).map_err(SyntaxErrors::from)?;
    ast::parser::Parser::new(&tokens)
        .parse()
        .map_err(SyntaxErrors::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(parse("1 + 2 * 3").is_ok());
        assert!(parse("1 +").is_err());
        assert!(parse("@").is_err());
    }
}
