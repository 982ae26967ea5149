pub mod error;
pub mod node;
pub mod parser;

pub use node::{Args, BinaryOp, Expr, Ident, Node, UnaryOp};
