use std::sync::Arc;

use crate::{
    lexer::token::{Token, TokenKind},
    range::Range,
    value::Value,
};

use super::error::ParseError;
use super::node::{Args, BinaryOp, Expr, Ident, Node, UnaryOp};

/// Precedence-climbing parser over the token stream. One instance per parse.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

/// Left/right binding powers for a binary operator token.
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8, u8)> {
    let op = match kind {
        TokenKind::Or => (BinaryOp::Or, 1, 2),
        TokenKind::And => (BinaryOp::And, 3, 4),
        TokenKind::Pipe => (BinaryOp::BitwiseOr, 5, 6),
        TokenKind::Caret => (BinaryOp::BitwiseXor, 7, 8),
        TokenKind::Amp => (BinaryOp::BitwiseAnd, 9, 10),
        TokenKind::EqEq => (BinaryOp::Equal, 11, 12),
        TokenKind::NeEq => (BinaryOp::NotEqual, 11, 12),
        TokenKind::Lt => (BinaryOp::Lesser, 13, 14),
        TokenKind::Lte => (BinaryOp::LesserOrEqual, 13, 14),
        TokenKind::Gt => (BinaryOp::Greater, 13, 14),
        TokenKind::Gte => (BinaryOp::GreaterOrEqual, 13, 14),
        TokenKind::LShift => (BinaryOp::LeftShift, 15, 16),
        TokenKind::RShift => (BinaryOp::RightShift, 15, 16),
        TokenKind::Plus => (BinaryOp::Plus, 17, 18),
        TokenKind::Minus => (BinaryOp::Minus, 17, 18),
        TokenKind::Star => (BinaryOp::Times, 19, 20),
        TokenKind::Slash => (BinaryOp::Div, 19, 20),
        TokenKind::Percent => (BinaryOp::Modulo, 19, 20),
        _ => return None,
    };
    Some(op)
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Arc<Node>, ParseError> {
        let node = self.parse_ternary()?;
        let token = self.peek();

        if token.is_eof() {
            Ok(node)
        } else {
            Err(ParseError::UnexpectedToken(token.clone()))
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        self.pos += 1;
        token
    }

    fn parse_ternary(&mut self) -> Result<Arc<Node>, ParseError> {
        let cond = self.parse_binary(0)?;

        if matches!(self.peek().kind, TokenKind::Question) {
            self.advance();
            let then = self.parse_ternary()?;

            if !matches!(self.peek().kind, TokenKind::Colon) {
                return Err(ParseError::ExpectedColon(self.peek().clone()));
            }
            self.advance();

            let otherwise = self.parse_ternary()?;
            let range = Range::new(cond.range.start, otherwise.range.end);
            Ok(Arc::new(Node::new(
                range,
                Expr::Ternary(cond, then, otherwise),
            )))
        } else {
            Ok(cond)
        }
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<Arc<Node>, ParseError> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, l_bp, r_bp)) = binary_op(&self.peek().kind) {
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(r_bp)?;
            let range = Range::new(lhs.range.start, rhs.range.end);
            lhs = Arc::new(Node::new(range, Expr::Binary(op, lhs, rhs)));
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Arc<Node>, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Tilde => Some(UnaryOp::BitwiseNot),
            _ => None,
        };

        match op {
            Some(op) => {
                let start = self.advance().range.start;
                let operand = self.parse_unary()?;
                let range = Range::new(start, operand.range.end);
                Ok(Arc::new(Node::new(range, Expr::Unary(op, operand))))
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Arc<Node>, ParseError> {
        let token = self.advance().clone();

        match &token.kind {
            TokenKind::IntLiteral(n) => Ok(Arc::new(Node::new(
                token.range,
                Expr::Literal(Value::I64(*n)),
            ))),
            TokenKind::FloatLiteral(n) => Ok(Arc::new(Node::new(
                token.range,
                Expr::Literal(Value::F64(*n)),
            ))),
            TokenKind::StringLiteral(s) => Ok(Arc::new(Node::new(
                token.range,
                Expr::Literal(Value::String(s.clone())),
            ))),
            TokenKind::BoolLiteral(b) => Ok(Arc::new(Node::new(
                token.range,
                Expr::Literal(Value::Bool(*b)),
            ))),
            TokenKind::DateTimeLiteral(dt) => Ok(Arc::new(Node::new(
                token.range,
                Expr::Literal(Value::DateTime(*dt)),
            ))),
            TokenKind::Ident(name) => {
                if matches!(self.peek().kind, TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    let end = self.peek().range.end;

                    if !matches!(self.peek().kind, TokenKind::RParen) {
                        return Err(ParseError::ExpectedClosingParen(self.peek().clone()));
                    }
                    self.advance();

                    Ok(Arc::new(Node::new(
                        Range::new(token.range.start, end),
                        Expr::Call(Ident::new(name), args),
                    )))
                } else {
                    Ok(Arc::new(Node::new(
                        token.range,
                        Expr::Ident(Ident::new(name)),
                    )))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_ternary()?;

                if !matches!(self.peek().kind, TokenKind::RParen) {
                    return Err(ParseError::ExpectedClosingParen(self.peek().clone()));
                }
                let end = self.advance().range.end;

                Ok(Arc::new(Node::new(
                    Range::new(token.range.start, end),
                    (*inner.expr).clone(),
                )))
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEofDetected),
            _ => Err(ParseError::UnexpectedToken(token)),
        }
    }

    fn parse_args(&mut self) -> Result<Args, ParseError> {
        let mut args = Args::new();

        if matches!(self.peek().kind, TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_ternary()?);

            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                _ => return Ok(args),
            }
        }
    }
}
