pub mod error;
pub mod token;

use chrono::{NaiveDate, NaiveDateTime};
use compact_str::CompactString;
use error::LexerError;
use nom::Parser;
use nom::bytes::complete::{is_not, tag, take_until};
use nom::character::complete::{alphanumeric1, char, digit1, multispace0, none_of, one_of};
use nom::combinator::{map, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair};
use nom::{IResult, branch::alt};
use nom_locate::position;
use token::{Token, TokenKind};

use crate::range::{Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

pub struct Lexer;

impl Lexer {
    pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        let mut span = Span::new(input);

        loop {
            span = skip_spaces(span);

            if span.fragment().is_empty() {
                tokens.push(Token {
                    range: span.into(),
                    kind: TokenKind::Eof,
                });
                return Ok(tokens);
            }

            match token(span) {
                Ok((rest, tok)) => {
                    tokens.push(tok);
                    span = rest;
                }
                Err(_) => return Err(tokenize_error(span)),
            }
        }
    }
}

/// Classifies the text no token parser accepted into the most specific
/// error.
fn tokenize_error(span: Span) -> LexerError {
    let range: Range = span.into();
    let at = Range {
        start: range.start,
        end: range.start,
    };
    let fragment = span.fragment();
    let ch = fragment.chars().next().unwrap_or(' ');

    match ch {
        '#' => {
            let text = fragment[1..].split('#').next().unwrap_or_default();
            LexerError::InvalidDateTime(at, text.to_string())
        }
        '\'' | '"' => LexerError::UnterminatedString(at),
        _ if ch.is_ascii_digit() => {
            let text: String = fragment
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect();
            LexerError::InvalidNumber(at, text)
        }
        _ => LexerError::UnexpectedChar(at, ch),
    }
}

fn skip_spaces(input: Span) -> Span {
    multispace0::<Span, nom::error::Error<Span>>(input)
        .map(|(rest, _)| rest)
        .unwrap_or(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((
        date_time_literal,
        number_literal,
        empty_string,
        string_literal,
        bracket_ident,
        ident_or_keyword,
        operators,
        punctuations,
    ))
    .parse(input)
}

define_token_parser!(l_shift, "<<", TokenKind::LShift);
define_token_parser!(r_shift, ">>", TokenKind::RShift);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(ne_angle, "<>", TokenKind::NeEq);
define_token_parser!(ne_bang, "!=", TokenKind::NeEq);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(eq, "=", TokenKind::EqEq);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(bang, "!", TokenKind::Not);
define_token_parser!(and_and, "&&", TokenKind::And);
define_token_parser!(or_or, "||", TokenKind::Or);
define_token_parser!(amp, "&", TokenKind::Amp);
define_token_parser!(pipe, "|", TokenKind::Pipe);
define_token_parser!(caret, "^", TokenKind::Caret);
define_token_parser!(tilde, "~", TokenKind::Tilde);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(star, "*", TokenKind::Star);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(question, "?", TokenKind::Question);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(
    empty_single_quote,
    "''",
    TokenKind::StringLiteral(String::new())
);
define_token_parser!(
    empty_double_quote,
    "\"\"",
    TokenKind::StringLiteral(String::new())
);

fn operators(input: Span) -> IResult<Span, Token> {
    alt((
        alt((
            l_shift, r_shift, lte, gte, ne_angle, ne_bang, eq_eq, eq, lt, gt, bang,
        )),
        alt((
            and_and, or_or, amp, pipe, caret, tilde, plus, minus, star, slash, percent,
        )),
    ))
    .parse(input)
}

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((question, colon, comma, l_paren, r_paren)).parse(input)
}

fn empty_string(input: Span) -> IResult<Span, Token> {
    alt((empty_single_quote, empty_double_quote)).parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    let (span, digits) = recognize(pair(
        digit1,
        pair(
            opt(pair(char('.'), digit1)),
            opt(pair(one_of("eE"), pair(opt(one_of("+-")), digit1))),
        ),
    ))
    .parse(input)?;
    let fragment = digits.fragment();
    let kind = if fragment.contains(['.', 'e', 'E']) {
        fragment.parse::<f64>().map(TokenKind::FloatLiteral)
    } else {
        fragment
            .parse::<i64>()
            .map(TokenKind::IntLiteral)
            .or_else(|_| fragment.parse::<f64>().map(TokenKind::FloatLiteral))
    };

    match kind {
        Ok(kind) => Ok((
            span,
            Token {
                range: digits.into(),
                kind,
            },
        )),
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn date_time_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, text) = delimited(char('#'), take_until("#"), char('#')).parse(span)?;
    let (span, end) = position(span)?;

    match parse_date_time(text.fragment()) {
        Some(date_time) => Ok((
            span,
            Token {
                range: Range {
                    start: start.into(),
                    end: end.into(),
                },
                kind: TokenKind::DateTimeLiteral(date_time),
            },
        )),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        ))),
    }
}

pub(crate) fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%m/%d/%Y")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn quoted_string<'a>(
    input: Span<'a>,
    quote: char,
    normal: &'static str,
) -> IResult<Span<'a>, Token> {
    let (span, start) = position(input)?;
    let (span, text) = delimited(
        char(quote),
        escaped_text(normal),
        char(quote),
    )
    .parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::StringLiteral(text),
        },
    ))
}

fn escaped_text(normal: &'static str) -> impl FnMut(Span) -> IResult<Span, String> {
    move |input: Span| {
        nom::bytes::complete::escaped_transform(
            none_of(normal),
            '\\',
            alt((
                value('\\', char('\\')),
                value('\'', char('\'')),
                value('"', char('"')),
                value('\r', char('r')),
                value('\n', char('n')),
                value('\t', char('t')),
            )),
        )(input)
    }
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    alt((
        |input| quoted_string(input, '\'', "'\\"),
        |input| quoted_string(input, '"', "\"\\"),
    ))
    .parse(input)
}

fn bracket_ident(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, name) = delimited(char('['), is_not("]"), char(']')).parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::Ident(CompactString::from(name.fragment().trim())),
        },
    ))
}

fn ident_or_keyword(input: Span) -> IResult<Span, Token> {
    let (span, name) = recognize(pair(
        alt((nom::character::complete::alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)?;

    let kind = match name.fragment().to_ascii_lowercase().as_str() {
        "true" => TokenKind::BoolLiteral(true),
        "false" => TokenKind::BoolLiteral(false),
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => TokenKind::Ident(CompactString::from(*name.fragment())),
    };

    Ok((
        span,
        Token {
            range: name.into(),
            kind,
        },
    ))
}
