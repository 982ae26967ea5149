use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::ast::BinaryOp;
use crate::eval::error::EvalError;
use crate::options::EvaluateOptions;
use crate::value::{Value, ValueKind};

/// Widening rules for arithmetic. Mixing `U64` with a signed integer has no
/// common type and is rejected. Division of integers promotes to `F64` so
/// that `3 / 6` yields `0.5`.
pub(crate) fn promote(left: ValueKind, right: ValueKind, op: BinaryOp) -> Option<ValueKind> {
    use ValueKind::*;

    if (left == U64 && right.is_signed()) || (right == U64 && left.is_signed()) {
        return None;
    }

    let target = if left == Decimal || right == Decimal {
        Decimal
    } else if left == F64 || right == F64 {
        F64
    } else if left == F32 || right == F32 {
        F32
    } else if op == BinaryOp::Div {
        F64
    } else if left == U64 || right == U64 {
        U64
    } else if left == I64 || right == I64 {
        I64
    } else if (left == U32 && right.is_signed()) || (right == U32 && left.is_signed()) {
        I64
    } else if left == U32 || right == U32 {
        U32
    } else {
        I32
    };

    Some(target)
}

/// Rewrites a non-numeric operand into the numeric value arithmetic uses for
/// it, or `None` when the operand cannot take part in arithmetic at all.
fn normalize(value: Value, options: EvaluateOptions) -> Option<Value> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok().map(Value::Decimal),
        Value::Bool(b) => options
            .contains(EvaluateOptions::BOOLEAN_CALCULATION)
            .then_some(Value::I32(b as i32)),
        Value::Null | Value::DateTime(_) | Value::List(_) => None,
        numeric => Some(numeric),
    }
}

fn as_i128(value: &Value) -> Option<i128> {
    match value {
        Value::I8(n) => Some(*n as i128),
        Value::I16(n) => Some(*n as i128),
        Value::I32(n) => Some(*n as i128),
        Value::I64(n) => Some(*n as i128),
        Value::U8(n) => Some(*n as i128),
        Value::U16(n) => Some(*n as i128),
        Value::U32(n) => Some(*n as i128),
        Value::U64(n) => Some(*n as i128),
        Value::F32(n) => Some(*n as i128),
        Value::F64(n) => Some(*n as i128),
        Value::Decimal(d) => d.trunc().to_i128(),
        Value::Bool(b) => Some(*b as i128),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i128>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i128))
        }
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::I8(n) => Some(*n as f64),
        Value::I16(n) => Some(*n as f64),
        Value::I32(n) => Some(*n as f64),
        Value::I64(n) => Some(*n as f64),
        Value::U8(n) => Some(*n as f64),
        Value::U16(n) => Some(*n as f64),
        Value::U32(n) => Some(*n as f64),
        Value::U64(n) => Some(*n as f64),
        Value::F32(n) => Some(*n as f64),
        Value::F64(n) => Some(*n),
        Value::Decimal(d) => d.to_f64(),
        Value::Bool(b) => Some(*b as i32 as f64),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::I8(n) => Some(Decimal::from(*n)),
        Value::I16(n) => Some(Decimal::from(*n)),
        Value::I32(n) => Some(Decimal::from(*n)),
        Value::I64(n) => Some(Decimal::from(*n)),
        Value::U8(n) => Some(Decimal::from(*n)),
        Value::U16(n) => Some(Decimal::from(*n)),
        Value::U32(n) => Some(Decimal::from(*n)),
        Value::U64(n) => Some(Decimal::from(*n)),
        Value::F32(n) => Decimal::from_f32(*n),
        Value::F64(n) => Decimal::from_f64(*n),
        Value::Decimal(d) => Some(*d),
        Value::Bool(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn make_int(kind: ValueKind, n: i128) -> Value {
    match kind {
        ValueKind::I8 => Value::I8(n as i8),
        ValueKind::I16 => Value::I16(n as i16),
        ValueKind::I32 => Value::I32(n as i32),
        ValueKind::I64 => Value::I64(n as i64),
        ValueKind::U8 => Value::U8(n as u8),
        ValueKind::U16 => Value::U16(n as u16),
        ValueKind::U32 => Value::U32(n as u32),
        _ => Value::U64(n as u64),
    }
}

/// Converts `value` to `kind`, parsing strings and truncating floats where
/// necessary.
pub(crate) fn convert(value: Value, kind: ValueKind) -> Result<Value, EvalError> {
    let from = value.kind();

    if from == kind {
        return Ok(value);
    }

    let err = || EvalError::InvalidConversion(from, kind);

    match kind {
        _ if kind.is_integer() => as_i128(&value).map(|n| make_int(kind, n)).ok_or_else(err),
        ValueKind::F32 => as_f64(&value).map(|n| Value::F32(n as f32)).ok_or_else(err),
        ValueKind::F64 => as_f64(&value).map(Value::F64).ok_or_else(err),
        ValueKind::Decimal => as_decimal(&value).map(Value::Decimal).ok_or_else(err),
        ValueKind::Bool => match &value {
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(Value::TRUE),
                "false" => Ok(Value::FALSE),
                _ => Err(err()),
            },
            _ => as_f64(&value).map(|n| Value::Bool(n != 0.0)).ok_or_else(err),
        },
        ValueKind::String => Ok(Value::String(value.to_string())),
        ValueKind::DateTime => match &value {
            Value::String(s) => crate::lexer::parse_date_time(s)
                .map(Value::DateTime)
                .ok_or_else(err),
            _ => Err(err()),
        },
        _ => Err(err()),
    }
}

/// Like [`convert`], but a null operand becomes the zero value of `kind`.
/// Used by the compiled backend where operand kinds are fixed up front.
pub(crate) fn convert_or_default(value: Value, kind: ValueKind) -> Result<Value, EvalError> {
    if value.is_null() {
        Ok(Value::default_of(kind))
    } else {
        convert(value, kind)
    }
}

macro_rules! int_arith {
    ($op:expr, $a:expr, $b:expr, $checked:expr, $ctor:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinaryOp::Plus => {
                if $checked {
                    a.checked_add(b)
                        .map($ctor)
                        .ok_or_else(|| EvalError::Overflow($op.to_string()))
                } else {
                    Ok($ctor(a.wrapping_add(b)))
                }
            }
            BinaryOp::Minus => {
                if $checked {
                    a.checked_sub(b)
                        .map($ctor)
                        .ok_or_else(|| EvalError::Overflow($op.to_string()))
                } else {
                    Ok($ctor(a.wrapping_sub(b)))
                }
            }
            BinaryOp::Times => {
                if $checked {
                    a.checked_mul(b)
                        .map($ctor)
                        .ok_or_else(|| EvalError::Overflow($op.to_string()))
                } else {
                    Ok($ctor(a.wrapping_mul(b)))
                }
            }
            BinaryOp::Modulo => {
                if b == 0 {
                    Err(EvalError::ZeroDivision)
                } else if $checked {
                    a.checked_rem(b)
                        .map($ctor)
                        .ok_or_else(|| EvalError::Overflow($op.to_string()))
                } else {
                    Ok($ctor(a.wrapping_rem(b)))
                }
            }
            op => Err(EvalError::invalid_types(op, $ctor(a).kind(), $ctor(b).kind())),
        }
    }};
}

macro_rules! float_arith {
    ($op:expr, $a:expr, $b:expr, $ctor:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinaryOp::Plus => Ok($ctor(a + b)),
            BinaryOp::Minus => Ok($ctor(a - b)),
            BinaryOp::Times => Ok($ctor(a * b)),
            BinaryOp::Div => Ok($ctor(a / b)),
            BinaryOp::Modulo => Ok($ctor(a % b)),
            op => Err(EvalError::invalid_types(op, $ctor(a).kind(), $ctor(b).kind())),
        }
    }};
}

fn decimal_arith(op: BinaryOp, a: Decimal, b: Decimal) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Plus => a.checked_add(b),
        BinaryOp::Minus => a.checked_sub(b),
        BinaryOp::Times => a.checked_mul(b),
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(EvalError::ZeroDivision);
            }
            a.checked_div(b)
        }
        BinaryOp::Modulo => {
            if b.is_zero() {
                return Err(EvalError::ZeroDivision);
            }
            a.checked_rem(b)
        }
        op => {
            return Err(EvalError::invalid_types(
                op,
                ValueKind::Decimal,
                ValueKind::Decimal,
            ));
        }
    };

    result
        .map(Value::Decimal)
        .ok_or_else(|| EvalError::Overflow(op.to_string()))
}

/// Applies an arithmetic operator to two operands of the same kind. Integer
/// operations wrap unless `checked` is set, decimal operations are always
/// checked.
pub(crate) fn apply_arith(
    op: BinaryOp,
    left: Value,
    right: Value,
    checked: bool,
) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::I8(a), Value::I8(b)) => int_arith!(op, a, b, checked, Value::I8),
        (Value::I16(a), Value::I16(b)) => int_arith!(op, a, b, checked, Value::I16),
        (Value::I32(a), Value::I32(b)) => int_arith!(op, a, b, checked, Value::I32),
        (Value::I64(a), Value::I64(b)) => int_arith!(op, a, b, checked, Value::I64),
        (Value::U8(a), Value::U8(b)) => int_arith!(op, a, b, checked, Value::U8),
        (Value::U16(a), Value::U16(b)) => int_arith!(op, a, b, checked, Value::U16),
        (Value::U32(a), Value::U32(b)) => int_arith!(op, a, b, checked, Value::U32),
        (Value::U64(a), Value::U64(b)) => int_arith!(op, a, b, checked, Value::U64),
        (Value::F32(a), Value::F32(b)) => float_arith!(op, a, b, Value::F32),
        (Value::F64(a), Value::F64(b)) => float_arith!(op, a, b, Value::F64),
        (Value::Decimal(a), Value::Decimal(b)) => decimal_arith(op, a, b),
        (l, r) => Err(EvalError::invalid_types(op, l.kind(), r.kind())),
    }
}

/// Evaluates `left op right` for an arithmetic operator, applying the
/// widening and string/boolean rewrite rules first.
pub(crate) fn arith(
    op: BinaryOp,
    left: Value,
    right: Value,
    options: EvaluateOptions,
) -> Result<Value, EvalError> {
    let (lk, rk) = (left.kind(), right.kind());

    // A string on the left of `+` concatenates instead of adding.
    if op == BinaryOp::Plus
        && let Value::String(s) = &left
    {
        return Ok(Value::String(format!("{}{}", s, right)));
    }

    let invalid = || EvalError::invalid_types(op, lk, rk);
    let l = normalize(left, options).ok_or_else(invalid)?;
    let r = normalize(right, options).ok_or_else(invalid)?;

    let target = promote(l.kind(), r.kind(), op).ok_or_else(invalid)?;
    let l = convert(l, target)?;
    let r = convert(r, target)?;

    apply_arith(op, l, r, options.contains(EvaluateOptions::OVERFLOW_PROTECTION))
}

/// The common kind two operands are brought to before a comparison. The first
/// kind of the priority list present on either side wins; when neither side
/// matches, the left operand's kind does.
pub(crate) fn comparison_kind(left: ValueKind, right: ValueKind) -> ValueKind {
    const PRIORITY: [ValueKind; 5] = [
        ValueKind::I64,
        ValueKind::F64,
        ValueKind::Bool,
        ValueKind::String,
        ValueKind::Decimal,
    ];

    for kind in PRIORITY {
        if left == kind || right == kind {
            return kind;
        }
    }

    left
}

fn cmp_same(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::I8(a), Value::I8(b)) => Some(a.cmp(b)),
        (Value::I16(a), Value::I16(b)) => Some(a.cmp(b)),
        (Value::I32(a), Value::I32(b)) => Some(a.cmp(b)),
        (Value::I64(a), Value::I64(b)) => Some(a.cmp(b)),
        (Value::U8(a), Value::U8(b)) => Some(a.cmp(b)),
        (Value::U16(a), Value::U16(b)) => Some(a.cmp(b)),
        (Value::U32(a), Value::U32(b)) => Some(a.cmp(b)),
        (Value::U64(a), Value::U64(b)) => Some(a.cmp(b)),
        (Value::F32(a), Value::F32(b)) => a.partial_cmp(b),
        (Value::F64(a), Value::F64(b)) => a.partial_cmp(b),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Evaluates a comparison operator. Null compares equal only to null and has
/// no ordering.
pub(crate) fn compare(
    op: BinaryOp,
    left: Value,
    right: Value,
    options: EvaluateOptions,
) -> Result<bool, EvalError> {
    let (lk, rk) = (left.kind(), right.kind());

    if left.is_null() || right.is_null() {
        let both_null = left.is_null() && right.is_null();
        return match op {
            BinaryOp::Equal => Ok(both_null),
            BinaryOp::NotEqual => Ok(!both_null),
            op => Err(EvalError::invalid_types(op, lk, rk)),
        };
    }

    let kind = comparison_kind(lk, rk);
    let l = convert(left, kind)?;
    let r = convert(right, kind)?;

    let (l, r) = match (l, r) {
        (Value::String(a), Value::String(b))
            if options.contains(EvaluateOptions::MATCH_STRINGS_WITH_IGNORE_CASE)
                && !options.contains(EvaluateOptions::MATCH_STRINGS_ORDINAL) =>
        {
            (
                Value::String(a.to_lowercase()),
                Value::String(b.to_lowercase()),
            )
        }
        pair => pair,
    };

    match op {
        BinaryOp::Equal => Ok(l == r),
        BinaryOp::NotEqual => Ok(l != r),
        op => match cmp_same(&l, &r) {
            Some(ordering) => Ok(match op {
                BinaryOp::Greater => ordering.is_gt(),
                BinaryOp::GreaterOrEqual => ordering.is_ge(),
                BinaryOp::Lesser => ordering.is_lt(),
                BinaryOp::LesserOrEqual => ordering.is_le(),
                _ => false,
            }),
            // NaN orders as false, anything else without an ordering is a
            // type error.
            None if kind.is_floating() => Ok(false),
            None => Err(EvalError::invalid_types(op, lk, rk)),
        },
    }
}

/// The target kind for `MAX`/`MIN`: floating beats integer, then the wider
/// bit width wins.
pub(crate) fn widest_kind(left: ValueKind, right: ValueKind) -> ValueKind {
    match (left.is_floating(), right.is_floating()) {
        (true, false) => left,
        (false, true) => right,
        _ => {
            if right.bit_width() > left.bit_width() {
                right
            } else {
                left
            }
        }
    }
}

fn extreme(
    name: &str,
    left: Value,
    right: Value,
    want_greater: bool,
) -> Result<Value, EvalError> {
    if left.is_null() {
        return Ok(right);
    }
    if right.is_null() {
        return Ok(left);
    }

    let (lk, rk) = (left.kind(), right.kind());
    let kind = if lk.is_numeric() && rk.is_numeric() {
        widest_kind(lk, rk)
    } else if lk == rk {
        lk
    } else {
        return Err(EvalError::invalid_types(name, lk, rk));
    };

    let l = convert(left, kind)?;
    let r = convert(right, kind)?;
    let ordering = cmp_same(&l, &r).unwrap_or(Ordering::Equal);

    if (ordering == Ordering::Less) == want_greater {
        Ok(r)
    } else {
        Ok(l)
    }
}

pub(crate) fn max_value(left: Value, right: Value) -> Result<Value, EvalError> {
    extreme("MAX", left, right, true)
}

pub(crate) fn min_value(left: Value, right: Value) -> Result<Value, EvalError> {
    extreme("MIN", left, right, false)
}

/// Evaluates a bitwise or shift operator. Operands must be integers; with a
/// `U64` on either side both go to `U64`, otherwise both go to `I64`.
pub(crate) fn bitwise(
    op: BinaryOp,
    left: Value,
    right: Value,
    options: EvaluateOptions,
) -> Result<Value, EvalError> {
    let (lk, rk) = (left.kind(), right.kind());
    let invalid = || EvalError::invalid_types(op, lk, rk);

    if !lk.is_integer() || !rk.is_integer() {
        return Err(invalid());
    }

    let checked = options.contains(EvaluateOptions::OVERFLOW_PROTECTION);

    match op {
        BinaryOp::LeftShift | BinaryOp::RightShift => {
            let count = as_i128(&right).ok_or_else(invalid)? as u32;
            let overflow = || EvalError::Overflow(op.to_string());

            match convert(left, if lk == ValueKind::U64 { lk } else { ValueKind::I64 })? {
                Value::U64(a) => {
                    let shifted = match (op, checked) {
                        (BinaryOp::LeftShift, true) => a.checked_shl(count).ok_or_else(overflow)?,
                        (BinaryOp::LeftShift, false) => a.wrapping_shl(count),
                        (_, true) => a.checked_shr(count).ok_or_else(overflow)?,
                        (_, false) => a.wrapping_shr(count),
                    };
                    Ok(Value::U64(shifted))
                }
                Value::I64(a) => {
                    let shifted = match (op, checked) {
                        (BinaryOp::LeftShift, true) => a.checked_shl(count).ok_or_else(overflow)?,
                        (BinaryOp::LeftShift, false) => a.wrapping_shl(count),
                        (_, true) => a.checked_shr(count).ok_or_else(overflow)?,
                        (_, false) => a.wrapping_shr(count),
                    };
                    Ok(Value::I64(shifted))
                }
                _ => Err(invalid()),
            }
        }
        _ => {
            let unsigned = lk == ValueKind::U64 || rk == ValueKind::U64;
            if unsigned && (lk.is_signed() || rk.is_signed()) {
                return Err(invalid());
            }

            let target = if unsigned { ValueKind::U64 } else { ValueKind::I64 };
            match (convert(left, target)?, convert(right, target)?) {
                (Value::U64(a), Value::U64(b)) => Ok(Value::U64(match op {
                    BinaryOp::BitwiseAnd => a & b,
                    BinaryOp::BitwiseOr => a | b,
                    _ => a ^ b,
                })),
                (Value::I64(a), Value::I64(b)) => Ok(Value::I64(match op {
                    BinaryOp::BitwiseAnd => a & b,
                    BinaryOp::BitwiseOr => a | b,
                    _ => a ^ b,
                })),
                _ => Err(invalid()),
            }
        }
    }
}

pub(crate) fn bitwise_not(value: Value, _options: EvaluateOptions) -> Result<Value, EvalError> {
    let kind = value.kind();
    let invalid = || EvalError::invalid_types("~", kind, kind);

    if !kind.is_integer() {
        return Err(invalid());
    }

    match convert(value, if kind == ValueKind::U64 { kind } else { ValueKind::I64 })? {
        Value::U64(a) => Ok(Value::U64(!a)),
        Value::I64(a) => Ok(Value::I64(!a)),
        _ => Err(invalid()),
    }
}

/// Unary minus, expressed as `0 - operand` so it shares the widening rules.
pub(crate) fn negate(value: Value, options: EvaluateOptions) -> Result<Value, EvalError> {
    arith(BinaryOp::Minus, Value::I32(0), value, options)
}
