use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use crate::number;
use crate::options::EvaluateOptions;
use crate::value::{Value, ValueKind};

use super::error::EvalError;

type BuiltinFn = fn(&str, &[Value], EvaluateOptions) -> Result<Value, EvalError>;

pub(crate) struct BuiltinFunction {
    pub num_params: u8,
    pub func: BuiltinFn,
}

impl BuiltinFunction {
    const fn new(num_params: u8, func: BuiltinFn) -> Self {
        Self { num_params, func }
    }
}

/// Builtin math functions, keyed by their canonical uppercase spelling.
/// `IF` and `IN` are not here; they need lazy arguments and live in the
/// interpreter itself.
pub(crate) static BUILTIN_FUNCTIONS: LazyLock<FxHashMap<&'static str, BuiltinFunction>> =
    LazyLock::new(|| {
        FxHashMap::from_iter([
            ("ABS", BuiltinFunction::new(1, abs)),
            ("ACOS", BuiltinFunction::new(1, acos)),
            ("ASIN", BuiltinFunction::new(1, asin)),
            ("ATAN", BuiltinFunction::new(1, atan)),
            ("CEILING", BuiltinFunction::new(1, ceiling)),
            ("COS", BuiltinFunction::new(1, cos)),
            ("EXP", BuiltinFunction::new(1, exp)),
            ("FLOOR", BuiltinFunction::new(1, floor)),
            ("IEEEREMAINDER", BuiltinFunction::new(2, ieee_remainder)),
            ("LOG", BuiltinFunction::new(2, log)),
            ("LOG10", BuiltinFunction::new(1, log10)),
            ("MAX", BuiltinFunction::new(2, max)),
            ("MIN", BuiltinFunction::new(2, min)),
            ("POW", BuiltinFunction::new(2, pow)),
            ("ROUND", BuiltinFunction::new(2, round)),
            ("SIGN", BuiltinFunction::new(1, sign)),
            ("SIN", BuiltinFunction::new(1, sin)),
            ("SQRT", BuiltinFunction::new(1, sqrt)),
            ("TAN", BuiltinFunction::new(1, tan)),
            ("TRUNCATE", BuiltinFunction::new(1, truncate)),
        ])
    });

fn to_double(value: &Value) -> Result<f64, EvalError> {
    match number::convert(value.clone(), ValueKind::F64)? {
        Value::F64(n) => Ok(n),
        value => Err(EvalError::InvalidConversion(value.kind(), ValueKind::F64)),
    }
}

fn unary_double(args: &[Value], f: fn(f64) -> f64) -> Result<Value, EvalError> {
    to_double(&args[0]).map(|x| Value::F64(f(x)))
}

fn abs(_name: &str, args: &[Value], options: EvaluateOptions) -> Result<Value, EvalError> {
    if options.contains(EvaluateOptions::USE_DOUBLE_FOR_ABS) {
        unary_double(args, f64::abs)
    } else {
        match number::convert(args[0].clone(), ValueKind::Decimal)? {
            Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
            value => Err(EvalError::InvalidConversion(value.kind(), ValueKind::Decimal)),
        }
    }
}

fn acos(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::acos)
}

fn asin(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::asin)
}

fn atan(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::atan)
}

fn ceiling(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::ceil)
}

fn cos(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::cos)
}

fn exp(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::exp)
}

fn floor(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::floor)
}

fn ieee_remainder(
    _name: &str,
    args: &[Value],
    _options: EvaluateOptions,
) -> Result<Value, EvalError> {
    let x = to_double(&args[0])?;
    let y = to_double(&args[1])?;
    Ok(Value::F64(x - y * (x / y).round_ties_even()))
}

fn log(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    let value = to_double(&args[0])?;
    let base = to_double(&args[1])?;
    Ok(Value::F64(value.log(base)))
}

fn log10(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::log10)
}

fn max(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    number::max_value(args[0].clone(), args[1].clone())
}

fn min(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    number::min_value(args[0].clone(), args[1].clone())
}

fn pow(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    let x = to_double(&args[0])?;
    let y = to_double(&args[1])?;
    Ok(Value::F64(x.powf(y)))
}

fn round(_name: &str, args: &[Value], options: EvaluateOptions) -> Result<Value, EvalError> {
    let value = to_double(&args[0])?;
    let digits = match number::convert(args[1].clone(), ValueKind::I32)? {
        Value::I32(n) => n,
        value => return Err(EvalError::InvalidConversion(value.kind(), ValueKind::I32)),
    };

    let factor = 10f64.powi(digits);
    let scaled = value * factor;
    let rounded = if options.contains(EvaluateOptions::ROUND_AWAY_FROM_ZERO) {
        scaled.round()
    } else {
        scaled.round_ties_even()
    };

    Ok(Value::F64(rounded / factor))
}

fn sign(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    let x = to_double(&args[0])?;
    let sign = if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    };
    Ok(Value::I32(sign))
}

fn sin(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::sin)
}

fn sqrt(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::sqrt)
}

fn tan(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::tan)
}

fn truncate(_name: &str, args: &[Value], _options: EvaluateOptions) -> Result<Value, EvalError> {
    unary_double(args, f64::trunc)
}
