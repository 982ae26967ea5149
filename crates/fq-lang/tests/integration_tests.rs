use std::sync::Arc;

use fq_lang::{
    EvalError, EvaluateOptions, Expression, ExpressionCache, FunctionCall, InnerError,
    LambdaContext, ParameterRequest, Value, ValueKind,
};
use rstest::rstest;

fn cache() -> Arc<ExpressionCache> {
    Arc::new(ExpressionCache::new())
}

#[rstest]
#[case::addition("2 + 3 + 5", Value::I64(10))]
#[case::grouping("2 * (3 + 5)", Value::I64(16))]
#[case::division_is_floating("3/6", Value::F64(0.5))]
#[case::ternary("1+2<3 ? 3+4 : 1", Value::I64(1))]
#[case::comparison("2 < 3", Value::TRUE)]
#[case::angle_not_equal("1 <> 2", Value::TRUE)]
#[case::single_equals("1 = 1", Value::TRUE)]
#[case::string_concat("'ab' + 'cd'", Value::from("abcd"))]
#[case::logic_keywords("true and not false", Value::TRUE)]
#[case::bitwise("(6 & 3) | 8", Value::I64(10))]
#[case::shift("1 << 4", Value::I64(16))]
#[case::builtin_pow("POW(2, 10)", Value::F64(1024.0))]
#[case::builtin_max("MAX(2, 2.5)", Value::F64(2.5))]
#[case::builtin_sign("SIGN(-7)", Value::I32(-1))]
#[case::in_function("IN(2, 1, 2, 3)", Value::TRUE)]
#[case::if_function("IF(2 > 1, 'yes', 'no')", Value::from("yes"))]
fn test_evaluate(#[case] source: &str, #[case] expected: Value) {
    let expr = Expression::new(source).with_cache(cache());
    assert_eq!(expr.evaluate().unwrap(), expected);
}

#[rstest]
#[case("1 +")]
#[case("(1 + 2")]
#[case("1 ? 2")]
#[case("@")]
fn test_syntax_errors(#[case] source: &str) {
    let expr = Expression::new(source).with_cache(cache());
    assert!(expr.has_errors());
    assert!(matches!(
        expr.evaluate().unwrap_err().cause,
        InnerError::Syntax(_)
    ));
}

#[test]
fn test_lowercase_in_with_bracketed_parameters() {
    let mut expr = Expression::new("in((2+2), [a], [b], 1+2, 4, 1/0)").with_cache(cache());
    expr.set_parameter("a", 2i64);
    expr.set_parameter("b", 5i64);
    assert_eq!(expr.evaluate().unwrap(), Value::TRUE);
}

#[test]
fn test_in_stops_at_first_match() {
    // the `1 % 0` candidate would raise ZeroDivision, but the match on 4
    // is found first
    let mut expr = Expression::new("IN((2 + 2), [a], [b], 1 + 2, 4, 1 % 0)").with_cache(cache());
    expr.set_parameter("a", 2i64);
    expr.set_parameter("b", 5i64);
    assert_eq!(expr.evaluate().unwrap(), Value::TRUE);
}

#[test]
fn test_date_time_comparison() {
    let expr = Expression::new("#2020-06-01# < #2020-07-01#").with_cache(cache());
    assert_eq!(expr.evaluate().unwrap(), Value::TRUE);
}

#[test]
fn test_bracketed_parameter_names() {
    let mut expr = Expression::new("[unit price] * 2").with_cache(cache());
    expr.set_parameter("unit price", 3i64);
    assert_eq!(expr.evaluate().unwrap(), Value::I64(6));
}

#[test]
fn test_overflow_protection() {
    let source = "2147483647 + 1";
    // i64 literals do not overflow here, so force the narrow kind
    let mut wrapping = Expression::new("x + y").with_cache(cache());
    wrapping.set_parameter("x", i32::MAX);
    wrapping.set_parameter("y", 1i32);
    assert_eq!(wrapping.evaluate().unwrap(), Value::I32(i32::MIN));

    let mut checked =
        Expression::with_options("x + y", EvaluateOptions::OVERFLOW_PROTECTION).with_cache(cache());
    checked.set_parameter("x", i32::MAX);
    checked.set_parameter("y", 1i32);
    assert!(matches!(
        checked.evaluate().unwrap_err().cause,
        InnerError::Eval(EvalError::Overflow(_))
    ));

    let plain = Expression::new(source).with_cache(cache());
    assert_eq!(plain.evaluate().unwrap(), Value::I64(2147483648));
}

#[test]
fn test_iterated_parameters() {
    let mut expr =
        Expression::with_options("x * x", EvaluateOptions::ITERATE_PARAMETERS).with_cache(cache());
    expr.set_parameter_list("x", (0..5i64).map(Value::from).collect());

    assert_eq!(
        expr.evaluate().unwrap(),
        Value::List(vec![
            Value::I64(0),
            Value::I64(1),
            Value::I64(4),
            Value::I64(9),
            Value::I64(16),
        ])
    );
}

#[test]
fn test_hooks_compose() {
    let mut expr = Expression::new("clamp(raw, 0, 10)").with_cache(cache());
    expr.add_function_hook(|ctx: &mut FunctionCall<'_>| {
        if ctx.name() == "clamp" {
            let values = ctx.evaluate_args()?;
            let clamped = match (&values[0], &values[1], &values[2]) {
                (Value::I64(v), Value::I64(lo), Value::I64(hi)) => *v.max(lo).min(hi),
                _ => return Ok(()),
            };
            ctx.set_result(Value::I64(clamped));
        }
        Ok(())
    });
    expr.add_parameter_hook(|request: &mut ParameterRequest<'_>| {
        if request.name() == "raw" {
            request.set_result(Value::I64(42));
        }
        Ok(())
    });

    assert_eq!(expr.evaluate().unwrap(), Value::I64(10));
}

#[test]
fn test_cache_shares_trees_between_expressions() {
    let shared = cache();
    let a = Expression::new("1 + 2 * 3").with_cache(Arc::clone(&shared));
    let b = Expression::new("1 + 2 * 3").with_cache(Arc::clone(&shared));

    a.evaluate().unwrap();
    b.evaluate().unwrap();
    assert_eq!(shared.len(), 1);
}

#[derive(Clone, Copy)]
struct Order {
    qty: i64,
    price: f64,
}

impl LambdaContext for Order {
    const FIELDS: &'static [(&'static str, ValueKind)] = &[
        ("qty", ValueKind::I64),
        ("price", ValueKind::F64),
    ];
    const METHODS: &'static [(&'static str, ValueKind)] = &[("total", ValueKind::F64)];

    fn field(&self, index: usize) -> Value {
        match index {
            0 => Value::I64(self.qty),
            _ => Value::F64(self.price),
        }
    }

    fn call_method(&self, index: usize, _args: Vec<Value>) -> Result<Value, EvalError> {
        match index {
            0 => Ok(Value::F64(self.qty as f64 * self.price)),
            _ => Ok(Value::Null),
        }
    }
}

#[test]
fn test_lambda_with_context() {
    let expr = Expression::new("total() > 100 or qty == 0").with_cache(cache());
    let lambda = expr.to_lambda_with_context::<Order, bool>().unwrap();

    assert!(lambda(&Order { qty: 50, price: 2.5 }).unwrap());
    assert!(lambda(&Order { qty: 0, price: 2.5 }).unwrap());
    assert!(!lambda(&Order { qty: 1, price: 2.5 }).unwrap());
}

#[test]
fn test_lambda_bakes_parameters() {
    let mut expr = Expression::new("base * factor").with_cache(cache());
    expr.set_parameter("base", 6i64);
    expr.set_parameter("factor", 7i64);

    let lambda = expr.to_lambda::<i64>().unwrap();
    assert_eq!(lambda().unwrap(), 42);

    // rebinding after compilation does not affect the compiled callable
    expr.set_parameter("factor", 0i64);
    assert_eq!(lambda().unwrap(), 42);
}

#[test]
fn test_backends_agree() {
    let sources = [
        "2 + 3 * 4",
        "3 / 6",
        "MAX(1, 2.5) + MIN(0, -1)",
        "IN(2, 1, 2) ? 'yes' : 'no'",
        "ROUND(2.5, 0)",
        "-5 % 3",
    ];

    for source in sources {
        let expr = Expression::new(source).with_cache(cache());
        let interpreted = expr.evaluate().unwrap();
        let compiled = expr.to_lambda::<Value>().unwrap()().unwrap();
        assert_eq!(interpreted, compiled, "backends disagree on {source}");
    }
}
