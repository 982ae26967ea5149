pub mod error;

use std::sync::Arc;

use crate::ast::{Args, BinaryOp, Expr, Ident, Node, UnaryOp};
use crate::eval::builtin::BUILTIN_FUNCTIONS;
use crate::eval::error::EvalError;
use crate::eval::{Parameter, Parameters};
use crate::number;
use crate::options::EvaluateOptions;
use crate::value::{Value, ValueKind};

use error::CompileError;

/// Host data a compiled expression reads its identifiers and method calls
/// from. Field and method tables are fixed at compile time; lookups resolve
/// to indices once, never per call. Contexts are owned types; the compiled
/// closures capture no borrows from them.
pub trait LambdaContext: 'static {
    const FIELDS: &'static [(&'static str, ValueKind)] = &[];
    const METHODS: &'static [(&'static str, ValueKind)] = &[];

    fn field(&self, index: usize) -> Value {
        let _ = index;
        Value::Null
    }

    fn call_method(&self, index: usize, args: Vec<Value>) -> Result<Value, EvalError> {
        let _ = (index, args);
        Ok(Value::Null)
    }
}

impl LambdaContext for () {}

/// Conversion from a runtime [`Value`] into the host type a lambda returns.
pub trait FromValue: Sized {
    /// The kind this type expects; `Null` means any kind is accepted.
    const KIND: ValueKind;

    fn from_value(value: Value) -> Result<Self, EvalError>;
}

macro_rules! impl_from_value {
    ($ty:ty, $kind:expr, $variant:ident) => {
        impl FromValue for $ty {
            const KIND: ValueKind = $kind;

            fn from_value(value: Value) -> Result<Self, EvalError> {
                match number::convert(value, $kind)? {
                    Value::$variant(n) => Ok(n),
                    value => Err(EvalError::InvalidConversion(value.kind(), $kind)),
                }
            }
        }
    };
}

impl_from_value!(i8, ValueKind::I8, I8);
impl_from_value!(i16, ValueKind::I16, I16);
impl_from_value!(i32, ValueKind::I32, I32);
impl_from_value!(i64, ValueKind::I64, I64);
impl_from_value!(u8, ValueKind::U8, U8);
impl_from_value!(u16, ValueKind::U16, U16);
impl_from_value!(u32, ValueKind::U32, U32);
impl_from_value!(u64, ValueKind::U64, U64);
impl_from_value!(f32, ValueKind::F32, F32);
impl_from_value!(f64, ValueKind::F64, F64);
impl_from_value!(rust_decimal::Decimal, ValueKind::Decimal, Decimal);
impl_from_value!(bool, ValueKind::Bool, Bool);
impl_from_value!(String, ValueKind::String, String);

impl FromValue for Value {
    const KIND: ValueKind = ValueKind::Null;

    fn from_value(value: Value) -> Result<Self, EvalError> {
        Ok(value)
    }
}

type RunFn<C> = Box<dyn Fn(&C) -> Result<Value, EvalError>>;

/// A lowered expression: a ready-to-run closure plus the kind it produces,
/// determined entirely at compile time.
pub(crate) struct Lowered<C> {
    pub(crate) run: RunFn<C>,
    pub(crate) kind: ValueKind,
}

pub(crate) fn compile<C: LambdaContext>(
    node: &Arc<Node>,
    parameters: &Parameters,
    options: EvaluateOptions,
) -> Result<Lowered<C>, CompileError> {
    Compiler {
        options,
        parameters,
    }
    .lower(node)
}

/// Rejects a lambda whose result kind can never convert into `T`.
pub(crate) fn check_return<T: FromValue>(kind: ValueKind) -> Result<(), CompileError> {
    let expected = T::KIND;
    let ok = expected == ValueKind::Null
        || kind == ValueKind::Null
        || expected == kind
        || expected == ValueKind::String
        || ((expected.is_numeric() || expected == ValueKind::Bool)
            && (kind.is_numeric() || kind == ValueKind::Bool || kind == ValueKind::String))
        || (expected == ValueKind::DateTime && kind == ValueKind::String);

    if ok {
        Ok(())
    } else {
        Err(CompileError::ReturnType {
            expected,
            got: kind,
        })
    }
}

struct Compiler<'a> {
    options: EvaluateOptions,
    parameters: &'a Parameters,
}

impl<'a> Compiler<'a> {
    fn lower<C: LambdaContext>(&self, node: &Arc<Node>) -> Result<Lowered<C>, CompileError> {
        match &*node.expr {
            Expr::Literal(value) => Ok(Self::constant(value.clone())),
            Expr::Ident(ident) => self.lower_ident(ident),
            Expr::Unary(op, operand) => self.lower_unary(*op, operand),
            Expr::Binary(op, left, right) => self.lower_binary(*op, left, right),
            Expr::Ternary(cond, then, otherwise) => {
                self.lower_conditional("?:", cond, then, otherwise)
            }
            Expr::Call(ident, args) => self.lower_call(ident, args),
        }
    }

    fn constant<C>(value: Value) -> Lowered<C> {
        let kind = value.kind();
        Lowered {
            run: Box::new(move |_| Ok(value.clone())),
            kind,
        }
    }

    fn lower_ident<C: LambdaContext>(&self, ident: &Ident) -> Result<Lowered<C>, CompileError> {
        let name = ident.as_str();

        if let Some(index) = C::FIELDS
            .iter()
            .position(|(field, _)| field.eq_ignore_ascii_case(name))
        {
            return Ok(Lowered {
                run: Box::new(move |ctx: &C| Ok(ctx.field(index))),
                kind: C::FIELDS[index].1,
            });
        }

        // Bag parameters are baked in as compile-time constants.
        let ignore_case = self.options.contains(EvaluateOptions::IGNORE_CASE);
        match self.parameters.get(name, ignore_case) {
            Some(Parameter::Value(value)) => Ok(Self::constant(value.clone())),
            Some(Parameter::Expression(node)) => self.lower(node),
            None if C::FIELDS.is_empty() => {
                Err(CompileError::UnknownParameter(name.to_string()))
            }
            None => Err(CompileError::UnknownMember(name.to_string())),
        }
    }

    /// The kind an operand takes in arithmetic: strings parse as decimal,
    /// booleans count as `I32` when the option allows, null defers to the
    /// other side.
    fn arith_operand(&self, kind: ValueKind) -> Result<Option<ValueKind>, ()> {
        match kind {
            ValueKind::String => Ok(Some(ValueKind::Decimal)),
            ValueKind::Bool => {
                if self.options.contains(EvaluateOptions::BOOLEAN_CALCULATION) {
                    Ok(Some(ValueKind::I32))
                } else {
                    Err(())
                }
            }
            ValueKind::Null => Ok(None),
            ValueKind::DateTime | ValueKind::List => Err(()),
            numeric => Ok(Some(numeric)),
        }
    }

    fn arith_kind(
        &self,
        op: BinaryOp,
        left: ValueKind,
        right: ValueKind,
    ) -> Result<ValueKind, CompileError> {
        let invalid = || CompileError::invalid_types(op, left, right);
        let l = self.arith_operand(left).map_err(|_| invalid())?;
        let r = self.arith_operand(right).map_err(|_| invalid())?;

        let (l, r) = match (l, r) {
            (None, None) => (ValueKind::I32, ValueKind::I32),
            (Some(k), None) | (None, Some(k)) => (k, k),
            (Some(l), Some(r)) => (l, r),
        };

        number::promote(l, r, op).ok_or_else(invalid)
    }

    fn lower_unary<C: LambdaContext>(
        &self,
        op: UnaryOp,
        operand: &Arc<Node>,
    ) -> Result<Lowered<C>, CompileError> {
        let lowered = self.lower(operand)?;
        let options = self.options;

        match op {
            UnaryOp::Not => {
                if !matches!(lowered.kind, ValueKind::Bool | ValueKind::Null) {
                    return Err(CompileError::invalid_types("!", lowered.kind, ValueKind::Bool));
                }
                let run = lowered.run;
                Ok(Lowered {
                    run: Box::new(move |ctx| {
                        let value = run(ctx)?;
                        match value.as_bool() {
                            Some(b) => Ok(Value::Bool(!b)),
                            None => Err(EvalError::invalid_types(
                                "!",
                                value.kind(),
                                ValueKind::Bool,
                            )),
                        }
                    }),
                    kind: ValueKind::Bool,
                })
            }
            UnaryOp::Negate => {
                let kind = self.arith_kind(BinaryOp::Minus, ValueKind::I32, lowered.kind)?;
                let run = lowered.run;
                Ok(Lowered {
                    run: Box::new(move |ctx| {
                        number::negate(number::convert_or_default(run(ctx)?, kind)?, options)
                    }),
                    kind,
                })
            }
            UnaryOp::BitwiseNot => {
                if !lowered.kind.is_integer() && lowered.kind != ValueKind::Null {
                    return Err(CompileError::invalid_types("~", lowered.kind, lowered.kind));
                }
                let kind = if lowered.kind == ValueKind::U64 {
                    ValueKind::U64
                } else {
                    ValueKind::I64
                };
                let run = lowered.run;
                Ok(Lowered {
                    run: Box::new(move |ctx| {
                        number::bitwise_not(
                            number::convert_or_default(run(ctx)?, kind)?,
                            options,
                        )
                    }),
                    kind,
                })
            }
        }
    }

    fn lower_binary<C: LambdaContext>(
        &self,
        op: BinaryOp,
        left: &Arc<Node>,
        right: &Arc<Node>,
    ) -> Result<Lowered<C>, CompileError> {
        let l = self.lower(left)?;
        let r = self.lower(right)?;
        let options = self.options;
        let checked = options.contains(EvaluateOptions::OVERFLOW_PROTECTION);

        match op {
            BinaryOp::And | BinaryOp::Or => {
                for kind in [l.kind, r.kind] {
                    if !matches!(kind, ValueKind::Bool | ValueKind::Null) {
                        return Err(CompileError::invalid_types(op, l.kind, r.kind));
                    }
                }

                let (lrun, rrun) = (l.run, r.run);
                let and = op == BinaryOp::And;
                Ok(Lowered {
                    run: Box::new(move |ctx| {
                        let op = if and { "&&" } else { "||" };
                        let to_bool = |value: Value| {
                            value.as_bool().ok_or_else(|| {
                                EvalError::invalid_types(op, value.kind(), ValueKind::Bool)
                            })
                        };

                        let left = to_bool(lrun(ctx)?)?;
                        if left != and {
                            return Ok(Value::Bool(left));
                        }
                        to_bool(rrun(ctx)?).map(Value::Bool)
                    }),
                    kind: ValueKind::Bool,
                })
            }
            op if op.is_comparison() => {
                let (lrun, rrun) = (l.run, r.run);
                Ok(Lowered {
                    run: Box::new(move |ctx| {
                        number::compare(op, lrun(ctx)?, rrun(ctx)?, options).map(Value::Bool)
                    }),
                    kind: ValueKind::Bool,
                })
            }
            op if op.is_arithmetic() => {
                if op == BinaryOp::Plus && l.kind == ValueKind::String {
                    let (lrun, rrun) = (l.run, r.run);
                    return Ok(Lowered {
                        run: Box::new(move |ctx| {
                            Ok(Value::String(format!("{}{}", lrun(ctx)?, rrun(ctx)?)))
                        }),
                        kind: ValueKind::String,
                    });
                }

                let kind = self.arith_kind(op, l.kind, r.kind)?;
                let (lrun, rrun) = (l.run, r.run);
                Ok(Lowered {
                    run: Box::new(move |ctx| {
                        let l = number::convert_or_default(lrun(ctx)?, kind)?;
                        let r = number::convert_or_default(rrun(ctx)?, kind)?;
                        number::apply_arith(op, l, r, checked)
                    }),
                    kind,
                })
            }
            op => {
                for kind in [l.kind, r.kind] {
                    if !kind.is_integer() && kind != ValueKind::Null {
                        return Err(CompileError::invalid_types(op, l.kind, r.kind));
                    }
                }

                let unsigned = l.kind == ValueKind::U64 || r.kind == ValueKind::U64;
                if unsigned && (l.kind.is_signed() || r.kind.is_signed()) {
                    return Err(CompileError::invalid_types(op, l.kind, r.kind));
                }

                let kind = if unsigned { ValueKind::U64 } else { ValueKind::I64 };
                let (lrun, rrun) = (l.run, r.run);
                Ok(Lowered {
                    run: Box::new(move |ctx| {
                        let l = number::convert_or_default(lrun(ctx)?, kind)?;
                        let r = number::convert_or_default(rrun(ctx)?, kind)?;
                        number::bitwise(op, l, r, options)
                    }),
                    kind,
                })
            }
        }
    }

    fn branch_kind(
        &self,
        op: &str,
        then: ValueKind,
        otherwise: ValueKind,
    ) -> Result<ValueKind, CompileError> {
        if then == otherwise {
            return Ok(then);
        }
        if then == ValueKind::Null {
            return Ok(otherwise);
        }
        if otherwise == ValueKind::Null {
            return Ok(then);
        }
        if then.is_numeric() && otherwise.is_numeric() {
            return number::promote(then, otherwise, BinaryOp::Plus)
                .ok_or_else(|| CompileError::invalid_types(op, then, otherwise));
        }

        Err(CompileError::invalid_types(op, then, otherwise))
    }

    fn lower_conditional<C: LambdaContext>(
        &self,
        op: &'static str,
        cond: &Arc<Node>,
        then: &Arc<Node>,
        otherwise: &Arc<Node>,
    ) -> Result<Lowered<C>, CompileError> {
        let cond = self.lower(cond)?;
        if !matches!(cond.kind, ValueKind::Bool | ValueKind::Null) {
            return Err(CompileError::invalid_types(op, cond.kind, ValueKind::Bool));
        }

        let then = self.lower(then)?;
        let otherwise = self.lower(otherwise)?;
        let kind = self.branch_kind(op, then.kind, otherwise.kind)?;

        let (crun, trun, orun) = (cond.run, then.run, otherwise.run);
        Ok(Lowered {
            run: Box::new(move |ctx| {
                let value = crun(ctx)?;
                let taken = match value.as_bool() {
                    Some(b) => b,
                    None => {
                        return Err(EvalError::invalid_types(op, value.kind(), ValueKind::Bool));
                    }
                };

                let result = if taken { trun(ctx)? } else { orun(ctx)? };
                number::convert_or_default(result, kind)
            }),
            kind,
        })
    }

    fn lower_call<C: LambdaContext>(
        &self,
        ident: &Ident,
        args: &Args,
    ) -> Result<Lowered<C>, CompileError> {
        let name = ident.as_str();
        let canonical = name.to_uppercase();
        let ignore_case = self.options.contains(EvaluateOptions::IGNORE_CASE);

        // lowercase `if`/`in` are canonical spellings alongside the
        // uppercase ones
        if ignore_case || name == canonical || matches!(name, "if" | "in") {
            if canonical == "IF" {
                if args.len() != 3 {
                    return Err(CompileError::InvalidNumberOfArguments(
                        name.to_string(),
                        3,
                        args.len() as u8,
                    ));
                }
                return self.lower_conditional("IF", &args[0], &args[1], &args[2]);
            }

            if canonical == "IN" {
                return self.lower_in(name, args);
            }

            if let Some(function) = BUILTIN_FUNCTIONS.get(canonical.as_str()) {
                if args.len() != function.num_params as usize {
                    return Err(CompileError::InvalidNumberOfArguments(
                        name.to_string(),
                        function.num_params,
                        args.len() as u8,
                    ));
                }
                return self.lower_builtin(canonical, args);
            }
        }

        if let Some(index) = C::METHODS
            .iter()
            .position(|(method, _)| method.eq_ignore_ascii_case(name))
        {
            let lowered = args
                .iter()
                .map(|node| self.lower(node))
                .collect::<Result<Vec<Lowered<C>>, _>>()?;
            let runs: Vec<RunFn<C>> = lowered.into_iter().map(|l| l.run).collect();

            return Ok(Lowered {
                run: Box::new(move |ctx| {
                    let values = runs
                        .iter()
                        .map(|run| run(ctx))
                        .collect::<Result<Vec<_>, _>>()?;
                    ctx.call_method(index, values)
                }),
                kind: C::METHODS[index].1,
            });
        }

        if !ignore_case && name != canonical && Self::is_known_builtin(&canonical) {
            return Err(CompileError::UnknownFunctionSuggestion(
                name.to_string(),
                canonical,
            ));
        }

        if C::METHODS.is_empty() {
            Err(CompileError::UnknownFunction(name.to_string()))
        } else {
            Err(CompileError::UnknownMethod(name.to_string()))
        }
    }

    fn is_known_builtin(canonical: &str) -> bool {
        canonical == "IF" || canonical == "IN" || BUILTIN_FUNCTIONS.contains_key(canonical)
    }

    fn lower_builtin<C: LambdaContext>(
        &self,
        canonical: String,
        args: &Args,
    ) -> Result<Lowered<C>, CompileError> {
        let lowered = args
            .iter()
            .map(|node| self.lower(node))
            .collect::<Result<Vec<Lowered<C>>, _>>()?;
        let kind = self.builtin_kind(&canonical, &lowered);

        let function = BUILTIN_FUNCTIONS[canonical.as_str()].func;
        let options = self.options;
        let runs: Vec<RunFn<C>> = lowered.into_iter().map(|l| l.run).collect();

        Ok(Lowered {
            run: Box::new(move |ctx| {
                let values = runs
                    .iter()
                    .map(|run| run(ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                function(&canonical, &values, options)
            }),
            kind,
        })
    }

    fn builtin_kind<C>(&self, canonical: &str, args: &[Lowered<C>]) -> ValueKind {
        match canonical {
            "ABS" => {
                if self.options.contains(EvaluateOptions::USE_DOUBLE_FOR_ABS) {
                    ValueKind::F64
                } else {
                    ValueKind::Decimal
                }
            }
            "SIGN" => ValueKind::I32,
            "MAX" | "MIN" => number::widest_kind(args[0].kind, args[1].kind),
            _ => ValueKind::F64,
        }
    }

    fn lower_in<C: LambdaContext>(
        &self,
        name: &str,
        args: &Args,
    ) -> Result<Lowered<C>, CompileError> {
        if args.len() < 2 {
            return Err(CompileError::InvalidNumberOfArguments(
                name.to_string(),
                2,
                args.len() as u8,
            ));
        }

        let lowered = args
            .iter()
            .map(|node| self.lower(node))
            .collect::<Result<Vec<Lowered<C>>, _>>()?;
        let options = self.options;
        let mut runs: Vec<RunFn<C>> = lowered.into_iter().map(|l| l.run).collect();
        let needle = runs.remove(0);

        Ok(Lowered {
            run: Box::new(move |ctx| {
                let needle = needle(ctx)?;

                for candidate in &runs {
                    let value = candidate(ctx)?;
                    let found = match &value {
                        Value::List(items) => {
                            let mut found = false;
                            for item in items {
                                if number::compare(
                                    BinaryOp::Equal,
                                    needle.clone(),
                                    item.clone(),
                                    options,
                                )? {
                                    found = true;
                                    break;
                                }
                            }
                            found
                        }
                        _ => number::compare(BinaryOp::Equal, needle.clone(), value, options)?,
                    };

                    if found {
                        return Ok(Value::TRUE);
                    }
                }

                Ok(Value::FALSE)
            }),
            kind: ValueKind::Bool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::Parser;
    use crate::eval::Interpreter;
    use crate::lexer::Lexer;
    use rstest::*;

    fn parse(input: &str) -> Arc<Node> {
        let tokens = Lexer::tokenize(input).unwrap();
        Parser::new(&tokens).parse().unwrap()
    }

    fn compile_bag(
        input: &str,
        parameters: &Parameters,
        options: EvaluateOptions,
    ) -> Result<Lowered<()>, CompileError> {
        compile(&parse(input), parameters, options)
    }

    fn run_bag(input: &str) -> Result<Value, EvalError> {
        let lowered = compile_bag(input, &Parameters::new(), EvaluateOptions::empty()).unwrap();
        (lowered.run)(&())
    }

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

    #[rstest]
    #[case("1 + 2", Value::I64(3))]
    #[case("3 / 6", Value::F64(0.5))]
    #[case("2 < 3 ? 10 : 20", Value::I64(10))]
    #[case("IN(2, 1, 2)", Value::TRUE)]
    #[case("'a' + 1", Value::from("a1"))]
    fn test_compile_constants(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(run_bag(input), Ok(expected));
    }

    #[test]
    fn test_bag_parameters_are_baked_in() {
        let mut parameters = Parameters::new();
        parameters.set_value("x", 3i64);

        let lowered = compile_bag("x * x", &parameters, EvaluateOptions::empty()).unwrap();
        assert_eq!(lowered.kind, ValueKind::I64);
        assert_eq!((lowered.run)(&()), Ok(Value::I64(9)));
    }

    #[test]
    fn test_expression_parameter_is_inlined() {
        let mut parameters = Parameters::new();
        parameters.set_value("x", 2i64);
        parameters.set_expression("y", parse("x + 1"));

        let lowered = compile_bag("y * 10", &parameters, EvaluateOptions::empty()).unwrap();
        assert_eq!((lowered.run)(&()), Ok(Value::I64(30)));
    }

    #[test]
    fn test_unknown_parameter_is_a_compile_error() {
        assert_eq!(
            compile_bag("x + 1", &Parameters::new(), EvaluateOptions::empty()).err(),
            Some(CompileError::UnknownParameter("x".to_string()))
        );
    }

    #[test]
    fn test_null_parameter_becomes_default() {
        let mut parameters = Parameters::new();
        parameters.set_value("x", Value::Null);

        let lowered = compile_bag("x + 1", &parameters, EvaluateOptions::empty()).unwrap();
        assert_eq!(lowered.kind, ValueKind::I64);
        assert_eq!((lowered.run)(&()), Ok(Value::I64(1)));
    }

    #[test]
    fn test_context_fields() {
        let node = parse("qty * price + 0.5");
        let lowered: Lowered<Order> =
            compile(&node, &Parameters::new(), EvaluateOptions::empty()).unwrap();
        assert_eq!(lowered.kind, ValueKind::F64);

        let order = Order { qty: 4, price: 2.5 };
        assert_eq!((lowered.run)(&order), Ok(Value::F64(10.5)));
    }

    #[test]
    fn test_context_field_lookup_is_case_insensitive() {
        let node = parse("QTY + 1");
        let lowered: Lowered<Order> =
            compile(&node, &Parameters::new(), EvaluateOptions::empty()).unwrap();

        let order = Order { qty: 4, price: 0.0 };
        assert_eq!((lowered.run)(&order), Ok(Value::I64(5)));
    }

    #[test]
    fn test_context_methods() {
        let node = parse("total() > 9");
        let lowered: Lowered<Order> =
            compile(&node, &Parameters::new(), EvaluateOptions::empty()).unwrap();

        let order = Order { qty: 4, price: 2.5 };
        assert_eq!((lowered.run)(&order), Ok(Value::TRUE));
    }

    #[test]
    fn test_unknown_member_and_method() {
        let node = parse("missing + 1");
        let result: Result<Lowered<Order>, _> =
            compile(&node, &Parameters::new(), EvaluateOptions::empty());
        assert_eq!(
            result.err(),
            Some(CompileError::UnknownMember("missing".to_string()))
        );

        let node = parse("missing(1)");
        let result: Result<Lowered<Order>, _> =
            compile(&node, &Parameters::new(), EvaluateOptions::empty());
        assert_eq!(
            result.err(),
            Some(CompileError::UnknownMethod("missing".to_string()))
        );
    }

    #[test]
    fn test_lowercase_if_and_in_compile() {
        assert_eq!(run_bag("if(2 > 1, 10, 20)"), Ok(Value::I64(10)));
        assert_eq!(run_bag("in(2, 1, 2, 3)"), Ok(Value::TRUE));
    }

    #[test]
    fn test_function_case_suggestion() {
        assert_eq!(
            compile_bag("max(1, 2)", &Parameters::new(), EvaluateOptions::empty()).err(),
            Some(CompileError::UnknownFunctionSuggestion(
                "max".to_string(),
                "MAX".to_string()
            ))
        );
    }

    #[test]
    fn test_incompatible_operands_fail_at_compile_time() {
        let result = compile_bag(
            "#2024-01-01# + 1",
            &Parameters::new(),
            EvaluateOptions::empty(),
        );
        assert!(matches!(result.err(), Some(CompileError::InvalidTypes { .. })));
    }

    #[test]
    fn test_boolean_arithmetic_needs_the_flag() {
        assert!(compile_bag("true + 1", &Parameters::new(), EvaluateOptions::empty()).is_err());

        let lowered = compile_bag(
            "true + 1",
            &Parameters::new(),
            EvaluateOptions::BOOLEAN_CALCULATION,
        )
        .unwrap();
        assert_eq!((lowered.run)(&()), Ok(Value::I64(2)));
    }

    #[test]
    fn test_return_kind_check() {
        assert!(check_return::<bool>(ValueKind::Bool).is_ok());
        assert!(check_return::<f64>(ValueKind::String).is_ok());
        assert!(check_return::<Value>(ValueKind::List).is_ok());
        assert!(check_return::<f64>(ValueKind::List).is_err());
        assert!(check_return::<bool>(ValueKind::DateTime).is_err());
    }

    #[rstest]
    #[case("2 + 3 * 4")]
    #[case("3 / 6")]
    #[case("10 % 3")]
    #[case("2 < 3 ? 'a' : 'b'")]
    #[case("IN(2, 1, 2)")]
    #[case("IN(5, 1, 2)")]
    #[case("MAX(1, 2.5)")]
    #[case("-5 + 2")]
    #[case("6 & 3")]
    #[case("1 << 4")]
    #[case("ROUND(2.5, 0)")]
    #[case("'x' + 'y'")]
    #[case("not (1 > 2)")]
    fn test_backends_agree(#[case] input: &str) {
        let node = parse(input);
        let parameters = Parameters::new();

        let interpreted = Interpreter::new(EvaluateOptions::empty(), &parameters, &[], &[])
            .eval(&node)
            .unwrap();
        let lowered: Lowered<()> =
            compile(&node, &parameters, EvaluateOptions::empty()).unwrap();
        let compiled = (lowered.run)(&()).unwrap();

        assert_eq!(interpreted, compiled);
    }
}
