pub(crate) mod builtin;
pub mod error;

use std::sync::Arc;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::ast::{Args, BinaryOp, Expr, Ident, Node, UnaryOp};
use crate::number;
use crate::options::EvaluateOptions;
use crate::value::{Value, ValueKind};

use builtin::BUILTIN_FUNCTIONS;
use error::EvalError;

/// A named binding, either a plain value or a sub-expression evaluated with
/// the same bindings and hooks as the outer expression.
#[derive(Debug, Clone)]
pub enum Parameter {
    Value(Value),
    Expression(Arc<Node>),
}

/// Insertion-ordered parameter bindings. Rebinding a name keeps its original
/// position.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: SmallVec<[(CompactString, Parameter); 4]>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) {
        self.set(name, Parameter::Value(value.into()));
    }

    pub fn set_list(&mut self, name: &str, values: Vec<Value>) {
        self.set(name, Parameter::Value(Value::List(values)));
    }

    pub fn set_expression(&mut self, name: &str, node: Arc<Node>) {
        self.set(name, Parameter::Expression(node));
    }

    pub fn set(&mut self, name: &str, parameter: Parameter) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = parameter,
            None => self.entries.push((CompactString::from(name), parameter)),
        }
    }

    pub fn get(&self, name: &str, ignore_case: bool) -> Option<&Parameter> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| {
                ignore_case
                    .then(|| {
                        self.entries
                            .iter()
                            .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    })
                    .flatten()
            })
            .map(|(_, p)| p)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }
}

/// A function call intercepted by a [`FunctionHook`]. Arguments are handed
/// over unevaluated; the hook decides which to evaluate.
pub struct FunctionCall<'a> {
    name: &'a str,
    args: &'a [Arc<Node>],
    interp: &'a Interpreter<'a>,
    result: Option<Value>,
}

impl<'a> FunctionCall<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn evaluate_arg(&self, index: usize) -> Result<Value, EvalError> {
        match self.args.get(index) {
            Some(node) => self.interp.eval(node),
            None => Err(EvalError::InvalidNumberOfArguments(
                self.name.to_string(),
                index as u8 + 1,
                self.args.len() as u8,
            )),
        }
    }

    pub fn evaluate_args(&self) -> Result<Vec<Value>, EvalError> {
        self.args.iter().map(|node| self.interp.eval(node)).collect()
    }

    /// Claims the call. The first hook that sets a result wins; setting
    /// `Value::Null` is a real null result, not a pass.
    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }
}

/// A parameter lookup that found no binding, offered to [`ParameterHook`]s
/// before it becomes an error.
pub struct ParameterRequest<'a> {
    name: &'a str,
    result: Option<Value>,
}

impl<'a> ParameterRequest<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }
}

pub trait FunctionHook {
    fn call(&self, ctx: &mut FunctionCall<'_>) -> Result<(), EvalError>;
}

impl<F> FunctionHook for F
where
    F: Fn(&mut FunctionCall<'_>) -> Result<(), EvalError>,
{
    fn call(&self, ctx: &mut FunctionCall<'_>) -> Result<(), EvalError> {
        self(ctx)
    }
}

pub trait ParameterHook {
    fn resolve(&self, request: &mut ParameterRequest<'_>) -> Result<(), EvalError>;
}

impl<F> ParameterHook for F
where
    F: Fn(&mut ParameterRequest<'_>) -> Result<(), EvalError>,
{
    fn resolve(&self, request: &mut ParameterRequest<'_>) -> Result<(), EvalError> {
        self(request)
    }
}

/// Tree-walking evaluator. Borrows its bindings and hooks, so one is built
/// per evaluation and thrown away.
pub(crate) struct Interpreter<'a> {
    options: EvaluateOptions,
    parameters: &'a Parameters,
    function_hooks: &'a [Box<dyn FunctionHook>],
    parameter_hooks: &'a [Box<dyn ParameterHook>],
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        options: EvaluateOptions,
        parameters: &'a Parameters,
        function_hooks: &'a [Box<dyn FunctionHook>],
        parameter_hooks: &'a [Box<dyn ParameterHook>],
    ) -> Self {
        Self {
            options,
            parameters,
            function_hooks,
            parameter_hooks,
        }
    }

    pub(crate) fn eval(&self, node: &Arc<Node>) -> Result<Value, EvalError> {
        match &*node.expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(ident) => self.resolve_parameter(ident.as_str()),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand),
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right),
            Expr::Ternary(cond, then, otherwise) => {
                if self.eval_bool(cond, "?:")? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call(ident, args) => self.call(ident, args),
        }
    }

    fn eval_bool(&self, node: &Arc<Node>, op: &str) -> Result<bool, EvalError> {
        let value = self.eval(node)?;
        value
            .as_bool()
            .ok_or_else(|| EvalError::invalid_types(op, value.kind(), ValueKind::Bool))
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Arc<Node>) -> Result<Value, EvalError> {
        match op {
            UnaryOp::Not => self.eval_bool(operand, "!").map(|b| Value::Bool(!b)),
            UnaryOp::Negate => number::negate(self.eval(operand)?, self.options),
            UnaryOp::BitwiseNot => number::bitwise_not(self.eval(operand)?, self.options),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Arc<Node>,
        right: &Arc<Node>,
    ) -> Result<Value, EvalError> {
        match op {
            // Logical operators only evaluate the right side when it can
            // still change the outcome.
            BinaryOp::And => {
                if !self.eval_bool(left, "&&")? {
                    Ok(Value::FALSE)
                } else {
                    self.eval_bool(right, "&&").map(Value::Bool)
                }
            }
            BinaryOp::Or => {
                if self.eval_bool(left, "||")? {
                    Ok(Value::TRUE)
                } else {
                    self.eval_bool(right, "||").map(Value::Bool)
                }
            }
            op if op.is_comparison() => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                number::compare(op, l, r, self.options).map(Value::Bool)
            }
            op if op.is_arithmetic() => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                number::arith(op, l, r, self.options)
            }
            op => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                number::bitwise(op, l, r, self.options)
            }
        }
    }

    fn resolve_parameter(&self, name: &str) -> Result<Value, EvalError> {
        let ignore_case = self.options.contains(EvaluateOptions::IGNORE_CASE);

        if let Some(parameter) = self.parameters.get(name, ignore_case) {
            return match parameter {
                Parameter::Value(Value::Null)
                    if !self.options.contains(EvaluateOptions::ALLOW_NULL_PARAMETER) =>
                {
                    Err(EvalError::NullParameter(name.to_string()))
                }
                Parameter::Value(value) => Ok(value.clone()),
                Parameter::Expression(node) => self.eval(node),
            };
        }

        for hook in self.parameter_hooks {
            let mut request = ParameterRequest { name, result: None };
            hook.resolve(&mut request)?;
            if let Some(value) = request.result {
                return Ok(value);
            }
        }

        Err(EvalError::UnknownParameter(name.to_string()))
    }

    fn call(&self, ident: &Ident, args: &Args) -> Result<Value, EvalError> {
        let name = ident.as_str();

        for hook in self.function_hooks {
            let mut ctx = FunctionCall {
                name,
                args,
                interp: self,
                result: None,
            };
            hook.call(&mut ctx)?;
            if let Some(value) = ctx.result {
                return Ok(value);
            }
        }

        let canonical = name.to_uppercase();

        // `if` and `in` are keywords as much as functions; the all-lowercase
        // spelling is canonical too.
        if !self.options.contains(EvaluateOptions::IGNORE_CASE)
            && name != canonical
            && !matches!(name, "if" | "in")
        {
            return if Self::is_known(&canonical) {
                Err(EvalError::UnknownFunctionSuggestion(
                    name.to_string(),
                    canonical,
                ))
            } else {
                Err(EvalError::UnknownFunction(name.to_string()))
            };
        }

        match canonical.as_str() {
            "IF" => self.eval_if(name, args),
            "IN" => self.eval_in(name, args),
            _ => {
                let Some(function) = BUILTIN_FUNCTIONS.get(canonical.as_str()) else {
                    return Err(EvalError::UnknownFunction(name.to_string()));
                };

                if args.len() != function.num_params as usize {
                    return Err(EvalError::InvalidNumberOfArguments(
                        name.to_string(),
                        function.num_params,
                        args.len() as u8,
                    ));
                }

                let values = args
                    .iter()
                    .map(|node| self.eval(node))
                    .collect::<Result<Vec<_>, _>>()?;
                (function.func)(name, &values, self.options)
            }
        }
    }

    fn is_known(canonical: &str) -> bool {
        canonical == "IF" || canonical == "IN" || BUILTIN_FUNCTIONS.contains_key(canonical)
    }

    fn eval_if(&self, name: &str, args: &Args) -> Result<Value, EvalError> {
        if args.len() != 3 {
            return Err(EvalError::InvalidNumberOfArguments(
                name.to_string(),
                3,
                args.len() as u8,
            ));
        }

        if self.eval_bool(&args[0], name)? {
            self.eval(&args[1])
        } else {
            self.eval(&args[2])
        }
    }

    /// `IN(needle, c1, c2, ...)` evaluates candidates left to right and
    /// stops at the first match; later candidates are never evaluated. A
    /// list candidate matches when any of its elements does.
    fn eval_in(&self, name: &str, args: &Args) -> Result<Value, EvalError> {
        if args.len() < 2 {
            return Err(EvalError::InvalidNumberOfArguments(
                name.to_string(),
                2,
                args.len() as u8,
            ));
        }

        let needle = self.eval(&args[0])?;

        for candidate in &args[1..] {
            let value = self.eval(candidate)?;
            let found = match &value {
                Value::List(items) => {
                    let mut found = false;
                    for item in items {
                        if number::compare(
                            BinaryOp::Equal,
                            needle.clone(),
                            item.clone(),
                            self.options,
                        )? {
                            found = true;
                            break;
                        }
                    }
                    found
                }
                _ => number::compare(BinaryOp::Equal, needle.clone(), value, self.options)?,
            };

            if found {
                return Ok(Value::TRUE);
            }
        }

        Ok(Value::FALSE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::Parser;
    use crate::lexer::Lexer;
    use rstest::*;

    fn eval_with(
        input: &str,
        options: EvaluateOptions,
        parameters: &Parameters,
    ) -> Result<Value, EvalError> {
        let tokens = Lexer::tokenize(input).unwrap();
        let node = Parser::new(&tokens).parse().unwrap();
        Interpreter::new(options, parameters, &[], &[]).eval(&node)
    }

    fn eval(input: &str) -> Result<Value, EvalError> {
        eval_with(input, EvaluateOptions::empty(), &Parameters::new())
    }

    #[rstest]
    #[case("2 + 3 + 5", Value::I64(10))]
    #[case("2 * (3 + 5)", Value::I64(16))]
    #[case("3 / 6", Value::F64(0.5))]
    #[case("1 + 2 < 3 ? 3 + 4 : 1", Value::I64(1))]
    #[case("2 < 3 ? 10 : 20", Value::I64(10))]
    #[case("'a' + 1", Value::from("a1"))]
    #[case("6 & 3", Value::I64(2))]
    #[case("1 << 3", Value::I64(8))]
    #[case("~0", Value::I64(-1))]
    #[case("-2 * 3", Value::I64(-6))]
    #[case("!true", Value::FALSE)]
    #[case("not false", Value::TRUE)]
    #[case("true and false", Value::FALSE)]
    #[case("true or false", Value::TRUE)]
    #[case("1 == 1 and 2 > 1", Value::TRUE)]
    fn test_eval(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(eval(input), Ok(expected));
    }

    #[test]
    fn test_logical_short_circuit() {
        // the right side would fail with an unknown parameter
        assert_eq!(eval("false and missing > 1"), Ok(Value::FALSE));
        assert_eq!(eval("true or missing > 1"), Ok(Value::TRUE));
        assert!(matches!(
            eval("true and missing > 1"),
            Err(EvalError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_ternary_condition_must_be_bool() {
        assert!(matches!(
            eval("1 ? 2 : 3"),
            Err(EvalError::InvalidTypes { .. })
        ));
    }

    #[test]
    fn test_if_only_evaluates_taken_branch() {
        assert_eq!(eval("IF(true, 1, missing)"), Ok(Value::I64(1)));
        assert_eq!(eval("IF(false, missing, 2)"), Ok(Value::I64(2)));
    }

    #[test]
    fn test_in_stops_at_first_match() {
        assert_eq!(eval("IN(1, 1, missing)"), Ok(Value::TRUE));
        assert_eq!(eval("IN(2, 1, 3)"), Ok(Value::FALSE));
        // needle and candidate go through comparison coercion
        assert_eq!(eval("IN('1', 1, 2)"), Ok(Value::TRUE));
    }

    #[test]
    fn test_in_matches_list_elements() {
        let mut parameters = Parameters::new();
        parameters.set_list("xs", vec![Value::I64(1), Value::I64(2)]);
        assert_eq!(
            eval_with("IN(2, xs)", EvaluateOptions::empty(), &parameters),
            Ok(Value::TRUE)
        );
    }

    #[test]
    fn test_parameters() {
        let mut parameters = Parameters::new();
        parameters.set_value("x", 3i64);
        assert_eq!(
            eval_with("x * x", EvaluateOptions::empty(), &parameters),
            Ok(Value::I64(9))
        );
    }

    #[test]
    fn test_expression_parameter() {
        let tokens = Lexer::tokenize("x + 1").unwrap();
        let node = Parser::new(&tokens).parse().unwrap();

        let mut parameters = Parameters::new();
        parameters.set_value("x", 2i64);
        parameters.set_expression("y", node);

        assert_eq!(
            eval_with("y * 10", EvaluateOptions::empty(), &parameters),
            Ok(Value::I64(30))
        );
    }

    #[test]
    fn test_null_parameter() {
        let mut parameters = Parameters::new();
        parameters.set_value("x", Value::Null);

        assert_eq!(
            eval_with("x == x", EvaluateOptions::empty(), &parameters),
            Err(EvalError::NullParameter("x".to_string()))
        );
        assert_eq!(
            eval_with("x == x", EvaluateOptions::ALLOW_NULL_PARAMETER, &parameters),
            Ok(Value::TRUE)
        );
    }

    #[test]
    fn test_unknown_parameter() {
        assert_eq!(
            eval("nope + 1"),
            Err(EvalError::UnknownParameter("nope".to_string()))
        );
    }

    #[test]
    fn test_parameter_case_sensitivity() {
        let mut parameters = Parameters::new();
        parameters.set_value("Rate", 2i64);

        assert!(eval_with("rate * 2", EvaluateOptions::empty(), &parameters).is_err());
        assert_eq!(
            eval_with("rate * 2", EvaluateOptions::IGNORE_CASE, &parameters),
            Ok(Value::I64(4))
        );
    }

    #[test]
    fn test_function_case_sensitivity() {
        assert_eq!(
            eval("max(1, 2)"),
            Err(EvalError::UnknownFunctionSuggestion(
                "max".to_string(),
                "MAX".to_string()
            ))
        );
        assert_eq!(
            eval_with("max(1, 2)", EvaluateOptions::IGNORE_CASE, &Parameters::new()),
            Ok(Value::I64(2))
        );
        assert_eq!(
            eval("nosuch(1)"),
            Err(EvalError::UnknownFunction("nosuch".to_string()))
        );
    }

    #[test]
    fn test_lowercase_if_and_in_are_canonical() {
        assert_eq!(eval("if(true, 1, 2)"), Ok(Value::I64(1)));
        assert_eq!(eval("in(2, 1, 2, 3)"), Ok(Value::TRUE));
        // mixed case is still a typo
        assert_eq!(
            eval("In(2, 1, 2)"),
            Err(EvalError::UnknownFunctionSuggestion(
                "In".to_string(),
                "IN".to_string()
            ))
        );
    }

    #[test]
    fn test_builtin_arity_check() {
        assert_eq!(
            eval("MAX(1)"),
            Err(EvalError::InvalidNumberOfArguments("MAX".to_string(), 2, 1))
        );
        assert_eq!(
            eval("IF(true, 1)"),
            Err(EvalError::InvalidNumberOfArguments("IF".to_string(), 3, 2))
        );
    }

    #[test]
    fn test_function_hook_intercepts_before_builtins() {
        let hooks: Vec<Box<dyn FunctionHook>> = vec![
            Box::new(|ctx: &mut FunctionCall<'_>| {
                if ctx.name() == "MAX" {
                    ctx.set_result(Value::I64(99));
                }
                Ok(())
            }),
            Box::new(|ctx: &mut FunctionCall<'_>| {
                // never reached for MAX, the first hook already claimed it
                if ctx.name() == "MAX" {
                    ctx.set_result(Value::I64(-1));
                }
                Ok(())
            }),
        ];

        let tokens = Lexer::tokenize("MAX(1, 2)").unwrap();
        let node = Parser::new(&tokens).parse().unwrap();
        let parameters = Parameters::new();
        let interp = Interpreter::new(EvaluateOptions::empty(), &parameters, &hooks, &[]);

        assert_eq!(interp.eval(&node), Ok(Value::I64(99)));
    }

    #[test]
    fn test_function_hook_evaluates_args_on_demand() {
        let hooks: Vec<Box<dyn FunctionHook>> = vec![Box::new(|ctx: &mut FunctionCall<'_>| {
            if ctx.name() == "first" {
                let value = ctx.evaluate_arg(0)?;
                ctx.set_result(value);
            }
            Ok(())
        })];

        // the second argument would fail if evaluated
        let tokens = Lexer::tokenize("first(42, missing)").unwrap();
        let node = Parser::new(&tokens).parse().unwrap();
        let parameters = Parameters::new();
        let interp = Interpreter::new(EvaluateOptions::empty(), &parameters, &hooks, &[]);

        assert_eq!(interp.eval(&node), Ok(Value::I64(42)));
    }

    #[test]
    fn test_parameter_hook_resolves_unbound_names() {
        let hooks: Vec<Box<dyn ParameterHook>> = vec![Box::new(
            |request: &mut ParameterRequest<'_>| {
                if request.name() == "pi" {
                    request.set_result(Value::F64(3.14));
                }
                Ok(())
            },
        )];

        let tokens = Lexer::tokenize("pi * 2").unwrap();
        let node = Parser::new(&tokens).parse().unwrap();
        let parameters = Parameters::new();
        let interp = Interpreter::new(EvaluateOptions::empty(), &parameters, &[], &hooks);

        assert_eq!(interp.eval(&node), Ok(Value::F64(6.28)));
    }

    #[test]
    fn test_bound_parameter_beats_hook() {
        let hooks: Vec<Box<dyn ParameterHook>> = vec![Box::new(
            |request: &mut ParameterRequest<'_>| {
                request.set_result(Value::I64(0));
                Ok(())
            },
        )];

        let tokens = Lexer::tokenize("x").unwrap();
        let node = Parser::new(&tokens).parse().unwrap();
        let mut parameters = Parameters::new();
        parameters.set_value("x", 7i64);
        let interp = Interpreter::new(EvaluateOptions::empty(), &parameters, &[], &hooks);

        assert_eq!(interp.eval(&node), Ok(Value::I64(7)));
    }

    #[test]
    fn test_rebinding_keeps_position() {
        let mut parameters = Parameters::new();
        parameters.set_value("a", 1i64);
        parameters.set_value("b", 2i64);
        parameters.set_value("a", 3i64);

        assert_eq!(parameters.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            eval_with("a", EvaluateOptions::empty(), &parameters),
            Ok(Value::I64(3))
        );
    }
}
