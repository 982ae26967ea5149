use std::cell::RefCell;
use std::sync::Arc;

use crate::ast::Node;
use crate::cache::{self, ExpressionCache};
use crate::compile::{self, FromValue, LambdaContext, Lowered};
use crate::error::{Error, SyntaxErrors};
use crate::eval::error::EvalError;
use crate::eval::{
    FunctionHook, Interpreter, Parameter, ParameterHook, Parameters,
};
use crate::options::EvaluateOptions;
use crate::value::Value;

/// A formula with its bindings, hooks and options. Parsing is deferred to
/// the first use and the parsed tree is shared through the expression cache
/// unless [`EvaluateOptions::NO_CACHE`] is set.
pub struct Expression {
    source: Option<String>,
    ast: RefCell<Option<Arc<Node>>>,
    syntax_errors: RefCell<Option<SyntaxErrors>>,
    options: EvaluateOptions,
    parameters: Parameters,
    function_hooks: Vec<Box<dyn FunctionHook>>,
    parameter_hooks: Vec<Box<dyn ParameterHook>>,
    cache: Arc<ExpressionCache>,
}

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_options(source, EvaluateOptions::default())
    }

    pub fn with_options(source: impl Into<String>, options: EvaluateOptions) -> Self {
        Self {
            source: Some(source.into()),
            ast: RefCell::new(None),
            syntax_errors: RefCell::new(None),
            options,
            parameters: Parameters::new(),
            function_hooks: Vec::new(),
            parameter_hooks: Vec::new(),
            cache: cache::default_cache(),
        }
    }

    /// Wraps an already-built tree, skipping parsing and the cache.
    pub fn from_node(node: Arc<Node>) -> Self {
        Self {
            source: None,
            ast: RefCell::new(Some(node)),
            syntax_errors: RefCell::new(None),
            options: EvaluateOptions::default(),
            parameters: Parameters::new(),
            function_hooks: Vec::new(),
            parameter_hooks: Vec::new(),
            cache: cache::default_cache(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ExpressionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn options(&self) -> EvaluateOptions {
        self.options
    }

    pub fn set_options(&mut self, options: EvaluateOptions) {
        self.options = options;
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) {
        self.parameters.set_value(name, value);
    }

    pub fn set_parameter_list(&mut self, name: &str, values: Vec<Value>) {
        self.parameters.set_list(name, values);
    }

    pub fn set_parameter_expression(&mut self, name: &str, node: Arc<Node>) {
        self.parameters.set_expression(name, node);
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    pub fn add_function_hook(&mut self, hook: impl FunctionHook + 'static) {
        self.function_hooks.push(Box::new(hook));
    }

    pub fn add_parameter_hook(&mut self, hook: impl ParameterHook + 'static) {
        self.parameter_hooks.push(Box::new(hook));
    }

    /// Checks the source for syntax problems without evaluating.
    pub fn has_errors(&self) -> bool {
        self.error().is_some()
    }

    pub fn error(&self) -> Option<Error> {
        self.resolve().err()
    }

    pub fn evaluate(&self) -> Result<Value, Error> {
        let node = self.resolve()?;
        self.evaluate_node(&node)
            .map_err(|e| Error::from_eval(e, self.source_text()))
    }

    /// Compiles into a native callable with all parameters baked in as
    /// constants.
    pub fn to_lambda<T>(&self) -> Result<Box<dyn Fn() -> Result<T, Error>>, Error>
    where
        T: FromValue + 'static,
    {
        let lowered: Lowered<()> = self.lower()?;
        compile::check_return::<T>(lowered.kind)
            .map_err(|e| Error::from_compile(e, self.source_text()))?;
        let run = lowered.run;
        let source = self.source_text();

        Ok(Box::new(move || {
            run(&())
                .and_then(T::from_value)
                .map_err(|e| Error::from_eval(e, source.clone()))
        }))
    }

    /// Compiles into a native callable reading identifiers and methods from
    /// a host context.
    pub fn to_lambda_with_context<C, T>(
        &self,
    ) -> Result<Box<dyn Fn(&C) -> Result<T, Error>>, Error>
    where
        C: LambdaContext,
        T: FromValue + 'static,
    {
        let lowered: Lowered<C> = self.lower()?;
        compile::check_return::<T>(lowered.kind)
            .map_err(|e| Error::from_compile(e, self.source_text()))?;
        let run = lowered.run;
        let source = self.source_text();

        Ok(Box::new(move |ctx: &C| {
            run(ctx)
                .and_then(T::from_value)
                .map_err(|e| Error::from_eval(e, source.clone()))
        }))
    }

    fn lower<C: LambdaContext>(&self) -> Result<Lowered<C>, Error> {
        let node = self.resolve()?;
        compile::compile(&node, &self.parameters, self.options)
            .map_err(|e| Error::from_compile(e, self.source_text()))
    }

    fn source_text(&self) -> String {
        self.source.clone().unwrap_or_default()
    }

    pub(crate) fn resolve(&self) -> Result<Arc<Node>, Error> {
        if let Some(errors) = &*self.syntax_errors.borrow() {
            return Err(Error::from_syntax(errors.clone(), self.source_text()));
        }

        let use_cache = !self.options.contains(EvaluateOptions::NO_CACHE);

        if let Some(node) = self.ast.borrow().as_ref()
            && (use_cache || self.source.is_none())
        {
            return Ok(Arc::clone(node));
        }

        let source = self.source.as_deref().unwrap_or_default();
        let node = match self.cache.resolve(source, use_cache) {
            Ok(node) => node,
            Err(errors) => {
                *self.syntax_errors.borrow_mut() = Some(errors.clone());
                return Err(Error::from_syntax(errors, source.to_string()));
            }
        };

        if use_cache {
            *self.ast.borrow_mut() = Some(Arc::clone(&node));
        }

        Ok(node)
    }

    fn evaluate_node(&self, node: &Arc<Node>) -> Result<Value, EvalError> {
        if self.options.contains(EvaluateOptions::ITERATE_PARAMETERS) {
            return self.evaluate_iterated(node);
        }

        Interpreter::new(
            self.options,
            &self.parameters,
            &self.function_hooks,
            &self.parameter_hooks,
        )
        .eval(node)
    }

    /// Runs the expression once per element of the list-bound parameters,
    /// with each list replaced by its current element. The caller's bindings
    /// are never touched; each round works on its own overlay.
    fn evaluate_iterated(&self, node: &Arc<Node>) -> Result<Value, EvalError> {
        let mut length = None;
        for (_, parameter) in self.parameters.iter() {
            if let Parameter::Value(Value::List(items)) = parameter {
                match length {
                    None => length = Some(items.len()),
                    Some(expected) if expected != items.len() => {
                        return Err(EvalError::ParameterLengthMismatch(expected, items.len()));
                    }
                    _ => {}
                }
            }
        }

        let Some(length) = length else {
            return Interpreter::new(
                self.options,
                &self.parameters,
                &self.function_hooks,
                &self.parameter_hooks,
            )
            .eval(node);
        };

        let mut results = Vec::with_capacity(length);
        for index in 0..length {
            let mut overlay = self.parameters.clone();
            for (name, parameter) in self.parameters.iter() {
                if let Parameter::Value(Value::List(items)) = parameter {
                    overlay.set_value(name, items[index].clone());
                }
            }

            let value = Interpreter::new(
                self.options,
                &overlay,
                &self.function_hooks,
                &self.parameter_hooks,
            )
            .eval(node)?;
            results.push(value);
        }

        Ok(Value::List(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::error::CompileError;
    use crate::error::InnerError;
    use crate::eval::FunctionCall;
    use crate::value::ValueKind;
    use rstest::*;

    fn private_cache() -> Arc<ExpressionCache> {
        Arc::new(ExpressionCache::new())
    }

    #[rstest]
    #[case("2 + 3 + 5", Value::I64(10))]
    #[case("2 * (3 + 5)", Value::I64(16))]
    #[case("3 / 6", Value::F64(0.5))]
    #[case("1 + 2 < 3 ? 3 + 4 : 1", Value::I64(1))]
    fn test_evaluate(#[case] source: &str, #[case] expected: Value) {
        let expr = Expression::new(source).with_cache(private_cache());
        assert_eq!(expr.evaluate().unwrap(), expected);
    }

    #[test]
    fn test_parameters_via_facade() {
        let mut expr = Expression::new("price * qty").with_cache(private_cache());
        expr.set_parameter("price", 2.5f64);
        expr.set_parameter("qty", 4i64);
        assert_eq!(expr.evaluate().unwrap(), Value::F64(10.0));
    }

    #[test]
    fn test_has_errors() {
        let expr = Expression::new("1 +").with_cache(private_cache());
        assert!(expr.has_errors());
        assert!(expr.evaluate().is_err());

        let expr = Expression::new("1 + 1").with_cache(private_cache());
        assert!(!expr.has_errors());
        assert!(expr.error().is_none());
    }

    #[test]
    fn test_shared_cache_shares_trees() {
        let cache = private_cache();
        let a = Expression::new("1 + 2").with_cache(Arc::clone(&cache));
        let b = Expression::new("1 + 2").with_cache(Arc::clone(&cache));

        let first = a.resolve().unwrap();
        let second = b.resolve().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_no_cache_parses_fresh_every_time() {
        let expr = Expression::with_options("1 + 2", EvaluateOptions::NO_CACHE)
            .with_cache(private_cache());

        let first = expr.resolve().unwrap();
        let second = expr.resolve().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_from_node() {
        let source = Expression::new("6 * 7").with_cache(private_cache());
        let node = source.resolve().unwrap();

        let expr = Expression::from_node(node);
        assert_eq!(expr.evaluate().unwrap(), Value::I64(42));
    }

    #[test]
    fn test_iterated_parameters() {
        let mut expr = Expression::with_options("x * x", EvaluateOptions::ITERATE_PARAMETERS)
            .with_cache(private_cache());
        expr.set_parameter_list(
            "x",
            (0..5i64).map(Value::from).collect(),
        );

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
    fn test_iterated_parameters_mix_scalars_and_lists() {
        let mut expr = Expression::with_options("x + y", EvaluateOptions::ITERATE_PARAMETERS)
            .with_cache(private_cache());
        expr.set_parameter_list("x", vec![Value::I64(1), Value::I64(2)]);
        expr.set_parameter("y", 10i64);

        assert_eq!(
            expr.evaluate().unwrap(),
            Value::List(vec![Value::I64(11), Value::I64(12)])
        );
        // the caller's binding is still the whole list
        assert!(matches!(
            expr.parameters().get("x", false),
            Some(Parameter::Value(Value::List(_)))
        ));
    }

    #[test]
    fn test_iterated_parameters_length_mismatch() {
        let mut expr = Expression::with_options("x + y", EvaluateOptions::ITERATE_PARAMETERS)
            .with_cache(private_cache());
        expr.set_parameter_list("x", vec![Value::I64(1), Value::I64(2)]);
        expr.set_parameter_list("y", vec![Value::I64(1)]);

        assert!(expr.evaluate().is_err());
    }

    #[test]
    fn test_iterated_without_lists_is_plain_evaluation() {
        let mut expr = Expression::with_options("x + 1", EvaluateOptions::ITERATE_PARAMETERS)
            .with_cache(private_cache());
        expr.set_parameter("x", 1i64);
        assert_eq!(expr.evaluate().unwrap(), Value::I64(2));
    }

    #[test]
    fn test_to_lambda() {
        let mut expr = Expression::new("x * 2 + 1").with_cache(private_cache());
        expr.set_parameter("x", 3i64);

        let lambda = expr.to_lambda::<i64>().unwrap();
        assert_eq!(lambda().unwrap(), 7);
    }

    #[test]
    fn test_to_lambda_return_kind_mismatch() {
        let expr = Expression::new("#2024-01-01#").with_cache(private_cache());
        let error = expr.to_lambda::<i64>().err().unwrap();
        assert!(matches!(
            error.cause,
            InnerError::Compile(CompileError::ReturnType { .. })
        ));

        // anything renders into a String
        let ok = Expression::new("'a' + 'b'").with_cache(private_cache());
        assert!(ok.to_lambda::<String>().is_ok());
    }

    struct Sensor {
        reading: f64,
    }

    impl LambdaContext for Sensor {
        const FIELDS: &'static [(&'static str, ValueKind)] = &[("reading", ValueKind::F64)];

        fn field(&self, _index: usize) -> Value {
            Value::F64(self.reading)
        }
    }

    #[test]
    fn test_to_lambda_with_context() {
        let expr = Expression::new("reading > 20.0").with_cache(private_cache());
        let lambda = expr.to_lambda_with_context::<Sensor, bool>().unwrap();

        assert!(lambda(&Sensor { reading: 21.5 }).unwrap());
        assert!(!lambda(&Sensor { reading: 19.0 }).unwrap());
    }

    #[test]
    fn test_function_hook_via_facade() {
        let mut expr = Expression::new("double(21)").with_cache(private_cache());
        expr.add_function_hook(|ctx: &mut FunctionCall<'_>| {
            if ctx.name() == "double" {
                let value = ctx.evaluate_arg(0)?;
                ctx.set_result(crate::number::arith(
                    crate::ast::BinaryOp::Times,
                    value,
                    Value::I64(2),
                    EvaluateOptions::empty(),
                )?);
            }
            Ok(())
        });

        assert_eq!(expr.evaluate().unwrap(), Value::I64(42));
    }
}
