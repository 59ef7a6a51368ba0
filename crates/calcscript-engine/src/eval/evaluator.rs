use std::cell::Cell;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::ast::{is_banned_name, ArrowParam, BinaryOp, Expr, Literal, ObjectEntry, STD_ROOT};
use crate::error::{EvalError, EvalResult};
use crate::eval::env::{Environment, Scope};
use crate::eval::ops;
use crate::stdlib::{FunctionSpec, StdLibrary, VAR_ARGS};
use crate::value::{format_number, Closure, Record, Value};

/// Deepest combined nesting of sub-expressions and closure calls one evaluation may reach.
/// CalcScript has no loops, so this is what bounds self-applied closures.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Tree-walking interpreter for one expression.
///
/// An evaluator borrows the run's [`Environment`] immutably; the scheduler builds a fresh one
/// per node after committing the previous node's value.
pub struct Evaluator<'a> {
    env: &'a Environment,
    std: &'a StdLibrary,
    now: Option<NaiveDateTime>,
    depth: Cell<usize>,
}

struct DepthGuard<'d>(&'d Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl<'a> Evaluator<'a> {
    pub fn new(env: &'a Environment, std: &'a StdLibrary) -> Self {
        Self {
            env,
            std,
            now: None,
            depth: Cell::new(0),
        }
    }

    /// Set the timestamp `std.date.now()` and `std.date.today()` report.
    #[must_use]
    pub fn with_now(mut self, now: Option<NaiveDateTime>) -> Self {
        self.now = now;
        self
    }

    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Value> {
        self.eval(expr, None)
    }

    /// Evaluate with `scope` as the innermost local frame.
    pub fn evaluate_in(&self, expr: &Expr, scope: Arc<Scope>) -> EvalResult<Value> {
        self.eval(expr, Some(&scope))
    }

    fn lookup(&self, name: &str, scope: Option<&Arc<Scope>>) -> EvalResult<Value> {
        if is_banned_name(name) {
            return Err(EvalError::BannedIdentifier(name.to_string()));
        }
        let found = scope
            .and_then(|scope| scope.lookup(name))
            .or_else(|| self.env.lookup(name));
        match found {
            Some(Value::NodeError(marker)) => Err(EvalError::Upstream(marker.node().to_string())),
            Some(value) => Ok(value.clone()),
            None => Err(EvalError::UnknownIdentifier(name.to_string())),
        }
    }

    fn enter(&self) -> EvalResult<DepthGuard<'_>> {
        let depth = self.depth.get();
        if depth >= MAX_EVAL_DEPTH {
            return Err(EvalError::NestingLimit(MAX_EVAL_DEPTH));
        }
        self.depth.set(depth + 1);
        Ok(DepthGuard(&self.depth))
    }

    fn eval(&self, expr: &Expr, scope: Option<&Arc<Scope>>) -> EvalResult<Value> {
        let _guard = self.enter()?;
        match expr {
            Expr::Literal(Literal::Number(n)) => Ok(Value::Number(*n)),
            Expr::Literal(Literal::String(s)) => Ok(Value::Text(s.clone())),
            Expr::Literal(Literal::Boolean(b)) => Ok(Value::Bool(*b)),
            Expr::Identifier(name) => self.lookup(name, scope),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item, scope))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Array),
            Expr::Unary { op, expr } => ops::unary(*op, &self.eval(expr, scope)?),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, scope),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => match self.eval(test, scope)? {
                Value::Bool(true) => self.eval(consequent, scope),
                Value::Bool(false) => self.eval(alternate, scope),
                other => Err(EvalError::type_mismatch(format!(
                    "condition must be a boolean, got {}",
                    other.type_name()
                ))),
            },
            Expr::Let { bindings, body } => {
                let mut current = scope.cloned();
                for (name, value) in bindings {
                    let value = self.eval(value, current.as_ref())?;
                    let mut frame = Scope::new(current);
                    frame.define(name.clone(), value);
                    current = Some(Arc::new(frame));
                }
                self.eval(body, current.as_ref())
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                member(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                index_into(&object, &index)
            }
            Expr::Call { callee, args } => {
                let spec = self.resolve_callee(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.invoke(spec, &args)
            }
            Expr::Object(entries) => self.eval_object(entries, scope),
            Expr::Arrow { params, body } => Ok(Value::Closure(Arc::new(Closure {
                params: params.clone(),
                body: Arc::clone(body),
                scope: scope.cloned(),
            }))),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        scope: Option<&Arc<Scope>>,
    ) -> EvalResult<Value> {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let lhs = expect_bool(op, self.eval(left, scope)?)?;
                // Short-circuit: `false && _` and `true || _` never evaluate the right side.
                if (op == BinaryOp::And) != lhs {
                    return Ok(Value::Bool(lhs));
                }
                expect_bool(op, self.eval(right, scope)?).map(Value::Bool)
            }
            BinaryOp::Nullish => {
                let lhs = self.eval(left, scope)?;
                if lhs.is_absent() {
                    self.eval(right, scope)
                } else {
                    Ok(lhs)
                }
            }
            _ => {
                let lhs = self.eval(left, scope)?;
                let rhs = self.eval(right, scope)?;
                match op {
                    BinaryOp::Equals => ops::equals(&lhs, &rhs).map(Value::Bool),
                    BinaryOp::NotEquals => ops::equals(&lhs, &rhs).map(|eq| Value::Bool(!eq)),
                    BinaryOp::Less
                    | BinaryOp::LessEquals
                    | BinaryOp::Greater
                    | BinaryOp::GreaterEquals => ops::compare(op, &lhs, &rhs).map(Value::Bool),
                    BinaryOp::Concat => ops::concat(&lhs, &rhs),
                    _ => ops::arithmetic(op, &lhs, &rhs),
                }
            }
        }
    }

    fn eval_object(&self, entries: &[ObjectEntry], scope: Option<&Arc<Scope>>) -> EvalResult<Value> {
        let mut record = Record::new();
        for entry in entries {
            match entry {
                ObjectEntry::Property { key, value } => {
                    check_key(key)?;
                    record.insert(key.clone(), self.eval(value, scope)?);
                }
                ObjectEntry::Spread(source) => match self.eval(source, scope)? {
                    Value::Record(source) => {
                        for (key, value) in source.iter() {
                            check_key(key)?;
                            record.insert(key, value.clone());
                        }
                    }
                    Value::Null | Value::Undefined => {}
                    other => {
                        return Err(EvalError::type_mismatch(format!(
                            "cannot spread {} into a record",
                            other.type_name()
                        )))
                    }
                },
            }
        }
        Ok(Value::Record(record))
    }

    /// Resolve a call target. Only member paths rooted at `std` that land on a function of
    /// this evaluator's library are callable.
    fn resolve_callee(&self, callee: &Expr) -> EvalResult<&'static FunctionSpec> {
        let path = match callee.member_path() {
            Some(path) if path.first() == Some(&STD_ROOT) => path,
            _ => {
                return Err(EvalError::DisallowedCall(
                    "only std library functions can be called".to_string(),
                ))
            }
        };
        let mut current = self
            .env
            .lookup(STD_ROOT)
            .ok_or_else(|| EvalError::UnknownIdentifier(STD_ROOT.to_string()))?;
        for segment in &path[1..] {
            if is_banned_name(segment) {
                return Err(EvalError::BannedIdentifier(segment.to_string()));
            }
            current = match current {
                Value::Record(record) => record
                    .get(segment)
                    .ok_or_else(|| EvalError::UnknownProperty(path.join(".")))?,
                other => {
                    return Err(EvalError::type_mismatch(format!(
                        "cannot read property '{segment}' of {}",
                        other.type_name()
                    )))
                }
            };
        }
        match current {
            Value::Function(spec) if self.std.is_registered(spec) => Ok(*spec),
            _ => Err(EvalError::DisallowedCall(format!(
                "{} is not a std library function",
                path.join(".")
            ))),
        }
    }

    pub(crate) fn invoke(&self, spec: &'static FunctionSpec, args: &[Value]) -> EvalResult<Value> {
        if args.len() < spec.min_args || args.len() > spec.max_args {
            return Err(EvalError::Arity {
                function: format!("{STD_ROOT}.{}", spec.path),
                expected: expected_arity(spec),
                actual: args.len(),
            });
        }
        let _guard = self.enter()?;
        log::trace!("calling {STD_ROOT}.{} with {} argument(s)", spec.path, args.len());
        let ctx = CallContext {
            evaluator: self,
            spec,
        };
        (spec.implementation)(&ctx, args)
    }

    /// Bind `args` to the closure's parameters in a frame on top of its captured scope.
    /// Missing arguments bind as `undefined`; extra ones are ignored.
    pub(crate) fn call_closure(&self, closure: &Closure, args: &[Value]) -> EvalResult<Value> {
        let _guard = self.enter()?;
        let mut frame = Scope::new(closure.scope.clone());
        for (idx, param) in closure.params.iter().enumerate() {
            let arg = args.get(idx).cloned().unwrap_or(Value::Undefined);
            match param {
                ArrowParam::Name(name) => frame.define(name.clone(), arg),
                ArrowParam::Destructure(fields) => {
                    let Value::Record(record) = &arg else {
                        return Err(EvalError::type_mismatch(format!(
                            "destructured parameter expects a record, got {}",
                            arg.type_name()
                        )));
                    };
                    for field in fields {
                        check_key(&field.source_key)?;
                        let value = record
                            .get(&field.source_key)
                            .cloned()
                            .unwrap_or(Value::Undefined);
                        frame.define(field.bound_name.clone(), value);
                    }
                }
            }
        }
        self.eval(&closure.body, Some(&Arc::new(frame)))
    }
}

fn expected_arity(spec: &FunctionSpec) -> String {
    if spec.max_args == VAR_ARGS {
        format!("at least {}", spec.min_args)
    } else if spec.min_args == spec.max_args {
        spec.min_args.to_string()
    } else {
        format!("{} to {}", spec.min_args, spec.max_args)
    }
}

fn expect_bool(op: BinaryOp, value: Value) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::type_mismatch(format!(
            "'{}' expects booleans, got {}",
            op.symbol(),
            other.type_name()
        ))),
    }
}

fn check_key(key: &str) -> EvalResult<()> {
    if is_banned_name(key) {
        return Err(EvalError::BannedIdentifier(key.to_string()));
    }
    Ok(())
}

/// `.property`. Records use own-property lookup; tables and arrays project the property
/// across their rows/elements, labeling per-row failures.
fn member(object: &Value, property: &str) -> EvalResult<Value> {
    check_key(property)?;
    match object {
        Value::Record(record) => record
            .get(property)
            .cloned()
            .ok_or_else(|| EvalError::UnknownProperty(property.to_string())),
        Value::Table(table) => {
            if !table.has_column(property) {
                return Err(EvalError::UnknownProperty(format!(
                    "{}.{property}",
                    table.name
                )));
            }
            table
                .rows
                .iter()
                .enumerate()
                .map(|(idx, row)| {
                    row.get(property).cloned().ok_or_else(|| {
                        EvalError::UnknownProperty(property.to_string()).in_row(table.row_label(idx))
                    })
                })
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Array)
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                member(item, property).map_err(|err| err.in_row(format!("#{}", idx + 1)))
            })
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        other => Err(EvalError::type_mismatch(format!(
            "cannot read property '{property}' of {}",
            other.type_name()
        ))),
    }
}

fn position(index: &Value, len: usize) -> EvalResult<usize> {
    let Value::Number(n) = index else {
        return Err(EvalError::type_mismatch(format!(
            "index must be a number, got {}",
            index.type_name()
        )));
    };
    let n = *n;
    if !(n >= 0.0) || n.fract() != 0.0 || n >= len as f64 {
        return Err(EvalError::IndexOutOfRange {
            index: format_number(n),
            len,
        });
    }
    Ok(n as usize)
}

/// `object[index]`.
fn index_into(object: &Value, index: &Value) -> EvalResult<Value> {
    match object {
        Value::Array(items) => Ok(items[position(index, items.len())?].clone()),
        Value::Table(table) => Ok(Value::Record(
            table.rows[position(index, table.rows.len())?].clone(),
        )),
        Value::Record(record) => match index {
            Value::Text(key) => {
                check_key(key)?;
                record
                    .get(key)
                    .cloned()
                    .ok_or_else(|| EvalError::UnknownProperty(key.clone()))
            }
            other => Err(EvalError::type_mismatch(format!(
                "record keys must be strings, got {}",
                other.type_name()
            ))),
        },
        other => Err(EvalError::type_mismatch(format!(
            "cannot index into {}",
            other.type_name()
        ))),
    }
}

/// What a std function sees of the running evaluation.
pub struct CallContext<'a> {
    evaluator: &'a Evaluator<'a>,
    spec: &'static FunctionSpec,
}

impl CallContext<'_> {
    /// Dotted path of the function being called, without the `std.` prefix.
    pub fn function(&self) -> &'static str {
        self.spec.path
    }

    /// The run's timestamp override, if a valid one was supplied.
    pub fn now(&self) -> Option<NaiveDateTime> {
        self.evaluator.now
    }

    /// A descriptive failure attributed to the running function.
    pub fn fail(&self, message: impl Into<String>) -> EvalError {
        EvalError::Function {
            function: format!("{STD_ROOT}.{}", self.spec.path),
            message: message.into(),
        }
    }

    /// Invoke a function value (a user arrow or a std function) with `args`.
    pub fn call(&self, callee: &Value, args: &[Value]) -> EvalResult<Value> {
        match callee {
            Value::Closure(closure) => self.evaluator.call_closure(closure, args),
            Value::Function(spec) if self.evaluator.std.is_registered(spec) => {
                self.evaluator.invoke(*spec, args)
            }
            Value::Function(spec) => Err(EvalError::DisallowedCall(format!(
                "{STD_ROOT}.{} is not a std library function",
                spec.path
            ))),
            other => Err(self.fail(format!("expected a function, got {}", other.type_name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use crate::value::Table;
    use pretty_assertions::assert_eq;

    fn eval_with(env: &Environment, src: &str) -> EvalResult<Value> {
        let expr = parse_expression(src).unwrap();
        Evaluator::new(env, StdLibrary::shared()).evaluate(&expr)
    }

    fn eval(src: &str) -> EvalResult<Value> {
        eval_with(&Environment::new(StdLibrary::shared()), src)
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("2 + 3 * 4").unwrap(), Value::Number(14.0));
        assert_eq!(eval("2 ** 3 ** 2").unwrap(), Value::Number(512.0));
        assert_eq!(eval("\"a\" & 1 & \"b\" & 2").unwrap(), Value::from("a1b2"));
        assert_eq!(eval("-2 ** 2").unwrap(), Value::Number(-4.0));
    }

    #[test]
    fn logical_operators_short_circuit() {
        // The right side would fail with an unknown identifier if it were evaluated.
        assert_eq!(eval("false && missing").unwrap(), Value::Bool(false));
        assert_eq!(eval("true || missing").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 ?? missing").unwrap(), Value::Number(1.0));
        assert_eq!(eval("true ? 1 : missing").unwrap(), Value::Number(1.0));
        assert!(matches!(eval("1 && true"), Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn let_bindings_are_sequential() {
        assert_eq!(
            eval("let { a = 2, b = a * 3 } in a + b").unwrap(),
            Value::Number(8.0)
        );
        assert_eq!(
            eval("let { a = a } in a").unwrap_err(),
            EvalError::UnknownIdentifier("a".into())
        );
    }

    #[test]
    fn member_access_projects_over_tables_with_row_labels() {
        let mut table = Table::new("orders", ["sku", "qty"])
            .unwrap()
            .with_primary_key("sku")
            .unwrap();
        table.push_row(vec!["A".into(), 2.0.into()]).unwrap();
        table.push_row(vec!["B".into(), 3.0.into()]).unwrap();
        let mut env = Environment::new(StdLibrary::shared());
        env.define_table(table);
        env.define_input(
            "items",
            Value::Array(vec![
                Value::Record([("x", Value::from(1.0))].into_iter().collect()),
                Value::Record(Record::new()),
            ]),
        );

        assert_eq!(
            eval_with(&env, "orders.qty * 10").unwrap(),
            Value::Array(vec![20.0.into(), 30.0.into()])
        );
        assert_eq!(
            eval_with(&env, "orders[1].sku").unwrap(),
            Value::from("B")
        );
        let err = eval_with(&env, "items.x").unwrap_err();
        assert_eq!(err.to_string(), "row #2: unknown property 'x'");
        assert_eq!(
            eval_with(&env, "orders.price").unwrap_err(),
            EvalError::UnknownProperty("orders.price".into())
        );
    }

    #[test]
    fn indexing_checks_bounds() {
        assert_eq!(eval("[1, 2, 3][2]").unwrap(), Value::Number(3.0));
        assert!(matches!(
            eval("[1, 2, 3][3]"),
            Err(EvalError::IndexOutOfRange { len: 3, .. })
        ));
        assert!(matches!(eval("[1][-1]"), Err(EvalError::IndexOutOfRange { .. })));
        assert!(matches!(eval("[1][0.5]"), Err(EvalError::IndexOutOfRange { .. })));
        assert!(matches!(eval("[1][\"0\"]"), Err(EvalError::TypeMismatch(_))));
        assert_eq!(eval("{ \"a b\": 1 }[\"a b\"]").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn only_std_paths_are_callable() {
        assert!(matches!(
            eval("let { f = x => x } in f(1)"),
            Err(EvalError::DisallowedCall(_))
        ));
        assert!(matches!(eval("std.math(1)"), Err(EvalError::DisallowedCall(_))));
        assert!(matches!(
            eval("std.math.nope(1)"),
            Err(EvalError::UnknownProperty(_))
        ));
        assert_eq!(eval("std.math.abs(-2)").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn arity_is_checked_before_the_call() {
        let err = eval("std.math.abs(1, 2)").unwrap_err();
        assert_eq!(err.to_string(), "std.math.abs expects 1 argument(s), got 2");
    }

    #[test]
    fn closures_bind_missing_arguments_as_undefined() {
        assert_eq!(
            eval("std.array.map([1, 2], (x, i, extra) => extra ?? x + i)").unwrap(),
            Value::Array(vec![1.0.into(), 3.0.into()])
        );
        assert_eq!(
            eval("std.array.map([{ a: 1 }], ({ a, b }) => b ?? a)").unwrap(),
            Value::Array(vec![1.0.into()])
        );
        assert!(matches!(
            eval("std.array.map([1], ({ a }) => a)"),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn closures_capture_their_defining_scope() {
        assert_eq!(
            eval("let { k = 10 } in std.array.map([1, 2], x => x * k)").unwrap(),
            Value::Array(vec![10.0.into(), 20.0.into()])
        );
    }

    #[test]
    fn spreads_merge_records_and_ignore_null() {
        let value = eval("{ a: 1, ...{ b: 2, a: 3 }, ...null }").unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":3,"b":2}"#);
        assert!(matches!(eval("{ ...[1] }"), Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn depth_is_released_after_a_nesting_failure() {
        let env = Environment::new(StdLibrary::shared());
        let evaluator = Evaluator::new(&env, StdLibrary::shared());
        let runaway =
            parse_expression("let { f = s => std.array.map([s], s) } in std.array.map([f], f)")
                .unwrap();
        assert_eq!(
            evaluator.evaluate(&runaway),
            Err(EvalError::NestingLimit(MAX_EVAL_DEPTH))
        );
        assert_eq!(evaluator.depth.get(), 0);
        let ok = parse_expression("1 + 1").unwrap();
        assert_eq!(evaluator.evaluate(&ok), Ok(Value::Number(2.0)));
    }
}
