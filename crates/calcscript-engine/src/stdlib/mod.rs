//! The standard-library capability reachable through `std`.
//!
//! Functions register themselves with [`inventory::submit!`] as [`FunctionSpec`] records keyed by
//! a dotted path (`math.round`). [`StdLibrary`] assembles them once into a read-only tree of
//! records and remembers the identity of every function it contains; the evaluator refuses to
//! call any function value that is not in that set.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;

use crate::error::{EvalError, EvalResult};
use crate::eval::CallContext;
use crate::value::{Record, Table, Value};

mod array;
mod assert;
mod data;
mod date;
mod finance;
mod logic;
mod lookup;
mod math;
mod stats;
mod table;
mod text;

/// `max_args` for variadic functions.
pub const VAR_ARGS: usize = 255;

pub type FunctionImpl = fn(&CallContext<'_>, &[Value]) -> EvalResult<Value>;

#[derive(Clone, Copy)]
pub struct FunctionSpec {
    /// Dotted path below `std`, e.g. `math.round`.
    pub path: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub implementation: FunctionImpl,
}

impl fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("path", &self.path)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

inventory::collect!(FunctionSpec);

/// Iterate all [`FunctionSpec`] registrations collected via [`inventory`].
pub fn iter_function_specs() -> impl Iterator<Item = &'static FunctionSpec> {
    inventory::iter::<FunctionSpec>.into_iter()
}

fn spec_address(spec: &FunctionSpec) -> usize {
    spec as *const FunctionSpec as usize
}

#[derive(Debug)]
pub struct StdLibrary {
    root: Record,
    functions: Vec<&'static FunctionSpec>,
    registered: HashSet<usize>,
}

impl StdLibrary {
    /// A library holding every registered function.
    pub fn new() -> Self {
        Self::from_specs(iter_function_specs())
    }

    /// The process-wide library, built on first use.
    pub fn shared() -> &'static StdLibrary {
        static SHARED: OnceLock<StdLibrary> = OnceLock::new();
        SHARED.get_or_init(StdLibrary::new)
    }

    /// A library holding exactly `specs`. Later duplicates of a path are ignored.
    pub fn from_specs(specs: impl IntoIterator<Item = &'static FunctionSpec>) -> Self {
        let mut functions: Vec<&'static FunctionSpec> = specs.into_iter().collect();
        functions.sort_by_key(|spec| spec.path);
        functions.dedup_by_key(|spec| spec.path);

        let mut root = Record::new();
        for spec in &functions {
            insert_path(&mut root, spec);
        }

        let mut registered = HashSet::new();
        collect_functions(&root, &mut registered);
        log::debug!("std library built with {} function(s)", registered.len());

        Self {
            root,
            functions,
            registered,
        }
    }

    /// The `std` record.
    pub fn root(&self) -> &Record {
        &self.root
    }

    /// Whether `spec` is one of this library's functions (by identity, not by path).
    pub fn is_registered(&self, spec: &FunctionSpec) -> bool {
        self.registered.contains(&spec_address(spec))
    }

    pub fn lookup(&self, path: &str) -> Option<&'static FunctionSpec> {
        let mut current = &self.root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match (current.get(segment)?, segments.peek()) {
                (Value::Record(next), Some(_)) => current = next,
                (Value::Function(spec), None) => return Some(*spec),
                _ => return None,
            }
        }
        None
    }

    /// Every function, sorted by path.
    pub fn functions(&self) -> &[&'static FunctionSpec] {
        &self.functions
    }
}

impl Default for StdLibrary {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_path(root: &mut Record, spec: &'static FunctionSpec) {
    let mut segments: Vec<&str> = spec.path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };
    let mut current = root;
    for segment in segments {
        if !current.contains_key(segment) {
            current.insert(segment, Value::Record(Record::new()));
        }
        current = match current.get_mut(segment) {
            Some(Value::Record(next)) => next,
            _ => {
                log::warn!("std path {} collides with a function; skipping", spec.path);
                return;
            }
        };
    }
    if current.contains_key(leaf) {
        log::warn!("std path {} collides with a namespace; skipping", spec.path);
        return;
    }
    current.insert(leaf, Value::Function(spec));
}

fn collect_functions(record: &Record, out: &mut HashSet<usize>) {
    for value in record.values() {
        match value {
            Value::Function(spec) => {
                out.insert(spec_address(spec));
            }
            Value::Record(inner) => collect_functions(inner, out),
            _ => {}
        }
    }
}

// Argument helpers shared by the namespaces. `idx` is zero-based; messages use 1-based
// positions.

static UNDEFINED: Value = Value::Undefined;

fn arg<'v>(args: &'v [Value], idx: usize) -> &'v Value {
    args.get(idx).unwrap_or(&UNDEFINED)
}

fn wrong_type(ctx: &CallContext<'_>, idx: usize, expected: &str, got: &Value) -> EvalError {
    ctx.fail(format!(
        "argument {} must be {expected}, got {}",
        idx + 1,
        got.type_name()
    ))
}

pub(crate) fn number_arg(ctx: &CallContext<'_>, args: &[Value], idx: usize) -> EvalResult<f64> {
    match arg(args, idx) {
        Value::Number(n) if n.is_finite() => Ok(*n),
        other => Err(wrong_type(ctx, idx, "a finite number", other)),
    }
}

pub(crate) fn optional_number(
    ctx: &CallContext<'_>,
    args: &[Value],
    idx: usize,
) -> EvalResult<Option<f64>> {
    if arg(args, idx).is_absent() {
        return Ok(None);
    }
    number_arg(ctx, args, idx).map(Some)
}

pub(crate) fn integer_arg(ctx: &CallContext<'_>, args: &[Value], idx: usize) -> EvalResult<i64> {
    let n = number_arg(ctx, args, idx)?;
    if n.fract() != 0.0 || n.abs() > i32::MAX as f64 {
        return Err(ctx.fail(format!("argument {} must be an integer", idx + 1)));
    }
    Ok(n as i64)
}

pub(crate) fn text_arg<'v>(
    ctx: &CallContext<'_>,
    args: &'v [Value],
    idx: usize,
) -> EvalResult<&'v str> {
    match arg(args, idx) {
        Value::Text(s) => Ok(s),
        other => Err(wrong_type(ctx, idx, "a string", other)),
    }
}

pub(crate) fn bool_arg(ctx: &CallContext<'_>, args: &[Value], idx: usize) -> EvalResult<bool> {
    match arg(args, idx) {
        Value::Bool(b) => Ok(*b),
        other => Err(wrong_type(ctx, idx, "a boolean", other)),
    }
}

pub(crate) fn array_arg<'v>(
    ctx: &CallContext<'_>,
    args: &'v [Value],
    idx: usize,
) -> EvalResult<&'v [Value]> {
    match arg(args, idx) {
        Value::Array(items) => Ok(items),
        other => Err(wrong_type(ctx, idx, "an array", other)),
    }
}

pub(crate) fn record_arg<'v>(
    ctx: &CallContext<'_>,
    args: &'v [Value],
    idx: usize,
) -> EvalResult<&'v Record> {
    match arg(args, idx) {
        Value::Record(record) => Ok(record),
        other => Err(wrong_type(ctx, idx, "a record", other)),
    }
}

pub(crate) fn table_arg<'v>(
    ctx: &CallContext<'_>,
    args: &'v [Value],
    idx: usize,
) -> EvalResult<&'v Arc<Table>> {
    match arg(args, idx) {
        Value::Table(table) => Ok(table),
        other => Err(wrong_type(ctx, idx, "a table", other)),
    }
}

pub(crate) fn date_arg(ctx: &CallContext<'_>, args: &[Value], idx: usize) -> EvalResult<NaiveDate> {
    match arg(args, idx) {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date()),
        other => Err(wrong_type(ctx, idx, "a date", other)),
    }
}

/// Every element of `items` as a finite number.
pub(crate) fn numbers(ctx: &CallContext<'_>, items: &[Value]) -> EvalResult<Vec<f64>> {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Number(n) if n.is_finite() => Ok(*n),
            other => Err(ctx.fail(format!(
                "element {} must be a finite number, got {}",
                idx + 1,
                other.type_name()
            ))),
        })
        .collect()
}

/// Wrap a numeric result, rejecting NaN and infinities.
pub(crate) fn finite(ctx: &CallContext<'_>, n: f64) -> EvalResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(EvalError::NonFinite(format!("std.{}", ctx.function())))
    }
}

/// Apply a numeric function to a number or, element-wise, to an array of numbers.
pub(crate) fn map_numeric<F>(ctx: &CallContext<'_>, value: &Value, f: &F) -> EvalResult<Value>
where
    F: Fn(f64) -> EvalResult<f64>,
{
    match value {
        Value::Number(n) if n.is_finite() => finite(ctx, f(*n)?),
        Value::Array(items) => items
            .iter()
            .map(|item| map_numeric(ctx, item, f))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        other => Err(ctx.fail(format!(
            "expected a finite number or array of numbers, got {}",
            other.type_name()
        ))),
    }
}
