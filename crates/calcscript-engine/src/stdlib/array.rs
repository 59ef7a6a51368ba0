use std::cmp::Ordering;

use crate::error::{EvalError, EvalResult};
use crate::eval::CallContext;
use crate::stdlib::{array_arg, number_arg, optional_number, FunctionSpec};
use crate::value::Value;

/// Upper bound on `range` output so a typo can't allocate unbounded memory.
const MAX_RANGE_LEN: usize = 1_000_000;

inventory::submit! {
    FunctionSpec {
        path: "array.len",
        min_args: 1,
        max_args: 1,
        implementation: len_fn,
    }
}

fn len_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let len = match &args[0] {
        Value::Table(table) => table.rows.len(),
        _ => array_arg(ctx, args, 0)?.len(),
    };
    Ok(Value::Number(len as f64))
}

inventory::submit! {
    FunctionSpec {
        path: "array.map",
        min_args: 2,
        max_args: 2,
        implementation: map_fn,
    }
}

/// `map(array, (item, index) => ...)`.
fn map_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let items = array_arg(ctx, args, 0)?;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| ctx.call(&args[1], &[item.clone(), Value::Number(idx as f64)]))
        .collect::<EvalResult<Vec<_>>>()
        .map(Value::Array)
}

/// Run a predicate callback, requiring a boolean result.
pub(super) fn predicate(
    ctx: &CallContext<'_>,
    callback: &Value,
    args: &[Value],
) -> EvalResult<bool> {
    match ctx.call(callback, args)? {
        Value::Bool(b) => Ok(b),
        other => Err(ctx.fail(format!(
            "predicate must return a boolean, got {}",
            other.type_name()
        ))),
    }
}

inventory::submit! {
    FunctionSpec {
        path: "array.filter",
        min_args: 2,
        max_args: 2,
        implementation: filter_fn,
    }
}

fn filter_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let items = array_arg(ctx, args, 0)?;
    let mut out = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        if predicate(ctx, &args[1], &[item.clone(), Value::Number(idx as f64)])? {
            out.push(item.clone());
        }
    }
    Ok(Value::Array(out))
}

inventory::submit! {
    FunctionSpec {
        path: "array.reduce",
        min_args: 3,
        max_args: 3,
        implementation: reduce_fn,
    }
}

/// `reduce(array, (acc, item, index) => ..., init)`.
fn reduce_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let items = array_arg(ctx, args, 0)?;
    let mut acc = args[2].clone();
    for (idx, item) in items.iter().enumerate() {
        acc = ctx.call(&args[1], &[acc, item.clone(), Value::Number(idx as f64)])?;
    }
    Ok(acc)
}

inventory::submit! {
    FunctionSpec {
        path: "array.range",
        min_args: 2,
        max_args: 3,
        implementation: range_fn,
    }
}

/// `range(start, end, step?)`: `start` inclusive, `end` exclusive.
fn range_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let start = number_arg(ctx, args, 0)?;
    let end = number_arg(ctx, args, 1)?;
    let step = optional_number(ctx, args, 2)?.unwrap_or(1.0);
    if step == 0.0 {
        return Err(ctx.fail("step must not be zero"));
    }
    let count = ((end - start) / step).ceil();
    if count <= 0.0 {
        return Ok(Value::Array(Vec::new()));
    }
    if count > MAX_RANGE_LEN as f64 {
        return Err(ctx.fail(format!("range would exceed {MAX_RANGE_LEN} elements")));
    }
    Ok(Value::Array(
        (0..count as usize)
            .map(|i| Value::Number(start + step * i as f64))
            .collect(),
    ))
}

inventory::submit! {
    FunctionSpec {
        path: "array.first",
        min_args: 1,
        max_args: 1,
        implementation: first_fn,
    }
}

/// First element, or `null` for an empty array.
fn first_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(array_arg(ctx, args, 0)?.first().cloned().unwrap_or(Value::Null))
}

inventory::submit! {
    FunctionSpec {
        path: "array.last",
        min_args: 1,
        max_args: 1,
        implementation: last_fn,
    }
}

fn last_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(array_arg(ctx, args, 0)?.last().cloned().unwrap_or(Value::Null))
}

inventory::submit! {
    FunctionSpec {
        path: "array.sort",
        min_args: 1,
        max_args: 1,
        implementation: sort_fn,
    }
}

/// Ascending sort of numbers, strings, dates or datetimes. Mixed kinds fail.
fn sort_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let mut items = array_arg(ctx, args, 0)?.to_vec();
    let mut failure: Option<EvalError> = None;
    items.sort_by(|a, b| match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        _ => {
            failure.get_or_insert_with(|| {
                ctx.fail(format!(
                    "cannot sort {} together with {}",
                    a.type_name(),
                    b.type_name()
                ))
            });
            Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::Array(items)),
    }
}
