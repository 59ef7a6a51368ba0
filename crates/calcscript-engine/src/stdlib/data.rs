use crate::ast::is_banned_name;
use crate::error::{EvalError, EvalResult};
use crate::eval::CallContext;
use crate::stdlib::{record_arg, text_arg, FunctionSpec};
use crate::value::Value;

fn key_arg<'v>(ctx: &CallContext<'_>, args: &'v [Value]) -> EvalResult<&'v str> {
    let key = text_arg(ctx, args, 1)?;
    if is_banned_name(key) {
        return Err(EvalError::BannedIdentifier(key.to_string()));
    }
    Ok(key)
}

inventory::submit! {
    FunctionSpec {
        path: "data.keys",
        min_args: 1,
        max_args: 1,
        implementation: keys_fn,
    }
}

fn keys_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let record = record_arg(ctx, args, 0)?;
    Ok(Value::Array(record.keys().map(Value::from).collect()))
}

inventory::submit! {
    FunctionSpec {
        path: "data.values",
        min_args: 1,
        max_args: 1,
        implementation: values_fn,
    }
}

fn values_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let record = record_arg(ctx, args, 0)?;
    Ok(Value::Array(record.values().cloned().collect()))
}

inventory::submit! {
    FunctionSpec {
        path: "data.has",
        min_args: 2,
        max_args: 2,
        implementation: has_fn,
    }
}

fn has_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let record = record_arg(ctx, args, 0)?;
    let key = key_arg(ctx, args)?;
    Ok(Value::Bool(record.contains_key(key)))
}

inventory::submit! {
    FunctionSpec {
        path: "data.get",
        min_args: 2,
        max_args: 3,
        implementation: get_fn,
    }
}

/// `get(record, key, default?)`: the own property, else `default`, else `null`.
fn get_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let record = record_arg(ctx, args, 0)?;
    let key = key_arg(ctx, args)?;
    Ok(record
        .get(key)
        .or_else(|| args.get(2))
        .cloned()
        .unwrap_or(Value::Null))
}
