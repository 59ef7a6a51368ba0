use crate::error::EvalResult;
use crate::eval::CallContext;
use crate::stdlib::{array_arg, bool_arg, FunctionSpec, VAR_ARGS};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        path: "logic.not",
        min_args: 1,
        max_args: 1,
        implementation: not_fn,
    }
}

fn not_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(!bool_arg(ctx, args, 0)?))
}

fn booleans(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Vec<bool>> {
    array_arg(ctx, args, 0)?
        .iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Bool(b) => Ok(*b),
            other => Err(ctx.fail(format!(
                "element {} must be a boolean, got {}",
                idx + 1,
                other.type_name()
            ))),
        })
        .collect()
}

inventory::submit! {
    FunctionSpec {
        path: "logic.all",
        min_args: 1,
        max_args: 1,
        implementation: all_fn,
    }
}

fn all_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(booleans(ctx, args)?.into_iter().all(|b| b)))
}

inventory::submit! {
    FunctionSpec {
        path: "logic.any",
        min_args: 1,
        max_args: 1,
        implementation: any_fn,
    }
}

fn any_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(booleans(ctx, args)?.into_iter().any(|b| b)))
}

inventory::submit! {
    FunctionSpec {
        path: "logic.coalesce",
        min_args: 1,
        max_args: VAR_ARGS,
        implementation: coalesce_fn,
    }
}

/// First argument that is neither `null` nor `undefined`, else `null`.
fn coalesce_fn(_ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(args
        .iter()
        .find(|value| !value.is_absent())
        .cloned()
        .unwrap_or(Value::Null))
}
