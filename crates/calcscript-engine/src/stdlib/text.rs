use crate::error::EvalResult;
use crate::eval::CallContext;
use crate::stdlib::{array_arg, text_arg, FunctionSpec};
use crate::value::{format_number, Value};

inventory::submit! {
    FunctionSpec {
        path: "text.upper",
        min_args: 1,
        max_args: 1,
        implementation: upper_fn,
    }
}

fn upper_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Text(text_arg(ctx, args, 0)?.to_uppercase()))
}

inventory::submit! {
    FunctionSpec {
        path: "text.lower",
        min_args: 1,
        max_args: 1,
        implementation: lower_fn,
    }
}

fn lower_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Text(text_arg(ctx, args, 0)?.to_lowercase()))
}

inventory::submit! {
    FunctionSpec {
        path: "text.trim",
        min_args: 1,
        max_args: 1,
        implementation: trim_fn,
    }
}

fn trim_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Text(text_arg(ctx, args, 0)?.trim().to_string()))
}

inventory::submit! {
    FunctionSpec {
        path: "text.len",
        min_args: 1,
        max_args: 1,
        implementation: len_fn,
    }
}

/// Length in characters, not bytes.
fn len_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(text_arg(ctx, args, 0)?.chars().count() as f64))
}

inventory::submit! {
    FunctionSpec {
        path: "text.join",
        min_args: 1,
        max_args: 2,
        implementation: join_fn,
    }
}

fn join_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let items = array_arg(ctx, args, 0)?;
    let separator = match args.get(1) {
        Some(v) if !v.is_absent() => text_arg(ctx, args, 1)?,
        _ => ",",
    };
    let parts = items
        .iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Text(s) => Ok(s.clone()),
            Value::Number(n) if n.is_finite() => Ok(format_number(*n)),
            other => Err(ctx.fail(format!(
                "element {} must be a string or number, got {}",
                idx + 1,
                other.type_name()
            ))),
        })
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(Value::Text(parts.join(separator)))
}

inventory::submit! {
    FunctionSpec {
        path: "text.contains",
        min_args: 2,
        max_args: 2,
        implementation: contains_fn,
    }
}

fn contains_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let haystack = text_arg(ctx, args, 0)?;
    let needle = text_arg(ctx, args, 1)?;
    Ok(Value::Bool(haystack.contains(needle)))
}
