use crate::error::EvalResult;
use crate::eval::{equals, CallContext};
use crate::stdlib::{bool_arg, text_arg, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        path: "assert.that",
        min_args: 1,
        max_args: 2,
        implementation: that_fn,
    }
}

fn that_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    if bool_arg(ctx, args, 0)? {
        return Ok(Value::Bool(true));
    }
    let message = match args.get(1) {
        Some(v) if !v.is_absent() => text_arg(ctx, args, 1)?,
        _ => "assertion failed",
    };
    Err(ctx.fail(message))
}

inventory::submit! {
    FunctionSpec {
        path: "assert.equal",
        min_args: 2,
        max_args: 2,
        implementation: equal_fn,
    }
}

fn equal_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    if equals(&args[0], &args[1])? {
        return Ok(Value::Bool(true));
    }
    Err(ctx.fail(format!(
        "expected {} to equal {}",
        args[0].label(),
        args[1].label()
    )))
}
