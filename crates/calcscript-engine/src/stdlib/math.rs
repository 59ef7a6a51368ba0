use crate::error::EvalResult;
use crate::eval::CallContext;
use crate::stdlib::{finite, integer_arg, map_numeric, number_arg, numbers, FunctionSpec, VAR_ARGS};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        path: "math.abs",
        min_args: 1,
        max_args: 1,
        implementation: abs_fn,
    }
}

fn abs_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    map_numeric(ctx, &args[0], &|x| Ok(x.abs()))
}

inventory::submit! {
    FunctionSpec {
        path: "math.round",
        min_args: 1,
        max_args: 2,
        implementation: round_fn,
    }
}

/// Round half away from zero to `digits` decimal places (negative digits round to tens,
/// hundreds, ...).
fn round_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let digits = match args.get(1) {
        Some(v) if !v.is_absent() => integer_arg(ctx, args, 1)?,
        _ => 0,
    };
    if digits.abs() > 15 {
        return Err(ctx.fail("digits must be between -15 and 15"));
    }
    let scale = 10f64.powi(digits as i32);
    map_numeric(ctx, &args[0], &|x| Ok((x * scale).round() / scale))
}

inventory::submit! {
    FunctionSpec {
        path: "math.floor",
        min_args: 1,
        max_args: 1,
        implementation: floor_fn,
    }
}

fn floor_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    map_numeric(ctx, &args[0], &|x| Ok(x.floor()))
}

inventory::submit! {
    FunctionSpec {
        path: "math.ceil",
        min_args: 1,
        max_args: 1,
        implementation: ceil_fn,
    }
}

fn ceil_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    map_numeric(ctx, &args[0], &|x| Ok(x.ceil()))
}

inventory::submit! {
    FunctionSpec {
        path: "math.sqrt",
        min_args: 1,
        max_args: 1,
        implementation: sqrt_fn,
    }
}

fn sqrt_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    map_numeric(ctx, &args[0], &|x| {
        if x < 0.0 {
            return Err(ctx.fail("cannot take the square root of a negative number"));
        }
        Ok(x.sqrt())
    })
}

inventory::submit! {
    FunctionSpec {
        path: "math.pow",
        min_args: 2,
        max_args: 2,
        implementation: pow_fn,
    }
}

fn pow_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let base = number_arg(ctx, args, 0)?;
    let exponent = number_arg(ctx, args, 1)?;
    finite(ctx, base.powf(exponent))
}

/// Numbers from every argument, flattening one level of arrays.
fn flatten_numbers(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Vec<f64>> {
    let mut out = Vec::new();
    for value in args {
        match value {
            Value::Array(items) => out.extend(numbers(ctx, items)?),
            other => out.extend(numbers(ctx, std::slice::from_ref(other))?),
        }
    }
    if out.is_empty() {
        return Err(ctx.fail("expected at least one number"));
    }
    Ok(out)
}

inventory::submit! {
    FunctionSpec {
        path: "math.min",
        min_args: 1,
        max_args: VAR_ARGS,
        implementation: min_fn,
    }
}

fn min_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let values = flatten_numbers(ctx, args)?;
    finite(ctx, values.into_iter().fold(f64::INFINITY, f64::min))
}

inventory::submit! {
    FunctionSpec {
        path: "math.max",
        min_args: 1,
        max_args: VAR_ARGS,
        implementation: max_fn,
    }
}

fn max_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let values = flatten_numbers(ctx, args)?;
    finite(ctx, values.into_iter().fold(f64::NEG_INFINITY, f64::max))
}

inventory::submit! {
    FunctionSpec {
        path: "math.clamp",
        min_args: 3,
        max_args: 3,
        implementation: clamp_fn,
    }
}

fn clamp_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let x = number_arg(ctx, args, 0)?;
    let lo = number_arg(ctx, args, 1)?;
    let hi = number_arg(ctx, args, 2)?;
    if lo > hi {
        return Err(ctx.fail(format!("lower bound {lo} exceeds upper bound {hi}")));
    }
    Ok(Value::Number(x.clamp(lo, hi)))
}
