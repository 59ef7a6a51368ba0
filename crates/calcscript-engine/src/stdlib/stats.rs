use crate::error::EvalResult;
use crate::eval::CallContext;
use crate::stdlib::{array_arg, finite, numbers, FunctionSpec};
use crate::value::Value;

fn sample(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Vec<f64>> {
    numbers(ctx, array_arg(ctx, args, 0)?)
}

fn non_empty(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Vec<f64>> {
    let values = sample(ctx, args)?;
    if values.is_empty() {
        return Err(ctx.fail("expected a non-empty array"));
    }
    Ok(values)
}

inventory::submit! {
    FunctionSpec {
        path: "stats.sum",
        min_args: 1,
        max_args: 1,
        implementation: sum_fn,
    }
}

fn sum_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    finite(ctx, sample(ctx, args)?.into_iter().sum())
}

inventory::submit! {
    FunctionSpec {
        path: "stats.mean",
        min_args: 1,
        max_args: 1,
        implementation: mean_fn,
    }
}

fn mean_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let values = non_empty(ctx, args)?;
    let sum: f64 = values.iter().sum();
    finite(ctx, sum / values.len() as f64)
}

inventory::submit! {
    FunctionSpec {
        path: "stats.median",
        min_args: 1,
        max_args: 1,
        implementation: median_fn,
    }
}

fn median_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let mut values = non_empty(ctx, args)?;
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    finite(ctx, median)
}

inventory::submit! {
    FunctionSpec {
        path: "stats.min",
        min_args: 1,
        max_args: 1,
        implementation: min_fn,
    }
}

fn min_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let values = non_empty(ctx, args)?;
    finite(ctx, values.into_iter().fold(f64::INFINITY, f64::min))
}

inventory::submit! {
    FunctionSpec {
        path: "stats.max",
        min_args: 1,
        max_args: 1,
        implementation: max_fn,
    }
}

fn max_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let values = non_empty(ctx, args)?;
    finite(ctx, values.into_iter().fold(f64::NEG_INFINITY, f64::max))
}

inventory::submit! {
    FunctionSpec {
        path: "stats.count",
        min_args: 1,
        max_args: 1,
        implementation: count_fn,
    }
}

/// Number of elements, whatever their kind.
fn count_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(array_arg(ctx, args, 0)?.len() as f64))
}
