use crate::error::{EvalError, EvalResult};
use crate::eval::{equals, CallContext};
use crate::stdlib::{array_arg, table_arg, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        path: "lookup.byKey",
        min_args: 2,
        max_args: 2,
        implementation: by_key_fn,
    }
}

/// The row whose primary key equals `key`, or `null` when there is none.
fn by_key_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let table = table_arg(ctx, args, 0)?;
    if table.primary_key.is_none() {
        return Err(ctx.fail(format!("table {} has no primary key", table.name)));
    }
    Ok(table
        .find_row_by_key(&args[1])
        .map_or(Value::Null, |idx| Value::Record(table.rows[idx].clone())))
}

inventory::submit! {
    FunctionSpec {
        path: "lookup.xlookup",
        min_args: 3,
        max_args: 4,
        implementation: xlookup_fn,
    }
}

/// `xlookup(needle, keys, values, default?)`: the value paired with the first matching key.
fn xlookup_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let needle = &args[0];
    let keys = array_arg(ctx, args, 1)?;
    let values = array_arg(ctx, args, 2)?;
    if keys.len() != values.len() {
        return Err(EvalError::LengthMismatch {
            left: keys.len(),
            right: values.len(),
        });
    }
    for (key, value) in keys.iter().zip(values) {
        // Keys of another kind simply don't match.
        if equals(needle, key).unwrap_or(false) {
            return Ok(value.clone());
        }
    }
    match args.get(3) {
        Some(default) => Ok(default.clone()),
        None => Err(ctx.fail(format!("no match for {}", needle.label()))),
    }
}
