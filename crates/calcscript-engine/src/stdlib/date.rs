use chrono::{Datelike, Days, NaiveDate};

use crate::error::EvalResult;
use crate::eval::CallContext;
use crate::stdlib::{date_arg, integer_arg, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        path: "date.now",
        min_args: 0,
        max_args: 0,
        implementation: now_fn,
    }
}

/// The run's timestamp override. There is no live clock.
fn now_fn(ctx: &CallContext<'_>, _args: &[Value]) -> EvalResult<Value> {
    ctx.now()
        .map(Value::DateTime)
        .ok_or_else(|| ctx.fail("no timestamp override was supplied for this run"))
}

inventory::submit! {
    FunctionSpec {
        path: "date.today",
        min_args: 0,
        max_args: 0,
        implementation: today_fn,
    }
}

fn today_fn(ctx: &CallContext<'_>, _args: &[Value]) -> EvalResult<Value> {
    ctx.now()
        .map(|now| Value::Date(now.date()))
        .ok_or_else(|| ctx.fail("no timestamp override was supplied for this run"))
}

inventory::submit! {
    FunctionSpec {
        path: "date.date",
        min_args: 3,
        max_args: 3,
        implementation: date_fn,
    }
}

fn date_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let year = integer_arg(ctx, args, 0)?;
    let month = integer_arg(ctx, args, 1)?;
    let day = integer_arg(ctx, args, 2)?;
    let date = i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d));
    date.map(Value::Date)
        .ok_or_else(|| ctx.fail(format!("{year}-{month}-{day} is not a valid date")))
}

inventory::submit! {
    FunctionSpec {
        path: "date.year",
        min_args: 1,
        max_args: 1,
        implementation: year_fn,
    }
}

fn year_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(date_arg(ctx, args, 0)?.year() as f64))
}

inventory::submit! {
    FunctionSpec {
        path: "date.month",
        min_args: 1,
        max_args: 1,
        implementation: month_fn,
    }
}

fn month_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(date_arg(ctx, args, 0)?.month() as f64))
}

inventory::submit! {
    FunctionSpec {
        path: "date.day",
        min_args: 1,
        max_args: 1,
        implementation: day_fn,
    }
}

fn day_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(date_arg(ctx, args, 0)?.day() as f64))
}

inventory::submit! {
    FunctionSpec {
        path: "date.addDays",
        min_args: 2,
        max_args: 2,
        implementation: add_days_fn,
    }
}

/// Shift a date or datetime by a whole number of days, keeping its kind.
fn add_days_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let days = integer_arg(ctx, args, 1)?;
    let delta = Days::new(days.unsigned_abs());
    let shifted = match &args[0] {
        Value::DateTime(dt) if days >= 0 => dt.checked_add_days(delta).map(Value::DateTime),
        Value::DateTime(dt) => dt.checked_sub_days(delta).map(Value::DateTime),
        _ => {
            let date = date_arg(ctx, args, 0)?;
            if days >= 0 {
                date.checked_add_days(delta).map(Value::Date)
            } else {
                date.checked_sub_days(delta).map(Value::Date)
            }
        }
    };
    shifted.ok_or_else(|| ctx.fail("date out of range"))
}

inventory::submit! {
    FunctionSpec {
        path: "date.diffDays",
        min_args: 2,
        max_args: 2,
        implementation: diff_days_fn,
    }
}

/// Whole days from the first date to the second.
fn diff_days_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let from = date_arg(ctx, args, 0)?;
    let to = date_arg(ctx, args, 1)?;
    Ok(Value::Number(to.signed_duration_since(from).num_days() as f64))
}
