//! Time-value-of-money functions. Sign conventions follow spreadsheet practice: money paid
//! out is negative, money received is positive.

use crate::error::EvalResult;
use crate::eval::CallContext;
use crate::stdlib::{array_arg, finite, number_arg, numbers, optional_number, FunctionSpec};
use crate::value::Value;

/// Newton iterations `irr` may take before giving up.
const IRR_MAX_ITERATIONS: usize = 100;
const IRR_TOLERANCE: f64 = 1e-10;

/// Payment timing: 0 at period end, 1 at period start.
fn timing(ctx: &CallContext<'_>, args: &[Value], idx: usize) -> EvalResult<f64> {
    match optional_number(ctx, args, idx)? {
        None => Ok(0.0),
        Some(t) if t == 0.0 || t == 1.0 => Ok(t),
        Some(_) => Err(ctx.fail("type must be 0 (end of period) or 1 (start of period)")),
    }
}

inventory::submit! {
    FunctionSpec {
        path: "finance.pv",
        min_args: 3,
        max_args: 5,
        implementation: pv_fn,
    }
}

/// `pv(rate, nper, pmt, fv?, type?)`.
fn pv_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let rate = number_arg(ctx, args, 0)?;
    let nper = number_arg(ctx, args, 1)?;
    let pmt = number_arg(ctx, args, 2)?;
    let fv = optional_number(ctx, args, 3)?.unwrap_or(0.0);
    let kind = timing(ctx, args, 4)?;
    let pv = if rate == 0.0 {
        -(fv + pmt * nper)
    } else {
        let growth = (1.0 + rate).powf(nper);
        -(fv + pmt * (1.0 + rate * kind) * (growth - 1.0) / rate) / growth
    };
    finite(ctx, pv)
}

inventory::submit! {
    FunctionSpec {
        path: "finance.fv",
        min_args: 3,
        max_args: 5,
        implementation: fv_fn,
    }
}

/// `fv(rate, nper, pmt, pv?, type?)`.
fn fv_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let rate = number_arg(ctx, args, 0)?;
    let nper = number_arg(ctx, args, 1)?;
    let pmt = number_arg(ctx, args, 2)?;
    let pv = optional_number(ctx, args, 3)?.unwrap_or(0.0);
    let kind = timing(ctx, args, 4)?;
    let fv = if rate == 0.0 {
        -(pv + pmt * nper)
    } else {
        let growth = (1.0 + rate).powf(nper);
        -(pv * growth + pmt * (1.0 + rate * kind) * (growth - 1.0) / rate)
    };
    finite(ctx, fv)
}

inventory::submit! {
    FunctionSpec {
        path: "finance.pmt",
        min_args: 3,
        max_args: 5,
        implementation: pmt_fn,
    }
}

/// `pmt(rate, nper, pv, fv?, type?)`.
fn pmt_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let rate = number_arg(ctx, args, 0)?;
    let nper = number_arg(ctx, args, 1)?;
    let pv = number_arg(ctx, args, 2)?;
    let fv = optional_number(ctx, args, 3)?.unwrap_or(0.0);
    let kind = timing(ctx, args, 4)?;
    if nper == 0.0 {
        return Err(ctx.fail("nper must not be zero"));
    }
    let pmt = if rate == 0.0 {
        -(pv + fv) / nper
    } else {
        let growth = (1.0 + rate).powf(nper);
        -(rate * (fv + pv * growth)) / ((1.0 + rate * kind) * (growth - 1.0))
    };
    finite(ctx, pmt)
}

inventory::submit! {
    FunctionSpec {
        path: "finance.npv",
        min_args: 2,
        max_args: 2,
        implementation: npv_fn,
    }
}

/// `npv(rate, cashflows)`; the first cash flow is discounted one full period.
fn npv_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let rate = number_arg(ctx, args, 0)?;
    if rate == -1.0 {
        return Err(ctx.fail("rate must not be -1"));
    }
    let flows = numbers(ctx, array_arg(ctx, args, 1)?)?;
    let npv: f64 = flows
        .iter()
        .enumerate()
        .map(|(i, cf)| cf / (1.0 + rate).powi(i as i32 + 1))
        .sum();
    finite(ctx, npv)
}

inventory::submit! {
    FunctionSpec {
        path: "finance.irr",
        min_args: 1,
        max_args: 2,
        implementation: irr_fn,
    }
}

/// `irr(cashflows, guess?)` by Newton's method, capped at [`IRR_MAX_ITERATIONS`].
fn irr_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let flows = numbers(ctx, array_arg(ctx, args, 0)?)?;
    if !flows.iter().any(|cf| *cf > 0.0) || !flows.iter().any(|cf| *cf < 0.0) {
        return Err(ctx.fail("cash flows need at least one positive and one negative value"));
    }
    let mut rate = optional_number(ctx, args, 1)?.unwrap_or(0.1);
    for _ in 0..IRR_MAX_ITERATIONS {
        let (value, derivative) = flows.iter().enumerate().fold(
            (0.0, 0.0),
            |(value, derivative), (i, cf)| {
                let discount = (1.0 + rate).powi(i as i32);
                (
                    value + cf / discount,
                    derivative - i as f64 * cf / (discount * (1.0 + rate)),
                )
            },
        );
        if derivative == 0.0 || !derivative.is_finite() {
            break;
        }
        let next = rate - value / derivative;
        if !next.is_finite() || next <= -1.0 {
            break;
        }
        if (next - rate).abs() < IRR_TOLERANCE {
            return finite(ctx, next);
        }
        rate = next;
    }
    Err(ctx.fail(format!(
        "did not converge within {IRR_MAX_ITERATIONS} iterations"
    )))
}
