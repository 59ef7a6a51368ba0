//! The CalcScript evaluator.
//!
//! Evaluation is a plain recursive walk returning [`EvalResult`]. Failures stop at the first
//! violated rule; the scheduler isolates them per node.

mod env;
mod evaluator;
mod ops;

pub use env::{Environment, Scope};
pub use evaluator::{CallContext, Evaluator, MAX_EVAL_DEPTH};

pub(crate) use ops::equals;

use crate::ast::Expr;
use crate::error::EvalResult;
use crate::stdlib::StdLibrary;
use crate::value::Value;

/// Evaluate `expr` against `env` with no timestamp override.
pub fn evaluate(expr: &Expr, env: &Environment, std: &StdLibrary) -> EvalResult<Value> {
    Evaluator::new(env, std).evaluate(expr)
}
