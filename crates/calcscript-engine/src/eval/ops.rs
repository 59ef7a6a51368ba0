//! Operator semantics: broadcasting arithmetic, concatenation, comparison and equality.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{EvalError, EvalResult};
use crate::value::{format_number, Value};

/// Apply `f` element-wise. Arrays pair up by position and must have equal lengths; a scalar
/// on either side is broadcast across the other side's elements. Nested arrays recurse.
pub(crate) fn broadcast<F>(left: &Value, right: &Value, f: &F) -> EvalResult<Value>
where
    F: Fn(&Value, &Value) -> EvalResult<Value>,
{
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => {
            if l.len() != r.len() {
                return Err(EvalError::LengthMismatch {
                    left: l.len(),
                    right: r.len(),
                });
            }
            l.iter()
                .zip(r)
                .map(|(a, b)| broadcast(a, b, f))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Array)
        }
        (Value::Array(l), _) => l
            .iter()
            .map(|a| broadcast(a, right, f))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        (_, Value::Array(r)) => r
            .iter()
            .map(|b| broadcast(left, b, f))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        _ => f(left, right),
    }
}

fn finite_operand(op: &str, value: &Value) -> EvalResult<f64> {
    match value {
        Value::Number(n) if n.is_finite() => Ok(*n),
        Value::Number(_) => Err(EvalError::NonFinite(format!("operand of '{op}'"))),
        other => Err(EvalError::type_mismatch(format!(
            "'{op}' expects numbers, got {}",
            other.type_name()
        ))),
    }
}

fn scalar_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let symbol = op.symbol();
    let a = finite_operand(symbol, left)?;
    let b = finite_operand(symbol, right)?;
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::Power => a.powf(b),
        other => {
            return Err(EvalError::Eval(format!(
                "'{}' is not an arithmetic operator",
                other.symbol()
            )))
        }
    };
    if !result.is_finite() {
        return Err(EvalError::NonFinite(format!("'{symbol}'")));
    }
    Ok(Value::Number(result))
}

/// `+ - * / **`.
pub(crate) fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    broadcast(left, right, &|a, b| scalar_arithmetic(op, a, b))
}

/// Unary `-` broadcasts over arrays; `!` is boolean-only.
pub(crate) fn unary(op: UnaryOp, value: &Value) -> EvalResult<Value> {
    match (op, value) {
        (UnaryOp::Negate, Value::Array(items)) => items
            .iter()
            .map(|item| unary(op, item))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        (UnaryOp::Negate, other) => finite_operand("-", other).map(|n| Value::Number(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Not, other) => Err(EvalError::type_mismatch(format!(
            "'!' expects a boolean, got {}",
            other.type_name()
        ))),
    }
}

fn concat_text(value: &Value) -> EvalResult<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Number(n) if n.is_finite() => Ok(format_number(*n)),
        Value::Number(_) => Err(EvalError::NonFinite("operand of '&'".to_string())),
        other => Err(EvalError::type_mismatch(format!(
            "'&' expects strings or numbers, got {}",
            other.type_name()
        ))),
    }
}

/// `&`.
pub(crate) fn concat(left: &Value, right: &Value) -> EvalResult<Value> {
    broadcast(left, right, &|a, b| {
        Ok(Value::Text(concat_text(a)? + &concat_text(b)?))
    })
}

/// `< <= > >=`. Scalars only: numbers, or dates/datetimes of the same kind.
pub(crate) fn compare(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<bool> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => {
            return Err(EvalError::type_mismatch(format!(
                "cannot compare {} with {} using '{}'",
                left.type_name(),
                right.type_name(),
                op.symbol()
            )))
        }
    };
    let ordering = ordering.ok_or_else(|| EvalError::NonFinite(format!("'{}'", op.symbol())))?;
    Ok(match op {
        BinaryOp::Less => ordering == Ordering::Less,
        BinaryOp::LessEquals => ordering != Ordering::Greater,
        BinaryOp::Greater => ordering == Ordering::Greater,
        BinaryOp::GreaterEquals => ordering != Ordering::Less,
        other => {
            return Err(EvalError::Eval(format!(
                "'{}' is not a comparison operator",
                other.symbol()
            )))
        }
    })
}

/// `==`. Scalars only. `null` equals only `null` and `undefined` equals only `undefined`;
/// either compared with anything else is simply unequal.
pub(crate) fn equals(left: &Value, right: &Value) -> EvalResult<bool> {
    match (left, right) {
        (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => Ok(true),
        (Value::Null | Value::Undefined, _) | (_, Value::Null | Value::Undefined) => Ok(false),
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::Text(a), Value::Text(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Date(a), Value::Date(b)) => Ok(a == b),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a == b),
        _ => Err(EvalError::type_mismatch(format!(
            "cannot compare {} with {} for equality",
            left.type_name(),
            right.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nums(values: &[f64]) -> Value {
        Value::Array(values.iter().copied().map(Value::Number).collect())
    }

    #[test]
    fn arithmetic_broadcasts_scalars_and_pairs_arrays() {
        assert_eq!(
            arithmetic(BinaryOp::Add, &nums(&[1.0, 2.0, 3.0]), &Value::Number(5.0)).unwrap(),
            nums(&[6.0, 7.0, 8.0])
        );
        assert_eq!(
            arithmetic(BinaryOp::Multiply, &nums(&[1.0, 2.0]), &nums(&[3.0, 4.0])).unwrap(),
            nums(&[3.0, 8.0])
        );
        assert_eq!(
            arithmetic(BinaryOp::Add, &nums(&[1.0, 2.0]), &nums(&[1.0, 2.0, 3.0])).unwrap_err(),
            EvalError::LengthMismatch { left: 2, right: 3 }
        );
    }

    #[test]
    fn division_and_overflow_are_rejected() {
        assert_eq!(
            arithmetic(BinaryOp::Divide, &Value::Number(1.0), &Value::Number(0.0)).unwrap_err(),
            EvalError::DivisionByZero
        );
        let err = arithmetic(BinaryOp::Power, &Value::Number(10.0), &Value::Number(400.0))
            .unwrap_err();
        assert!(matches!(err, EvalError::NonFinite(_)));
        let err = arithmetic(BinaryOp::Power, &Value::Number(-8.0), &Value::Number(0.5))
            .unwrap_err();
        assert!(matches!(err, EvalError::NonFinite(_)));
    }

    #[test]
    fn concat_formats_numbers() {
        assert_eq!(
            concat(&Value::from("a"), &Value::Number(1.0)).unwrap(),
            Value::from("a1")
        );
        assert!(concat(&Value::Bool(true), &Value::from("x")).is_err());
    }

    #[test]
    fn equality_handles_absent_values() {
        assert!(equals(&Value::Null, &Value::Null).unwrap());
        assert!(!equals(&Value::Null, &Value::Undefined).unwrap());
        assert!(!equals(&Value::Number(0.0), &Value::Null).unwrap());
        assert!(equals(&Value::Number(1.0), &Value::from("1")).is_err());
        assert!(equals(&nums(&[1.0]), &nums(&[1.0])).is_err());
    }

    #[test]
    fn comparison_is_never_vectorized() {
        assert!(compare(BinaryOp::Less, &Value::Number(1.0), &Value::Number(2.0)).unwrap());
        assert!(compare(BinaryOp::Less, &nums(&[1.0]), &Value::Number(2.0)).is_err());
    }
}
