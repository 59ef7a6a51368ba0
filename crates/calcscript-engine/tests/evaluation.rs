use calcscript_engine::{codes, Engine, EvalOptions, ModelInputs, Value};
use pretty_assertions::assert_eq;

fn eval(expr: &str) -> Result<Value, String> {
    let report = Engine::new().run(
        &format!("x = {expr};"),
        &ModelInputs::default(),
        &EvalOptions::default(),
    );
    match report.values.get("x") {
        Some(value) => Ok(value.clone()),
        None => Err(report
            .messages
            .first()
            .map(|m| m.code.clone())
            .unwrap_or_default()),
    }
}

fn nums(values: &[f64]) -> Value {
    Value::Array(values.iter().copied().map(Value::Number).collect())
}

#[test]
fn operator_precedence_and_associativity() {
    assert_eq!(eval("2 + 3 * 4"), Ok(Value::Number(14.0)));
    assert_eq!(eval("2 ** 3 ** 2"), Ok(Value::Number(512.0)));
    assert_eq!(eval("-2 ** 2"), Ok(Value::Number(-4.0)));
    assert_eq!(eval("10 - 4 - 3"), Ok(Value::Number(3.0)));
    assert_eq!(eval("(2 + 3) * 4"), Ok(Value::Number(20.0)));
    assert_eq!(eval("\"a\" & 1 & \"b\" & 2"), Ok(Value::from("a1b2")));
    assert_eq!(eval("1 + 2 & 3"), Ok(Value::from("33")));
    assert_eq!(eval("1 < 2 == true"), Ok(Value::Bool(true)));
}

#[test]
fn strict_equality_spellings_are_synonyms() {
    assert_eq!(eval("1 === 1"), Ok(Value::Bool(true)));
    assert_eq!(eval("\"a\" !== \"b\""), Ok(Value::Bool(true)));
}

#[test]
fn division_by_zero_and_non_finite_results_fail() {
    assert_eq!(eval("1 / 0"), Err(codes::DIVISION_BY_ZERO.to_string()));
    assert_eq!(eval("10 ** 400"), Err(codes::NON_FINITE.to_string()));
    assert_eq!(eval("[1, 2] / [1, 0]"), Err(codes::DIVISION_BY_ZERO.to_string()));
}

#[test]
fn arithmetic_broadcasts_over_arrays() {
    assert_eq!(eval("[1, 2, 3] + 5"), Ok(nums(&[6.0, 7.0, 8.0])));
    assert_eq!(eval("10 - [1, 2]"), Ok(nums(&[9.0, 8.0])));
    assert_eq!(eval("[1, 2] * [3, 4]"), Ok(nums(&[3.0, 8.0])));
    assert_eq!(eval("-[1, 2]"), Ok(nums(&[-1.0, -2.0])));
    assert_eq!(
        eval("\"#\" & [1, 2]"),
        Ok(Value::Array(vec!["#1".into(), "#2".into()]))
    );
    assert_eq!(eval("[1, 2] + [1, 2, 3]"), Err(codes::LENGTH_MISMATCH.to_string()));
}

#[test]
fn comparisons_are_scalar_only() {
    assert_eq!(eval("[1] < 2"), Err(codes::TYPE_MISMATCH.to_string()));
    assert_eq!(eval("1 == \"1\""), Err(codes::TYPE_MISMATCH.to_string()));
    assert_eq!(eval("\"a\" < \"b\""), Err(codes::TYPE_MISMATCH.to_string()));
}

#[test]
fn logical_operators_short_circuit() {
    // The right-hand sides would fail if evaluated.
    assert_eq!(eval("false && missing"), Ok(Value::Bool(false)));
    assert_eq!(eval("true || 1 / 0 == 1"), Ok(Value::Bool(true)));
    assert_eq!(eval("true && 1"), Err(codes::TYPE_MISMATCH.to_string()));
    assert_eq!(eval("1 || true"), Err(codes::TYPE_MISMATCH.to_string()));
}

#[test]
fn nullish_and_conditional_are_lazy() {
    assert_eq!(eval("{ a: 1 }.a ?? missing"), Ok(Value::Number(1.0)));
    assert_eq!(eval("std.data.get({}, \"a\") ?? 7"), Ok(Value::Number(7.0)));
    assert_eq!(eval("true ? 1 : 1 / 0"), Ok(Value::Number(1.0)));
    assert_eq!(eval("1 ? 2 : 3"), Err(codes::TYPE_MISMATCH.to_string()));
}

#[test]
fn let_bindings_are_sequential() {
    assert_eq!(eval("let { a = 2, b = a * 3 } in a + b"), Ok(Value::Number(8.0)));
    assert_eq!(eval("let { a = 1; } in let { a = a + 1 } in a"), Ok(Value::Number(2.0)));
    assert_eq!(
        eval("let { a = a } in a"),
        Err(codes::UNKNOWN_IDENTIFIER.to_string())
    );
}

#[test]
fn records_support_shorthand_spread_and_own_property_lookup() {
    assert_eq!(
        eval("let { n = 1 } in { ...{ a: 1, b: 2 }, b: 3, n }"),
        Ok(Value::Record(
            [("a", Value::Number(1.0)), ("b", Value::Number(3.0)), ("n", Value::Number(1.0))]
                .into_iter()
                .collect()
        ))
    );
    assert_eq!(eval("{ a: 1 }.b"), Err(codes::UNKNOWN_PROPERTY.to_string()));
    assert_eq!(eval("{ \"a b\": 1 }[\"a b\"]"), Ok(Value::Number(1.0)));
}

#[test]
fn indexing_requires_in_range_integers() {
    assert_eq!(eval("[10, 20, 30][1]"), Ok(Value::Number(20.0)));
    assert_eq!(eval("[10][1]"), Err(codes::INDEX_OUT_OF_RANGE.to_string()));
    assert_eq!(eval("[10][-1]"), Err(codes::INDEX_OUT_OF_RANGE.to_string()));
    assert_eq!(eval("[10][0.5]"), Err(codes::INDEX_OUT_OF_RANGE.to_string()));
    assert_eq!(eval("[10][\"0\"]"), Err(codes::TYPE_MISMATCH.to_string()));
}

#[test]
fn member_access_projects_across_arrays_of_records() {
    assert_eq!(
        eval("[{ a: 1 }, { a: 2 }].a"),
        Ok(nums(&[1.0, 2.0]))
    );
    assert_eq!(
        eval("[{ a: 1 }, { b: 2 }].a"),
        Err(codes::UNKNOWN_PROPERTY.to_string())
    );
}

#[test]
fn arrows_capture_their_scope_and_bind_missing_arguments_as_undefined() {
    assert_eq!(
        eval("let { k = 10 } in std.array.map([1, 2], (x) => x * k)"),
        Ok(nums(&[10.0, 20.0]))
    );
    assert_eq!(
        eval("std.array.map([1, 2], (x, i, extra) => extra ?? i)"),
        Ok(nums(&[0.0, 1.0]))
    );
    assert_eq!(
        eval("std.array.map([{ a: 1, b: 2 }], ({ a, b: bee }) => a + bee)"),
        Ok(nums(&[3.0]))
    );
}
