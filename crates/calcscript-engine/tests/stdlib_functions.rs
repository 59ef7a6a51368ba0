use calcscript_engine::{codes, Engine, EvalOptions, ModelInputs, StdLibrary, Value};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;

fn eval_at(expr: &str, now: Option<&str>) -> Result<Value, (String, String)> {
    let options = EvalOptions {
        now: now.map(str::to_string),
        ..EvalOptions::default()
    };
    let report = Engine::new().run(&format!("x = {expr};"), &ModelInputs::default(), &options);
    match report.values.get("x") {
        Some(value) => Ok(value.clone()),
        None => {
            let message = report.messages.last().cloned().unwrap_or_else(|| {
                panic!("{expr} produced neither a value nor a message")
            });
            Err((message.code, message.text))
        }
    }
}

fn eval(expr: &str) -> Result<Value, (String, String)> {
    eval_at(expr, None)
}

fn code(expr: &str) -> String {
    eval(expr).unwrap_err().0
}

fn nums(values: &[f64]) -> Value {
    Value::Array(values.iter().copied().map(Value::Number).collect())
}

#[test]
fn math_functions_broadcast_over_arrays() {
    assert_eq!(eval("std.math.round(2.346, 2)"), Ok(Value::Number(2.35)));
    assert_eq!(eval("std.math.round([1.4, 1.6])"), Ok(nums(&[1.0, 2.0])));
    assert_eq!(eval("std.math.abs(-3)"), Ok(Value::Number(3.0)));
    assert_eq!(eval("std.math.max(1, [5, 2], 3)"), Ok(Value::Number(5.0)));
    assert_eq!(eval("std.math.clamp(12, 0, 10)"), Ok(Value::Number(10.0)));
    assert_eq!(code("std.math.sqrt(-1)"), codes::NON_FINITE);
}

#[test]
fn text_and_logic_functions() {
    assert_eq!(eval("std.text.upper(\"abc\")"), Ok(Value::from("ABC")));
    assert_eq!(eval("std.text.len(\"héllo\")"), Ok(Value::Number(5.0)));
    assert_eq!(eval("std.text.join([\"a\", 1, \"b\"], \"-\")"), Ok(Value::from("a-1-b")));
    assert_eq!(eval("std.logic.all([true, false])"), Ok(Value::Bool(false)));
    assert_eq!(eval("std.logic.coalesce(std.data.get({}, \"k\"), 4)"), Ok(Value::Number(4.0)));
    assert_eq!(code("std.text.upper(1)"), codes::FUNCTION_ERROR);
}

#[test]
fn higher_order_array_functions_call_arrows() {
    assert_eq!(
        eval("std.array.filter(std.array.range(0, 10), (n) => n > 6)"),
        Ok(nums(&[7.0, 8.0, 9.0]))
    );
    assert_eq!(
        eval("std.array.reduce([1, 2, 3], (acc, n) => acc + n, 10)"),
        Ok(Value::Number(16.0))
    );
    assert_eq!(eval("std.array.sort([3, 1, 2])"), Ok(nums(&[1.0, 2.0, 3.0])));
    assert_eq!(eval("std.array.first([])"), Ok(Value::Null));
    assert_eq!(code("std.array.sort([1, \"a\"])"), codes::FUNCTION_ERROR);
    assert_eq!(code("std.array.filter([1], (n) => n)"), codes::FUNCTION_ERROR);
    assert_eq!(code("std.array.map([1], 5)"), codes::FUNCTION_ERROR);
}

#[test]
fn stats_functions() {
    assert_eq!(eval("std.stats.sum([])"), Ok(Value::Number(0.0)));
    assert_eq!(eval("std.stats.mean([1, 2, 3, 4])"), Ok(Value::Number(2.5)));
    assert_eq!(eval("std.stats.median([5, 1, 3])"), Ok(Value::Number(3.0)));
    assert_eq!(code("std.stats.max([])"), codes::FUNCTION_ERROR);
}

#[test]
fn date_functions_read_only_the_override() {
    let now = Some("2024-02-28T23:30:00Z");
    assert_eq!(
        eval_at("std.date.addDays(std.date.today(), 2)", now),
        Ok(Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
    );
    assert_eq!(
        eval_at("std.date.diffDays(std.date.date(2024, 1, 1), std.date.today())", now),
        Ok(Value::Number(58.0))
    );
    assert_eq!(eval_at("std.date.year(std.date.now())", now), Ok(Value::Number(2024.0)));
    let (code, text) = eval("std.date.today()").unwrap_err();
    assert_eq!(code, codes::FUNCTION_ERROR);
    assert_eq!(text, "std.date.today: no timestamp override was supplied for this run");
    assert_eq!(
        eval("std.date.date(2023, 2, 29)").unwrap_err().0,
        codes::FUNCTION_ERROR
    );
}

#[test]
fn finance_functions() {
    let Ok(Value::Number(payment)) = eval("std.finance.pmt(0.05 / 12, 12, 12500)") else {
        panic!("pmt did not produce a number");
    };
    assert!((payment + 1070.09).abs() < 0.01, "{payment}");
    assert_eq!(code("std.finance.irr([100, 200])"), codes::FUNCTION_ERROR);
}

#[test]
fn assertions_fail_with_their_message() {
    assert_eq!(eval("std.assert.that(1 < 2)"), Ok(Value::Bool(true)));
    assert_eq!(
        eval("std.assert.that(1 > 2, \"one is not greater\")"),
        Err((
            codes::FUNCTION_ERROR.to_string(),
            "std.assert.that: one is not greater".to_string()
        ))
    );
    assert_eq!(
        eval("std.assert.equal(1, 2)").unwrap_err().1,
        "std.assert.equal: expected 1 to equal 2"
    );
}

#[test]
fn the_shared_library_resolves_every_namespace() {
    let std = StdLibrary::shared();
    for namespace in [
        "math", "text", "logic", "array", "stats", "data", "date", "finance", "table", "lookup",
        "assert",
    ] {
        assert!(std.root().contains_key(namespace), "{namespace}");
    }
    let spec = std.lookup("finance.irr").unwrap();
    assert_eq!((spec.min_args, spec.max_args), (1, 2));
    assert!(std.is_registered(spec));
    assert!(std.lookup("finance").is_none());
}
