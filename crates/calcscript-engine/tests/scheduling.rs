use calcscript_engine::{codes, Engine, EvalOptions, ModelInputs, Value};
use pretty_assertions::assert_eq;

fn run(source: &str) -> calcscript_engine::RunReport {
    Engine::new().run(source, &ModelInputs::default(), &EvalOptions::default())
}

#[test]
fn nodes_may_reference_later_declarations() {
    let report = run("total = subtotal + tax;\ntax = subtotal * 0.1;\nsubtotal = 100;");
    assert!(report.messages.is_empty());
    assert_eq!(report.values["total"], Value::Number(110.0));
}

#[test]
fn cycles_produce_one_diagnostic_and_no_values() {
    let report = run("a = b + 1;\nb = a + 1;\nc = 5;");
    let cycles: Vec<_> = report
        .messages
        .iter()
        .filter(|m| m.code == codes::CYCLE)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].text, "dependency cycle among: a, b");
    assert_eq!(report.messages.len(), 1);
    assert!(!report.values.contains_key("a"));
    assert!(!report.values.contains_key("b"));
    assert_eq!(report.values["c"], Value::Number(5.0));
}

#[test]
fn nodes_downstream_of_a_cycle_are_named_and_skipped() {
    let report = run("a = b;\nb = a;\nc = a * 2;");
    assert_eq!(report.messages[0].text, "dependency cycle among: a, b, c");
    assert!(report.values.is_empty());
}

#[test]
fn failures_propagate_as_upstream_errors() {
    let report = run("x = 1 / 0;\ny = x + 1;\nz = y * 2;\nok = 3;");
    let summary: Vec<(Option<&str>, &str)> = report
        .messages
        .iter()
        .map(|m| (m.node_name.as_deref(), m.code.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some("x"), codes::DIVISION_BY_ZERO),
            (Some("y"), codes::UPSTREAM_ERROR),
            (Some("z"), codes::UPSTREAM_ERROR),
        ]
    );
    assert_eq!(report.messages[1].text, "upstream error in x");
    assert_eq!(report.messages[2].text, "upstream error in y");
    assert_eq!(report.values.keys().collect::<Vec<_>>(), vec!["ok"]);
}

#[test]
fn messages_carry_the_node_source_line() {
    let options = EvalOptions {
        base_line: 10,
        ..EvalOptions::default()
    };
    let report = Engine::new().run("a = 1;\n\nb = missing;", &ModelInputs::default(), &options);
    assert_eq!(report.messages[0].code, codes::UNKNOWN_IDENTIFIER);
    assert_eq!(report.messages[0].line, Some(12));
}

#[test]
fn runs_are_byte_identical() {
    let source = "rows = std.array.range(0, 5);\nsq = rows * rows;\nbad = sq / 0;\nlabel = \"n=\" & std.stats.sum(sq);\nnow = std.date.today();";
    let options = EvalOptions {
        now: Some("2024-06-30T08:00:00Z".into()),
        ..EvalOptions::default()
    };
    let first = Engine::new().run(source, &ModelInputs::default(), &options);
    let second = Engine::new().run(source, &ModelInputs::default(), &options);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&first.values).unwrap(),
        serde_json::json!({
            "label": "n=30",
            "now": "2024-06-30",
            "rows": [0, 1, 2, 3, 4],
            "sq": [0, 1, 4, 9, 16],
        })
    );
}

#[test]
fn invalid_timestamp_override_warns_and_is_ignored() {
    let options = EvalOptions {
        now: Some("not a date".into()),
        ..EvalOptions::default()
    };
    let report = Engine::new().run(
        "a = 1;\nt = std.date.now();",
        &ModelInputs::default(),
        &options,
    );
    assert_eq!(report.messages[0].code, codes::INVALID_NOW);
    assert!(!report.messages[0].is_error());
    assert_eq!(report.messages[1].code, codes::FUNCTION_ERROR);
    assert_eq!(report.values["a"], Value::Number(1.0));
}
