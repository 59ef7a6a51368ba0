use calcscript_engine::compiler::compile;
use calcscript_engine::extract::extract;
use calcscript_engine::{codes, Engine, EvalOptions, ModelInputs, Value};
use pretty_assertions::assert_eq;

#[test]
fn extractor_respects_strings_comments_and_nesting() {
    let source = r#"// leading comment; not a declaration
const greeting = "a; b" & '; c';
/* block; comment */
f = std.array.map([1, 2], (x) => let {
  y = x + 1;
} in y);
total = 1 + // trailing; comment
  2;
"#;
    let extraction = extract(source, 1);
    assert!(extraction.messages.is_empty(), "{:?}", extraction.messages);
    let names: Vec<&str> = extraction
        .declarations
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(names, vec!["greeting", "f", "total"]);
    assert_eq!(extraction.declarations[1].line, 4);
    assert_eq!(extraction.declarations[2].line, 7);

    let report = Engine::new().run(source, &ModelInputs::default(), &EvalOptions::default());
    assert!(report.messages.is_empty(), "{:?}", report.messages);
    assert_eq!(report.values["greeting"], Value::from("a; b; c"));
    assert_eq!(report.values["total"], Value::Number(3.0));
}

#[test]
fn malformed_lines_are_reported_and_scanning_continues() {
    let extraction = extract("1x = 2;\nb 3;\nc = 4;", 1);
    let found: Vec<&str> = extraction.messages.iter().map(|m| m.code.as_str()).collect();
    assert_eq!(found, vec![codes::EXPECT_IDENTIFIER, codes::EXPECT_EQUALS]);
    assert_eq!(extraction.declarations.len(), 1);
    assert_eq!(extraction.declarations[0].name, "c");
}

#[test]
fn missing_semicolon_drops_the_declaration() {
    let out = compile("a = 1\nb = 2;", 1);
    assert_eq!(out.messages[0].code, codes::MISSING_SEMICOLON);
    assert_eq!(
        out.nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
        vec!["b"]
    );
}

#[test]
fn dependencies_exclude_locals_and_std() {
    let out = compile(
        "x = let { k = rate } in std.array.map(items, (item) => item * k + offset);",
        1,
    );
    assert_eq!(out.nodes[0].dependencies, vec!["items", "offset", "rate"]);
}

#[test]
fn parse_errors_keep_the_node_and_report_its_position() {
    let out = compile("a = 1;\nb = (1 +\n  );\nc = b;", 3);
    let b = out.node("b").unwrap();
    assert!(b.parsed.is_none());
    assert_eq!(b.source_line, 4);
    assert_eq!(out.messages.len(), 1);
    assert_eq!(out.messages[0].code, codes::PARSE_ERROR);
    assert_eq!(out.messages[0].line, Some(5));
    assert_eq!(out.node("c").unwrap().dependencies, vec!["b"]);
}

#[test]
fn duplicate_bindings_and_parameters_are_reported_together() {
    let out = compile(
        "x = let { a = 1, a = 2 } in std.array.map([1], (p, p) => p);",
        1,
    );
    let found: Vec<&str> = out.messages.iter().map(|m| m.code.as_str()).collect();
    assert_eq!(
        found,
        vec![codes::DUPLICATE_BINDING, codes::DUPLICATE_PARAMETER]
    );
    assert!(out.nodes[0].parsed.is_none());
}

#[test]
fn deeply_nested_declarations_fail_alone() {
    let source = format!(
        "a = 1;\nb = {}1{};\nc = a + 1;",
        "(".repeat(5_000),
        ")".repeat(5_000)
    );
    let out = compile(&source, 1);
    assert_eq!(out.nodes.len(), 3);
    assert!(out.node("b").unwrap().parsed.is_none());
    assert!(out.node("c").unwrap().parsed.is_some());
    assert_eq!(out.messages.len(), 1);
    assert_eq!(out.messages[0].code, codes::PARSE_ERROR);
    assert!(out.messages[0].text.contains("nesting exceeds"), "{}", out.messages[0].text);
    assert_eq!(out.messages[0].line, Some(2));

    let report = Engine::new().run(&source, &ModelInputs::default(), &EvalOptions::default());
    assert_eq!(report.values.get("c"), Some(&Value::Number(2.0)));
}
