#![no_main]

use libfuzzer_sys::fuzz_target;

use calcscript_engine::validate::{validate, ValidationContext};

/// Keep the harness itself bounded; deeply nested inputs are the interesting ones, not long ones.
const MAX_FUZZ_EXPRESSION_CHARS: usize = 4_096;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_EXPRESSION_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let input = String::from_utf8_lossy(data);
    let expression = truncate_to_chars(&input, MAX_FUZZ_EXPRESSION_CHARS);

    // Tokenizing and parsing must fail with a syntax error, never panic.
    let _ = calcscript_engine::lexer::tokenize(expression);
    if let Ok(expr) = calcscript_engine::parse_expression(expression) {
        let _ = validate(&expr, ValidationContext::default());
        let _ = calcscript_engine::deps::collect(&expr);
    }

    // The same bytes as a whole block exercise the declaration extractor.
    let _ = calcscript_engine::compile(expression, 1);
});
