#![no_main]

use libfuzzer_sys::fuzz_target;

use calcscript_engine::{Engine, EvalOptions, ModelInputs, Table, Value};

const MAX_FUZZ_BLOCK_CHARS: usize = 2_048;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_BLOCK_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn fixture() -> ModelInputs {
    let mut table = Table::new("items", ["sku", "qty", "price"])
        .and_then(|t| t.with_primary_key("sku"))
        .expect("fixture table");
    for (sku, qty, price) in [("a", 1.0, 9.5), ("b", 4.0, 2.25), ("c", 0.0, 100.0)] {
        table
            .push_row(vec![sku.into(), qty.into(), price.into()])
            .expect("fixture row");
    }
    ModelInputs {
        inputs: [
            ("rate".to_string(), Value::from(0.07)),
            ("label".to_string(), Value::from("fuzz")),
        ]
        .into(),
        tables: vec![table],
        ..ModelInputs::default()
    }
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let input = String::from_utf8_lossy(&data[1..]);
    let source = truncate_to_chars(&input, MAX_FUZZ_BLOCK_CHARS);

    // Deterministic clock so date functions are reachable.
    let options = EvalOptions {
        now: (data[0] & 1 == 1).then(|| "2024-02-29T12:00:00Z".to_string()),
        ..EvalOptions::default()
    };

    let inputs = fixture();
    let first = Engine::new().run(source, &inputs, &options);
    let second = Engine::new().run(source, &inputs, &options);
    assert_eq!(first, second, "evaluation must be deterministic");

    // Every committed value must serialize.
    std::hint::black_box(serde_json::to_string(&first.values).ok());
});
