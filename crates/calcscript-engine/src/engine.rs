use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compiler::{compile, Compilation};
use crate::diagnostics::{tag_block_lang, Message};
use crate::eval::Environment;
use crate::infer::{infer, ComputedTableSchema, Inference, InferredType};
use crate::metadata::{InputDef, TableSchema};
use crate::scheduler::{evaluate_all, Evaluation};
use crate::stdlib::StdLibrary;
use crate::table_patch::{apply_table_patch, TablePatch};
use crate::value::{Table, Value};

/// Per-run settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvalOptions {
    /// Timestamp override read by `std.date.now`/`std.date.today`. There is no ambient clock.
    pub now: Option<String>,
    /// Line of the block's first character within the enclosing document.
    pub base_line: usize,
    /// Language tag of the fenced block, stamped onto every message.
    pub block_lang: Option<String>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            now: None,
            base_line: 1,
            block_lang: None,
        }
    }
}

/// Host-supplied data visible to a block.
#[derive(Clone, Debug, Default)]
pub struct ModelInputs {
    pub inputs: BTreeMap<String, Value>,
    pub tables: Vec<Table>,
    pub input_types: Vec<InputDef>,
    pub table_schemas: Vec<TableSchema>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub values: BTreeMap<String, Value>,
    pub messages: Vec<Message>,
    pub value_types: BTreeMap<String, InferredType>,
    pub computed_table_schemas: BTreeMap<String, ComputedTableSchema>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Message::is_error)
    }
}

/// Entry point tying the compiler, scheduler and inferencer to one standard library.
#[derive(Clone, Copy, Debug)]
pub struct Engine<'a> {
    std: &'a StdLibrary,
}

impl Engine<'static> {
    pub fn new() -> Self {
        Self {
            std: StdLibrary::shared(),
        }
    }
}

impl Default for Engine<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Engine<'a> {
    pub fn with_std(std: &'a StdLibrary) -> Self {
        Self { std }
    }

    pub fn std(&self) -> &'a StdLibrary {
        self.std
    }

    pub fn compile(&self, source: &str, base_line: usize) -> Compilation {
        compile(source, base_line)
    }

    pub fn evaluate(
        &self,
        compilation: &Compilation,
        inputs: &ModelInputs,
        options: &EvalOptions,
    ) -> Evaluation {
        let mut out = self.evaluate_untagged(compilation, inputs, options);
        tag_block_lang(&mut out.messages, options.block_lang.as_deref());
        out
    }

    fn evaluate_untagged(
        &self,
        compilation: &Compilation,
        inputs: &ModelInputs,
        options: &EvalOptions,
    ) -> Evaluation {
        let mut env = Environment::new(self.std);
        for (name, value) in &inputs.inputs {
            env.define_input(name.clone(), value.clone());
        }
        for table in &inputs.tables {
            env.define_table(table.clone());
        }
        evaluate_all(&compilation.nodes, env, self.std, options)
    }

    pub fn infer(&self, compilation: &Compilation, inputs: &ModelInputs) -> Inference {
        infer(
            &compilation.nodes,
            &inputs.input_types,
            &inputs.table_schemas,
        )
    }

    /// Compile, evaluate and infer `source` in one go.
    pub fn run(&self, source: &str, inputs: &ModelInputs, options: &EvalOptions) -> RunReport {
        let compilation = self.compile(source, options.base_line);
        let evaluation = self.evaluate_untagged(&compilation, inputs, options);
        let inference = self.infer(&compilation, inputs);

        let mut messages = compilation.messages;
        messages.extend(evaluation.messages);
        tag_block_lang(&mut messages, options.block_lang.as_deref());
        log::debug!(
            "run produced {} value(s) and {} message(s)",
            evaluation.values.len(),
            messages.len()
        );
        RunReport {
            values: evaluation.values,
            messages,
            value_types: inference.value_types,
            computed_table_schemas: inference.computed_table_schemas,
        }
    }

    /// Rewrite one cell of an inline table; see [`apply_table_patch`].
    pub fn apply_patch(
        &self,
        tables: &mut [Table],
        values: &BTreeMap<String, Value>,
        patch: &TablePatch,
        options: &EvalOptions,
    ) -> Vec<Message> {
        let mut messages = apply_table_patch(tables, values, patch, self.std, options);
        tag_block_lang(&mut messages, options.block_lang.as_deref());
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::codes;
    use pretty_assertions::assert_eq;

    #[test]
    fn options_deserialize_with_defaults() {
        let options: EvalOptions = serde_json::from_str(r#"{"now":"2024-01-31"}"#).unwrap();
        assert_eq!(options.base_line, 1);
        assert_eq!(options.now.as_deref(), Some("2024-01-31"));
    }

    #[test]
    fn run_concatenates_compile_then_evaluate_messages() {
        let options = EvalOptions {
            block_lang: Some("calc".into()),
            ..EvalOptions::default()
        };
        let report = Engine::new().run("a = 1 +;\nb = a * 2;\nc = 3;", &ModelInputs::default(), &options);
        let emitted: Vec<&str> = report.messages.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(emitted, vec![codes::PARSE_ERROR, codes::UPSTREAM_ERROR]);
        assert!(report
            .messages
            .iter()
            .all(|m| m.block_lang.as_deref() == Some("calc")));
        assert_eq!(report.values.get("c"), Some(&Value::Number(3.0)));
        assert!(report.has_errors());
    }

    #[test]
    fn inputs_and_tables_are_visible() {
        let mut table = Table::new("items", ["qty"]).unwrap();
        table.push_row(vec![2.0.into()]).unwrap();
        table.push_row(vec![5.0.into()]).unwrap();
        let inputs = ModelInputs {
            inputs: [("rate".to_string(), Value::from(0.5))].into(),
            tables: vec![table],
            ..ModelInputs::default()
        };
        let report = Engine::new().run(
            "total = std.stats.sum(items.qty) * rate;",
            &inputs,
            &EvalOptions::default(),
        );
        assert!(report.messages.is_empty());
        assert_eq!(report.values.get("total"), Some(&Value::Number(3.5)));
    }

    #[test]
    fn evaluate_alone_tags_its_messages() {
        let engine = Engine::new();
        let options = EvalOptions {
            block_lang: Some("calc".into()),
            ..EvalOptions::default()
        };
        let compilation = engine.compile("x = 1 / 0;", 1);
        let evaluation = engine.evaluate(&compilation, &ModelInputs::default(), &options);
        assert_eq!(evaluation.messages.len(), 1);
        assert_eq!(evaluation.messages[0].block_lang.as_deref(), Some("calc"));
    }
}
