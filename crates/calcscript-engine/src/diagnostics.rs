//! Diagnostics surfaced to hosts.
//!
//! Every failure the extractor, compiler, scheduler or evaluator can produce is reported as a
//! [`Message`] carrying one of the stable [`codes`]. Downstream tooling compares these in
//! golden files, so codes must never be renamed.

use serde::{Deserialize, Serialize};

/// Stable message codes.
pub mod codes {
    // Declaration extraction.
    pub const EXPECT_IDENTIFIER: &str = "EXPECT_IDENTIFIER";
    pub const EXPECT_EQUALS: &str = "EXPECT_EQUALS";
    pub const MISSING_SEMICOLON: &str = "MISSING_SEMICOLON";

    // Compilation.
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const DUPLICATE_NODE: &str = "DUPLICATE_NODE";
    pub const BANNED_IDENTIFIER: &str = "BANNED_IDENTIFIER";
    pub const RESERVED_IDENTIFIER: &str = "RESERVED_IDENTIFIER";
    pub const DUPLICATE_BINDING: &str = "DUPLICATE_BINDING";
    pub const DUPLICATE_PARAMETER: &str = "DUPLICATE_PARAMETER";

    // Run-scoped.
    pub const CYCLE: &str = "CYCLE";
    pub const INVALID_NOW: &str = "INVALID_NOW";

    // Evaluation.
    pub const DIVISION_BY_ZERO: &str = "DIVISION_BY_ZERO";
    pub const NON_FINITE: &str = "NON_FINITE";
    pub const LENGTH_MISMATCH: &str = "LENGTH_MISMATCH";
    pub const UNKNOWN_IDENTIFIER: &str = "UNKNOWN_IDENTIFIER";
    pub const UNKNOWN_PROPERTY: &str = "UNKNOWN_PROPERTY";
    pub const INDEX_OUT_OF_RANGE: &str = "INDEX_OUT_OF_RANGE";
    pub const TYPE_MISMATCH: &str = "TYPE_MISMATCH";
    pub const DISALLOWED_CALL: &str = "DISALLOWED_CALL";
    pub const ARITY: &str = "ARITY";
    pub const FUNCTION_ERROR: &str = "FUNCTION_ERROR";
    pub const NESTING_LIMIT: &str = "NESTING_LIMIT";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const EVAL_ERROR: &str = "EVAL_ERROR";

    // Table patches.
    pub const PATCH_UNKNOWN_TABLE: &str = "PATCH_UNKNOWN_TABLE";
    pub const PATCH_EXTERNAL_TABLE: &str = "PATCH_EXTERNAL_TABLE";
    pub const PATCH_PRIMARY_KEY: &str = "PATCH_PRIMARY_KEY";
    pub const PATCH_UNKNOWN_COLUMN: &str = "PATCH_UNKNOWN_COLUMN";
    pub const PATCH_ROW_NOT_FOUND: &str = "PATCH_ROW_NOT_FOUND";
    pub const PATCH_POSITIONAL_SELECTOR: &str = "PATCH_POSITIONAL_SELECTOR";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic. `line`/`column` are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub severity: Severity,
    pub code: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

impl Message {
    pub fn error(code: &str, text: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, text)
    }

    pub fn warning(code: &str, text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, text)
    }

    fn new(severity: Severity, code: &str, text: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            text: text.into(),
            line: None,
            column: None,
            block_lang: None,
            node_name: None,
        }
    }

    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    #[must_use]
    pub fn for_node(mut self, name: impl Into<String>) -> Self {
        self.node_name = Some(name.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Stamp a block language onto messages that don't carry one yet.
pub(crate) fn tag_block_lang(messages: &mut [Message], block_lang: Option<&str>) {
    let Some(lang) = block_lang else {
        return;
    };
    for message in messages.iter_mut().filter(|m| m.block_lang.is_none()) {
        message.block_lang = Some(lang.to_string());
    }
}
