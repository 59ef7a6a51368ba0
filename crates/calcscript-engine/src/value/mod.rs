//! The closed value domain CalcScript expressions evaluate to.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ast::{ArrowParam, Expr};
use crate::error::ModelError;
use crate::eval::Scope;
use crate::stdlib::FunctionSpec;

mod json;

#[derive(Clone)]
pub enum Value {
    Null,
    Undefined,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Array(Vec<Value>),
    Record(Record),
    Table(Arc<Table>),
    Function(&'static FunctionSpec),
    Closure(Arc<Closure>),
    NodeError(NodeErrorMarker),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Table(_) => "table",
            Value::Function(_) | Value::Closure(_) => "function",
            Value::NodeError(_) => "node error",
        }
    }

    /// `null` or `undefined`.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Text used to label a value in messages (row labels, assertion failures).
    pub fn label(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            other => serde_json::to_string(other).unwrap_or_else(|_| other.type_name().to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => std::ptr::eq(*a, *b),
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::NodeError(a), Value::NodeError(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Undefined => f.write_str("Undefined"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Date(d) => write!(f, "Date({d})"),
            Value::DateTime(dt) => write!(f, "DateTime({dt})"),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Value::Table(table) => f.debug_tuple("Table").field(table).finish(),
            Value::Function(spec) => write!(f, "Function({})", spec.path),
            Value::Closure(_) => f.write_str("Closure"),
            Value::NodeError(marker) => f.debug_tuple("NodeError").field(marker).finish(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Value::Table(Arc::new(value))
    }
}

/// Render a number the way `&` converts it to text: shortest round-trip decimal, integral values
/// without a fractional part.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Also normalizes negative zero.
        return "0".to_string();
    }
    format!("{n}")
}

/// An own-property map that keeps insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

/// Where a table's rows come from. Only inline tables may be patched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSource {
    #[default]
    Inline,
    External,
}

/// Rows bundled with their schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub name: String,
    pub primary_key: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub source: TableSource,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let mut out: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if out.contains(&column) {
                return Err(ModelError::DuplicateColumn {
                    table: name,
                    column,
                });
            }
            out.push(column);
        }
        Ok(Self {
            name,
            primary_key: None,
            columns: out,
            rows: Vec::new(),
            source: TableSource::Inline,
        })
    }

    /// Build a table from already-shaped rows. Columns are the row keys in first-seen order.
    pub fn from_records(
        name: impl Into<String>,
        primary_key: Option<String>,
        rows: Vec<Record>,
    ) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }
        Self {
            name: name.into(),
            primary_key,
            columns,
            rows,
            source: TableSource::Inline,
        }
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Result<Self, ModelError> {
        let column = column.into();
        if !self.columns.contains(&column) {
            return Err(ModelError::UnknownColumn {
                table: self.name,
                column,
            });
        }
        self.primary_key = Some(column);
        Ok(self)
    }

    #[must_use]
    pub fn external(mut self) -> Self {
        self.source = TableSource::External;
        self
    }

    pub fn is_inline(&self) -> bool {
        self.source == TableSource::Inline
    }

    /// Append a row given one value per column, in column order.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), ModelError> {
        if values.len() != self.columns.len() {
            return Err(ModelError::SchemaMismatch {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        let row = self.columns.iter().cloned().zip(values).collect();
        self.rows.push(row);
        Ok(())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn column_values(&self, column: &str) -> Option<Vec<Value>> {
        if !self.has_column(column) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.get(column).cloned().unwrap_or(Value::Undefined))
                .collect(),
        )
    }

    /// Label for row `idx` in messages: its primary-key value when the table has one, otherwise
    /// the 1-based position.
    pub fn row_label(&self, idx: usize) -> String {
        self.primary_key
            .as_deref()
            .and_then(|pk| self.rows.get(idx)?.get(pk))
            .map_or_else(|| format!("#{}", idx + 1), Value::label)
    }

    pub fn find_row_by_key(&self, key: &Value) -> Option<usize> {
        let pk = self.primary_key.as_deref()?;
        self.rows.iter().position(|row| row.get(pk) == Some(key))
    }
}

/// A user arrow function together with the local scope it was defined in.
///
/// Globals (nodes, inputs, tables, `std`) are not captured; they resolve when the closure runs.
#[derive(Debug)]
pub struct Closure {
    pub(crate) params: Vec<ArrowParam>,
    pub(crate) body: Arc<Expr>,
    pub(crate) scope: Option<Arc<Scope>>,
}

impl Closure {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Stand-in for a node whose evaluation failed. Reading it fails with an upstream error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeErrorMarker {
    node: String,
    message: String,
}

impl NodeErrorMarker {
    pub(crate) fn new(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbers_format_without_trailing_fraction() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1.5e-7), "0.00000015");
    }

    #[test]
    fn record_insert_replaces_in_place() {
        let mut record: Record = [("a", Value::from(1.0)), ("b", Value::from(2.0))]
            .into_iter()
            .collect();
        record.insert("a", Value::from("x"));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Value::from("x")));
    }

    #[test]
    fn table_rows_are_labeled_by_primary_key() {
        let mut table = Table::new("orders", ["sku", "qty"])
            .unwrap()
            .with_primary_key("sku")
            .unwrap();
        table.push_row(vec!["A-1".into(), 2.0.into()]).unwrap();
        assert_eq!(table.row_label(0), "A-1");
        assert_eq!(table.find_row_by_key(&"A-1".into()), Some(0));

        let plain = Table::from_records("t", None, table.rows.clone());
        assert_eq!(plain.row_label(0), "#1");
    }

    #[test]
    fn push_row_checks_the_schema() {
        let mut table = Table::new("t", ["a", "b"]).unwrap();
        let err = table.push_row(vec![1.0.into()]).unwrap_err();
        assert_eq!(
            err,
            ModelError::SchemaMismatch {
                table: "t".into(),
                expected: 2,
                actual: 1
            }
        );
        assert!(Table::new("t", ["a", "a"]).is_err());
    }
}
