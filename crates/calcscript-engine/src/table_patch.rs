//! Post-evaluation edits of single table cells.
//!
//! A patch evaluates a CalcScript expression with `row` bound to the selected row and every
//! computed node value in scope, then writes the result into the cell. Only inline tables are
//! patchable, and primary-key cells are never rewritten.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diagnostics::{codes, Message};
use crate::engine::EvalOptions;
use crate::eval::{Environment, Evaluator, Scope};
use crate::lexer::line_col;
use crate::parser::parse_expression;
use crate::scheduler::resolve_now;
use crate::stdlib::StdLibrary;
use crate::validate::{validate, ValidationContext};
use crate::value::{Table, Value};

/// How a patch picks its row.
#[derive(Clone, Debug, PartialEq)]
pub enum RowSelector {
    /// The row whose primary-key cell equals the value.
    Key(Value),
    /// 1-based row position. Deprecated: positions shift when rows are added or removed.
    Position(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TablePatch {
    pub table: String,
    pub selector: RowSelector,
    pub column: String,
    pub expression: String,
}

fn select_row(table: &Table, selector: &RowSelector) -> Option<usize> {
    match selector {
        RowSelector::Key(key) => table.find_row_by_key(key),
        RowSelector::Position(pos) => pos
            .checked_sub(1)
            .filter(|&idx| idx < table.rows.len()),
    }
}

/// Apply `patch` to the matching table in `tables`. Returns the messages produced; the table is
/// only modified when no error was reported.
pub fn apply_table_patch(
    tables: &mut [Table],
    values: &BTreeMap<String, Value>,
    patch: &TablePatch,
    std: &StdLibrary,
    options: &EvalOptions,
) -> Vec<Message> {
    let mut messages = Vec::new();

    let Some(target) = tables.iter().position(|t| t.name == patch.table) else {
        messages.push(Message::error(
            codes::PATCH_UNKNOWN_TABLE,
            format!("unknown table '{}'", patch.table),
        ));
        return messages;
    };
    let table = &tables[target];
    if !table.is_inline() {
        messages.push(Message::error(
            codes::PATCH_EXTERNAL_TABLE,
            format!("table '{}' is loaded from an external source and cannot be edited", table.name),
        ));
        return messages;
    }
    if table.primary_key.as_deref() == Some(patch.column.as_str()) {
        messages.push(Message::error(
            codes::PATCH_PRIMARY_KEY,
            format!("'{}' is the primary key of '{}' and cannot be edited", patch.column, table.name),
        ));
        return messages;
    }
    if !table.has_column(&patch.column) {
        messages.push(Message::error(
            codes::PATCH_UNKNOWN_COLUMN,
            format!("unknown column {}.{}", table.name, patch.column),
        ));
        return messages;
    }
    if let RowSelector::Position(pos) = patch.selector {
        log::warn!("positional row selector {pos} used for table '{}'", table.name);
        messages.push(Message::warning(
            codes::PATCH_POSITIONAL_SELECTOR,
            format!("selecting rows of '{}' by position is deprecated; select by primary key", table.name),
        ));
    }
    let Some(row_idx) = select_row(table, &patch.selector) else {
        let wanted = match &patch.selector {
            RowSelector::Key(key) => key.label(),
            RowSelector::Position(pos) => format!("#{pos}"),
        };
        messages.push(Message::error(
            codes::PATCH_ROW_NOT_FOUND,
            format!("no row {wanted} in table '{}'", table.name),
        ));
        return messages;
    };

    let expr = match parse_expression(&patch.expression) {
        Ok(expr) => expr,
        Err(err) => {
            let (line, column) = line_col(&patch.expression, err.offset);
            messages.push(Message::error(codes::PARSE_ERROR, err.message).at(line, column));
            return messages;
        }
    };
    let problems = validate(&expr, ValidationContext::default());
    if !problems.is_empty() {
        messages.extend(problems);
        return messages;
    }

    let (now, warning) = resolve_now(options.now.as_deref());
    messages.extend(warning);

    let mut env = Environment::new(std);
    for other in tables.iter().filter(|t| t.name != patch.table) {
        env.define_table(other.clone());
    }
    env.define_table(tables[target].clone());
    for (name, value) in values {
        env.commit(name, value.clone());
    }
    let mut scope = Scope::new(None);
    scope.define("row", Value::Record(tables[target].rows[row_idx].clone()));

    let result = Evaluator::new(&env, std)
        .with_now(now)
        .evaluate_in(&expr, Arc::new(scope));
    match result {
        Ok(value) => {
            log::debug!(
                "patched {}.{} in row {}",
                patch.table,
                patch.column,
                tables[target].row_label(row_idx)
            );
            tables[target].rows[row_idx].insert(patch.column.clone(), value);
        }
        Err(err) => messages.push(Message::error(err.code(), err.to_string())),
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prices() -> Table {
        let mut table = Table::new("prices", ["sku", "price"])
            .unwrap()
            .with_primary_key("sku")
            .unwrap();
        table.push_row(vec!["a".into(), 10.0.into()]).unwrap();
        table.push_row(vec!["b".into(), 20.0.into()]).unwrap();
        table
    }

    fn patch(selector: RowSelector, column: &str, expression: &str) -> TablePatch {
        TablePatch {
            table: "prices".into(),
            selector,
            column: column.into(),
            expression: expression.into(),
        }
    }

    fn run(tables: &mut [Table], patch: &TablePatch) -> Vec<String> {
        let values: BTreeMap<String, Value> = [("markup".to_string(), Value::from(1.5))].into();
        apply_table_patch(tables, &values, patch, StdLibrary::shared(), &EvalOptions::default())
            .into_iter()
            .map(|m| m.code)
            .collect()
    }

    #[test]
    fn patches_the_selected_cell_with_row_and_node_values_in_scope() {
        let mut tables = vec![prices()];
        let emitted = run(
            &mut tables,
            &patch(RowSelector::Key("b".into()), "price", "row.price * markup"),
        );
        assert!(emitted.is_empty());
        assert_eq!(tables[0].rows[1].get("price"), Some(&Value::Number(30.0)));
        assert_eq!(tables[0].rows[0].get("price"), Some(&Value::Number(10.0)));
    }

    #[test]
    fn positional_selectors_warn_but_apply() {
        let mut tables = vec![prices()];
        let emitted = run(&mut tables, &patch(RowSelector::Position(1), "price", "0"));
        assert_eq!(emitted, vec![codes::PATCH_POSITIONAL_SELECTOR]);
        assert_eq!(tables[0].rows[0].get("price"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn guards_reject_invalid_targets() {
        let mut tables = vec![prices(), prices().external()];
        tables[1].name = "feed".into();

        let mut unknown = patch(RowSelector::Key("a".into()), "price", "1");
        unknown.table = "nope".into();
        assert_eq!(run(&mut tables, &unknown), vec![codes::PATCH_UNKNOWN_TABLE]);

        let mut external = patch(RowSelector::Key("a".into()), "price", "1");
        external.table = "feed".into();
        assert_eq!(run(&mut tables, &external), vec![codes::PATCH_EXTERNAL_TABLE]);

        assert_eq!(
            run(&mut tables, &patch(RowSelector::Key("a".into()), "sku", "\"z\"")),
            vec![codes::PATCH_PRIMARY_KEY]
        );
        assert_eq!(
            run(&mut tables, &patch(RowSelector::Key("a".into()), "cost", "1")),
            vec![codes::PATCH_UNKNOWN_COLUMN]
        );
        assert_eq!(
            run(&mut tables, &patch(RowSelector::Key("zz".into()), "price", "1")),
            vec![codes::PATCH_ROW_NOT_FOUND]
        );
        assert_eq!(
            run(&mut tables, &patch(RowSelector::Position(3), "price", "1")),
            vec![codes::PATCH_POSITIONAL_SELECTOR, codes::PATCH_ROW_NOT_FOUND]
        );
        assert_eq!(tables[0], prices());
    }

    #[test]
    fn failing_expressions_leave_the_cell_untouched() {
        let mut tables = vec![prices()];
        assert_eq!(
            run(&mut tables, &patch(RowSelector::Key("a".into()), "price", "row.price / 0")),
            vec![codes::DIVISION_BY_ZERO]
        );
        assert_eq!(
            run(&mut tables, &patch(RowSelector::Key("a".into()), "price", "row.__proto__")),
            vec![codes::BANNED_IDENTIFIER]
        );
        assert_eq!(
            run(&mut tables, &patch(RowSelector::Key("a".into()), "price", "1 +")),
            vec![codes::PARSE_ERROR]
        );
        assert_eq!(tables[0], prices());
    }
}
