use std::sync::Arc;

use crate::error::EvalResult;
use crate::eval::CallContext;
use crate::stdlib::array::predicate;
use crate::stdlib::{table_arg, text_arg, FunctionSpec};
use crate::value::{Table, Value};

inventory::submit! {
    FunctionSpec {
        path: "table.mapRows",
        min_args: 2,
        max_args: 2,
        implementation: map_rows_fn,
    }
}

/// `mapRows(table, (row, index) => { ... })`: a derived table. The source primary key carries
/// over when every output row still has that column.
fn map_rows_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let table = table_arg(ctx, args, 0)?;
    let mut rows = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let label = || table.row_label(idx);
        let mapped = ctx
            .call(&args[1], &[Value::Record(row.clone()), Value::Number(idx as f64)])
            .map_err(|err| err.in_row(label()))?;
        match mapped {
            Value::Record(record) => rows.push(record),
            other => {
                return Err(ctx
                    .fail(format!("row mapper must return a record, got {}", other.type_name()))
                    .in_row(label()))
            }
        }
    }
    let primary_key = table
        .primary_key
        .clone()
        .filter(|pk| rows.iter().all(|row| row.contains_key(pk)));
    Ok(Value::Table(Arc::new(Table::from_records(
        table.name.clone(),
        primary_key,
        rows,
    ))))
}

inventory::submit! {
    FunctionSpec {
        path: "table.filterRows",
        min_args: 2,
        max_args: 2,
        implementation: filter_rows_fn,
    }
}

fn filter_rows_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let table = table_arg(ctx, args, 0)?;
    let mut kept = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let keep = predicate(
            ctx,
            &args[1],
            &[Value::Record(row.clone()), Value::Number(idx as f64)],
        )
        .map_err(|err| err.in_row(table.row_label(idx)))?;
        if keep {
            kept.push(row.clone());
        }
    }
    let mut filtered = Table::clone(table);
    filtered.rows = kept;
    Ok(Value::Table(Arc::new(filtered)))
}

inventory::submit! {
    FunctionSpec {
        path: "table.column",
        min_args: 2,
        max_args: 2,
        implementation: column_fn,
    }
}

fn column_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let table = table_arg(ctx, args, 0)?;
    let name = text_arg(ctx, args, 1)?;
    table
        .column_values(name)
        .map(Value::Array)
        .ok_or_else(|| ctx.fail(format!("table {} has no column '{name}'", table.name)))
}

inventory::submit! {
    FunctionSpec {
        path: "table.rowCount",
        min_args: 1,
        max_args: 1,
        implementation: row_count_fn,
    }
}

fn row_count_fn(ctx: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(table_arg(ctx, args, 0)?.rows.len() as f64))
}
