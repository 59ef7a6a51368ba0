//! Display-type inference.
//!
//! A second walk over the compiled nodes that computes a display [`Dimension`] per node (and
//! per column of tables derived with `std.table.mapRows`) instead of a value. Inference is
//! best-effort: anything ambiguous or unrecognized is left out of the result, never reported.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ast::{ArrowParam, BinaryOp, Expr, Literal, ObjectEntry, UnaryOp, STD_ROOT};
use crate::compiler::CalcNode;
use crate::metadata::{InputDef, TableSchema};
use crate::scheduler::schedule;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Currency,
    Percent,
    Number,
    String,
    Boolean,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredType {
    pub dimension: Dimension,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
}

impl InferredType {
    pub fn of(dimension: Dimension) -> Self {
        Self {
            dimension,
            currency_code: None,
        }
    }

    pub fn currency(code: Option<String>) -> Self {
        Self {
            dimension: Dimension::Currency,
            currency_code: code,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self.dimension,
            Dimension::Currency | Dimension::Percent | Dimension::Number
        )
    }
}

/// Column types of a table produced by an expression.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedTableSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    pub columns: BTreeMap<String, InferredType>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inference {
    pub value_types: BTreeMap<String, InferredType>,
    pub computed_table_schemas: BTreeMap<String, ComputedTableSchema>,
}

/// Shape of an inferred expression. Arrays are represented by their element type.
#[derive(Clone, Debug, PartialEq)]
enum Ty {
    Scalar(InferredType),
    Record(BTreeMap<String, InferredType>),
    Table(ComputedTableSchema),
}

fn scalar(dimension: Dimension) -> Option<Ty> {
    Some(Ty::Scalar(InferredType::of(dimension)))
}

fn additive(a: &InferredType, b: &InferredType) -> Option<InferredType> {
    use Dimension::*;
    match (a.dimension, b.dimension) {
        (Currency, Currency) => Some(InferredType::currency(
            (a.currency_code == b.currency_code)
                .then(|| a.currency_code.clone())
                .flatten(),
        )),
        (Currency, Number) => Some(a.clone()),
        (Number, Currency) => Some(b.clone()),
        (Percent, Percent) => Some(InferredType::of(Percent)),
        (Number | Percent, Number | Percent) => Some(InferredType::of(Number)),
        _ => None,
    }
}

fn multiplicative(a: &InferredType, b: &InferredType) -> Option<InferredType> {
    use Dimension::*;
    match (a.dimension, b.dimension) {
        (Currency, Number | Percent) => Some(a.clone()),
        (Number | Percent, Currency) => Some(b.clone()),
        (Number | Percent, Number | Percent) => Some(InferredType::of(Number)),
        _ => None,
    }
}

fn divide(a: &InferredType, b: &InferredType) -> Option<InferredType> {
    use Dimension::*;
    match (a.dimension, b.dimension) {
        (Currency, Number | Percent) => Some(a.clone()),
        (Currency, Currency) => Some(InferredType::of(Number)),
        (Number | Percent, Number | Percent) => Some(InferredType::of(Number)),
        _ => None,
    }
}

/// The shared type of two branches, or nothing if they differ.
fn common(a: Option<Ty>, b: Option<Ty>) -> Option<Ty> {
    match (a, b) {
        (Some(a), Some(b)) if a == b => Some(a),
        _ => None,
    }
}

fn numeric_passthrough(ty: Option<Ty>) -> Option<Ty> {
    match ty {
        Some(Ty::Scalar(t)) if t.is_numeric() => Some(Ty::Scalar(t)),
        _ => None,
    }
}

struct Inferencer {
    /// Inputs, declared tables and already-inferred nodes. `None` records a name whose type is
    /// unknown so it still shadows an input of the same name.
    known: HashMap<String, Option<Ty>>,
    scopes: Vec<HashMap<String, Option<Ty>>>,
}

impl Inferencer {
    fn new(input_types: &[InputDef], table_schemas: &[TableSchema]) -> Self {
        let mut known = HashMap::new();
        for input in input_types {
            known.insert(input.name.clone(), input.ty.inferred().map(Ty::Scalar));
        }
        for schema in table_schemas {
            let columns = schema
                .columns
                .iter()
                .filter_map(|(name, ty)| Some((name.clone(), ty.inferred()?)))
                .collect();
            known.insert(
                schema.name.clone(),
                Some(Ty::Table(ComputedTableSchema {
                    primary_key: schema.primary_key.clone(),
                    columns,
                })),
            );
        }
        Self {
            known,
            scopes: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Ty> {
        if let Some(ty) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) {
            return ty.clone();
        }
        self.known.get(name).cloned().flatten()
    }

    fn with_scope<T>(
        &mut self,
        scope: HashMap<String, Option<Ty>>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.scopes.push(scope);
        let out = f(self);
        self.scopes.pop();
        out
    }

    fn infer(&mut self, expr: &Expr) -> Option<Ty> {
        match expr {
            Expr::Literal(Literal::Number(_)) => scalar(Dimension::Number),
            Expr::Literal(Literal::String(_)) => scalar(Dimension::String),
            Expr::Literal(Literal::Boolean(_)) => scalar(Dimension::Boolean),
            Expr::Identifier(name) => self.lookup(name),
            Expr::Array(items) => {
                let mut types = items.iter().map(|item| self.infer(item));
                let first = types.next()??;
                match first {
                    Ty::Scalar(_) => types.try_fold(first, |acc, ty| common(Some(acc), ty)),
                    _ => None,
                }
            }
            Expr::Unary {
                op: UnaryOp::Negate,
                expr,
            } => numeric_passthrough(self.infer(expr)),
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => scalar(Dimension::Boolean),
            Expr::Binary { op, left, right } => self.infer_binary(*op, left, right),
            Expr::Conditional {
                consequent,
                alternate,
                ..
            } => {
                let a = self.infer(consequent);
                let b = self.infer(alternate);
                common(a, b)
            }
            Expr::Let { bindings, body } => {
                self.scopes.push(HashMap::new());
                for (name, value) in bindings {
                    let ty = self.infer(value);
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(name.clone(), ty);
                    }
                }
                let out = self.infer(body);
                self.scopes.pop();
                out
            }
            Expr::Member { object, property } => match self.infer(object)? {
                Ty::Record(fields) => fields.get(property).cloned().map(Ty::Scalar),
                Ty::Table(schema) => schema.columns.get(property).cloned().map(Ty::Scalar),
                Ty::Scalar(_) => None,
            },
            Expr::Index { object, .. } => match self.infer(object)? {
                Ty::Table(schema) => Some(Ty::Record(schema.columns)),
                Ty::Scalar(t) => Some(Ty::Scalar(t)),
                Ty::Record(_) => None,
            },
            Expr::Call { callee, args } => self.infer_call(callee, args),
            Expr::Object(entries) => {
                let mut fields = BTreeMap::new();
                for entry in entries {
                    match entry {
                        ObjectEntry::Property { key, value } => match self.infer(value) {
                            Some(Ty::Scalar(t)) => {
                                fields.insert(key.clone(), t);
                            }
                            _ => {
                                fields.remove(key);
                            }
                        },
                        ObjectEntry::Spread(source) => {
                            if let Some(Ty::Record(spread)) = self.infer(source) {
                                fields.extend(spread);
                            }
                        }
                    }
                }
                Some(Ty::Record(fields))
            }
            Expr::Arrow { .. } => None,
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Option<Ty> {
        match op {
            BinaryOp::Concat => return scalar(Dimension::String),
            BinaryOp::Equals
            | BinaryOp::NotEquals
            | BinaryOp::Less
            | BinaryOp::LessEquals
            | BinaryOp::Greater
            | BinaryOp::GreaterEquals
            | BinaryOp::And
            | BinaryOp::Or => return scalar(Dimension::Boolean),
            BinaryOp::Nullish => {
                let a = self.infer(left);
                let b = self.infer(right);
                return common(a, b);
            }
            _ => {}
        }
        let (Some(Ty::Scalar(a)), Some(Ty::Scalar(b))) = (self.infer(left), self.infer(right))
        else {
            return None;
        };
        let out = match op {
            BinaryOp::Add | BinaryOp::Subtract => additive(&a, &b),
            BinaryOp::Multiply => multiplicative(&a, &b),
            BinaryOp::Divide => divide(&a, &b),
            BinaryOp::Power if a.is_numeric() && b.is_numeric() => {
                Some(InferredType::of(Dimension::Number))
            }
            _ => None,
        };
        out.map(Ty::Scalar)
    }

    fn infer_call(&mut self, callee: &Expr, args: &[Expr]) -> Option<Ty> {
        let path = callee.member_path()?;
        if path.first() != Some(&STD_ROOT) {
            return None;
        }
        match path[1..].join(".").as_str() {
            "table.mapRows" => self.infer_map_rows(args),
            "table.filterRows" => match self.infer(args.first()?)? {
                Ty::Table(schema) => Some(Ty::Table(schema)),
                _ => None,
            },
            "lookup.byKey" => match self.infer(args.first()?)? {
                Ty::Table(schema) => Some(Ty::Record(schema.columns)),
                _ => None,
            },
            "math.round" | "math.abs" | "math.floor" | "math.ceil" | "stats.sum"
            | "stats.min" | "stats.max" | "stats.mean" | "stats.median" => {
                let arg = args.first()?;
                numeric_passthrough(self.infer(arg))
            }
            _ => None,
        }
    }

    /// `std.table.mapRows(table, (row, index) => { ... })` derives a table whose columns are
    /// typed from the mapper's object literal.
    fn infer_map_rows(&mut self, args: &[Expr]) -> Option<Ty> {
        let Some(Ty::Table(source)) = self.infer(args.first()?) else {
            return None;
        };
        let Expr::Arrow { params, body } = args.get(1)? else {
            return None;
        };

        let mut scope = HashMap::new();
        for (idx, param) in params.iter().enumerate() {
            match (idx, param) {
                (0, ArrowParam::Name(name)) => {
                    scope.insert(name.clone(), Some(Ty::Record(source.columns.clone())));
                }
                (0, ArrowParam::Destructure(fields)) => {
                    for field in fields {
                        let ty = source.columns.get(&field.source_key).cloned().map(Ty::Scalar);
                        scope.insert(field.bound_name.clone(), ty);
                    }
                }
                (1, ArrowParam::Name(name)) => {
                    scope.insert(name.clone(), scalar(Dimension::Number));
                }
                (_, param) => {
                    for name in param.bound_names() {
                        scope.insert(name.to_string(), None);
                    }
                }
            }
        }

        let Some(Ty::Record(columns)) = self.with_scope(scope, |this| this.infer(body)) else {
            return None;
        };
        let primary_key = source
            .primary_key
            .filter(|pk| columns.contains_key(pk));
        Some(Ty::Table(ComputedTableSchema {
            primary_key,
            columns,
        }))
    }
}

/// Infer display types for `nodes`, in the same topological order the scheduler uses (or
/// declaration order when the graph has a cycle).
pub fn infer(nodes: &[CalcNode], input_types: &[InputDef], table_schemas: &[TableSchema]) -> Inference {
    let mut inferencer = Inferencer::new(input_types, table_schemas);
    let schedule = schedule(nodes);
    let order: Vec<usize> = if schedule.is_complete() {
        schedule.order
    } else {
        (0..nodes.len()).collect()
    };

    let mut out = Inference::default();
    for idx in order {
        let node = &nodes[idx];
        let ty = node
            .parsed
            .as_deref()
            .and_then(|expr| inferencer.infer(expr));
        match &ty {
            Some(Ty::Scalar(t)) => {
                out.value_types.insert(node.name.clone(), t.clone());
            }
            Some(Ty::Table(schema)) => {
                out.computed_table_schemas
                    .insert(node.name.clone(), schema.clone());
            }
            Some(Ty::Record(_)) | None => {}
        }
        inferencer.known.insert(node.name.clone(), ty);
    }
    log::debug!(
        "inferred {} value type(s) and {} table schema(s)",
        out.value_types.len(),
        out.computed_table_schemas.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::metadata::DeclaredType;
    use pretty_assertions::assert_eq;

    fn input(name: &str, ty: &str) -> InputDef {
        InputDef {
            name: name.to_string(),
            ty: ty.parse().unwrap(),
        }
    }

    fn types(src: &str, inputs: &[InputDef]) -> BTreeMap<String, InferredType> {
        infer(&compile(src, 1).nodes, inputs, &[]).value_types
    }

    #[test]
    fn currencies_propagate_through_arithmetic() {
        let inputs = [
            input("usd", "currency(USD)"),
            input("eur", "currency(EUR)"),
            input("rate", "percent"),
        ];
        let out = types(
            "a = usd + 1;\nb = usd + eur;\nc = usd * rate;\nd = usd / usd;\ne = rate + rate;\nf = -usd;",
            &inputs,
        );
        let usd = InferredType::currency(Some("USD".into()));
        assert_eq!(out.get("a"), Some(&usd));
        assert_eq!(out.get("b"), Some(&InferredType::currency(None)));
        assert_eq!(out.get("c"), Some(&usd));
        assert_eq!(out.get("d"), Some(&InferredType::of(Dimension::Number)));
        assert_eq!(out.get("e"), Some(&InferredType::of(Dimension::Percent)));
        assert_eq!(out.get("f"), Some(&usd));
    }

    #[test]
    fn differing_branches_are_omitted() {
        let inputs = [input("usd", "currency(USD)"), input("eur", "currency(EUR)")];
        let out = types("flag = true;\nx = flag ? usd : eur;\ny = flag ? usd : usd;", &inputs);
        assert_eq!(out.get("x"), None);
        assert_eq!(out.get("y"), Some(&InferredType::currency(Some("USD".into()))));
        assert_eq!(out.get("flag"), Some(&InferredType::of(Dimension::Boolean)));
    }

    #[test]
    fn node_types_feed_later_nodes_regardless_of_declaration_order() {
        let inputs = [input("price", "currency(GBP)")];
        let out = types("total = subtotal * 2;\nsubtotal = price + 1;", &inputs);
        assert_eq!(out.get("total"), Some(&InferredType::currency(Some("GBP".into()))));
    }

    #[test]
    fn map_rows_synthesizes_a_table_schema() {
        let schema = TableSchema {
            name: "orders".into(),
            primary_key: Some("sku".into()),
            columns: [
                ("sku".to_string(), DeclaredType::new("string")),
                ("qty".to_string(), DeclaredType::new("integer")),
                ("price".to_string(), DeclaredType::new("currency").with_arg("USD")),
            ]
            .into_iter()
            .collect(),
        };
        let src = "lines = std.table.mapRows(orders, row => { sku: row.sku, total: row.qty * row.price, note: std.text.upper(row.sku) });\nrevenue = std.stats.sum(lines.total);";
        let out = infer(&compile(src, 1).nodes, &[], &[schema]);

        let lines = &out.computed_table_schemas["lines"];
        assert_eq!(lines.primary_key.as_deref(), Some("sku"));
        assert_eq!(
            lines.columns.keys().collect::<Vec<_>>(),
            vec!["sku", "total"]
        );
        assert_eq!(
            out.value_types.get("revenue"),
            Some(&InferredType::currency(Some("USD".into())))
        );
    }

    #[test]
    fn unknown_calls_and_identifiers_are_omitted() {
        let out = types("a = std.text.len(\"x\");\nb = missing + 1;\nc = a;", &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn cycles_fall_back_to_declaration_order() {
        let out = types("a = b + 1;\nb = a + 1;\nc = 1;", &[]);
        assert_eq!(out.get("c"), Some(&InferredType::of(Dimension::Number)));
        assert_eq!(out.get("a"), None);
        assert_eq!(out.get("b"), None);
    }
}
