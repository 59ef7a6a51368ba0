//! Free-identifier collection: the edges of the node dependency graph.

use std::collections::BTreeSet;

use crate::ast::{Expr, ObjectEntry, STD_ROOT};

fn collect_into(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Identifier(name) => {
            out.insert(name.clone());
        }
        Expr::Array(items) => items.iter().for_each(|item| collect_into(item, out)),
        Expr::Unary { expr, .. } => collect_into(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_into(left, out);
            collect_into(right, out);
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            collect_into(test, out);
            collect_into(consequent, out);
            collect_into(alternate, out);
        }
        Expr::Let { bindings, body } => {
            // Walk right to left: each binding only sees the ones declared before it, so a
            // name is free in binding `i` unless an earlier binding introduced it.
            let mut inner = BTreeSet::new();
            collect_into(body, &mut inner);
            for (name, value) in bindings.iter().rev() {
                inner.remove(name);
                collect_into(value, &mut inner);
            }
            out.extend(inner);
        }
        Expr::Member { object, .. } => collect_into(object, out),
        Expr::Index { object, index } => {
            collect_into(object, out);
            collect_into(index, out);
        }
        Expr::Call { callee, args } => {
            collect_into(callee, out);
            args.iter().for_each(|arg| collect_into(arg, out));
        }
        Expr::Object(entries) => {
            for entry in entries {
                match entry {
                    ObjectEntry::Property { value, .. } => collect_into(value, out),
                    ObjectEntry::Spread(source) => collect_into(source, out),
                }
            }
        }
        Expr::Arrow { params, body } => {
            let mut inner = BTreeSet::new();
            collect_into(body, &mut inner);
            for param in params {
                for name in param.bound_names() {
                    inner.remove(name);
                }
            }
            out.extend(inner);
        }
    }
}

/// Every free identifier of `expr`, excluding the reserved std root.
pub fn collect(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_into(expr, &mut out);
    out.remove(STD_ROOT);
    out
}
