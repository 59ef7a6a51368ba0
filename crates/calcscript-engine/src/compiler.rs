//! Compile a calc block into dependency-graph nodes.

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::{Expr, STD_ROOT};
use crate::deps;
use crate::diagnostics::{codes, Message};
use crate::extract::{extract, Declaration};
use crate::lexer::line_col;
use crate::parser::parse_expression;
use crate::validate::{validate, ValidationContext};

/// One named declaration and its place in the dependency graph.
///
/// `parsed` is `None` when the expression failed to parse or validate; the node still exists so
/// references to it resolve (and fail as upstream errors) instead of looking unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct CalcNode {
    pub name: String,
    pub source_text: String,
    /// `None` when the expression failed to parse or failed validation; either way the node
    /// has no dependencies and evaluating it fails.
    pub parsed: Option<Arc<Expr>>,
    /// Sorted free identifiers of `parsed`. Empty when `parsed` is `None`.
    pub dependencies: Vec<String>,
    pub source_line: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Compilation {
    pub nodes: Vec<CalcNode>,
    pub messages: Vec<Message>,
}

impl Compilation {
    pub fn node(&self, name: &str) -> Option<&CalcNode> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

fn compile_declaration(source: &str, base_line: usize, decl: &Declaration) -> (CalcNode, Vec<Message>) {
    let mut node = CalcNode {
        name: decl.name.clone(),
        source_text: decl.expression.clone(),
        parsed: None,
        dependencies: Vec::new(),
        source_line: decl.line,
    };

    if decl.name == STD_ROOT {
        let message = Message::error(
            codes::RESERVED_IDENTIFIER,
            format!("'{STD_ROOT}' is reserved and cannot be declared"),
        )
        .at_line(decl.line)
        .for_node(&decl.name);
        return (node, vec![message]);
    }

    let expr = match parse_expression(&decl.expression) {
        Ok(expr) => expr,
        Err(err) => {
            // Map the in-expression offset back to an absolute source position so multi-line
            // expressions report the line the error is actually on.
            let (line, column) = line_col(source, decl.expression_offset + err.offset);
            let message = Message::error(codes::PARSE_ERROR, err.message)
                .at(line + base_line - 1, column)
                .for_node(&decl.name);
            return (node, vec![message]);
        }
    };

    let messages = validate(
        &expr,
        ValidationContext {
            node_name: Some(&decl.name),
            line: Some(decl.line),
        },
    );
    if messages.is_empty() {
        node.dependencies = deps::collect(&expr).into_iter().collect();
        node.parsed = Some(Arc::new(expr));
    }
    (node, messages)
}

/// Compile `source`. Lines are reported relative to `base_line` (the line of the source's
/// first character within its enclosing document).
pub fn compile(source: &str, base_line: usize) -> Compilation {
    let base_line = base_line.max(1);
    let extraction = extract(source, base_line);
    let mut out = Compilation {
        nodes: Vec::with_capacity(extraction.declarations.len()),
        messages: extraction.messages,
    };

    let mut seen = HashSet::new();
    for decl in &extraction.declarations {
        if !seen.insert(decl.name.as_str()) {
            out.messages.push(
                Message::error(
                    codes::DUPLICATE_NODE,
                    format!("'{}' is already declared", decl.name),
                )
                .at_line(decl.line)
                .for_node(&decl.name),
            );
            continue;
        }
        let (node, messages) = compile_declaration(source, base_line, decl);
        out.nodes.push(node);
        out.messages.extend(messages);
    }

    log::debug!(
        "compiled {} node(s) with {} message(s)",
        out.nodes.len(),
        out.messages.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nodes_carry_sorted_dependencies() {
        let out = compile("total = qty * price + fee;", 1);
        assert!(out.messages.is_empty());
        assert_eq!(out.nodes[0].dependencies, vec!["fee", "price", "qty"]);
    }

    #[test]
    fn parse_errors_map_to_absolute_line_and_column() {
        let src = "ok = 1;\nbad = 1 +\n  * 2;\n";
        let out = compile(src, 5);
        assert_eq!(out.nodes.len(), 2);
        let bad = out.node("bad").unwrap();
        assert!(bad.parsed.is_none());
        assert!(bad.dependencies.is_empty());
        let msg = &out.messages[0];
        assert_eq!(msg.code, codes::PARSE_ERROR);
        assert_eq!((msg.line, msg.column), (Some(7), Some(3)));
    }

    #[test]
    fn duplicate_names_keep_the_first_declaration() {
        let out = compile("a = 1;\na = 2;", 1);
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].source_text, "1");
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].code, codes::DUPLICATE_NODE);
        assert_eq!(out.messages[0].line, Some(2));
    }

    #[test]
    fn validation_failures_drop_the_parsed_expression() {
        let out = compile("a = x.__proto__;\nb = 1;", 1);
        assert!(out.node("a").unwrap().parsed.is_none());
        assert!(out.node("b").unwrap().parsed.is_some());
        assert_eq!(out.messages[0].code, codes::BANNED_IDENTIFIER);
    }

    #[test]
    fn std_cannot_be_declared() {
        let out = compile("std = 1;", 1);
        assert_eq!(out.messages[0].code, codes::RESERVED_IDENTIFIER);
    }
}
