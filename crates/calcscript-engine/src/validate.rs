//! Static safety checks over a parsed expression.
//!
//! The validator never fails fast: every violation in an expression is reported.

use std::collections::HashSet;

use crate::ast::{is_banned_name, ArrowParam, Expr, ObjectEntry, STD_ROOT};
use crate::diagnostics::{codes, Message};

/// Where the validated expression came from, used to locate messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidationContext<'a> {
    pub node_name: Option<&'a str>,
    pub line: Option<usize>,
}

struct Validator<'a> {
    ctx: ValidationContext<'a>,
    messages: Vec<Message>,
}

impl Validator<'_> {
    fn report(&mut self, code: &str, text: String) {
        let mut message = Message::error(code, text);
        if let Some(line) = self.ctx.line {
            message = message.at_line(line);
        }
        if let Some(name) = self.ctx.node_name {
            message = message.for_node(name);
        }
        self.messages.push(message);
    }

    fn check_banned(&mut self, name: &str, position: &str) {
        if is_banned_name(name) {
            self.report(
                codes::BANNED_IDENTIFIER,
                format!("'{name}' is not allowed as {position}"),
            );
        }
    }

    fn check_binding_name(&mut self, name: &str, position: &str) {
        self.check_banned(name, position);
        if name == STD_ROOT {
            self.report(
                codes::RESERVED_IDENTIFIER,
                format!("'{STD_ROOT}' is reserved and cannot be used as {position}"),
            );
        }
    }

    fn walk(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Identifier(name) => self.check_banned(name, "an identifier"),
            Expr::Array(items) => items.iter().for_each(|item| self.walk(item)),
            Expr::Unary { expr, .. } => self.walk(expr),
            Expr::Binary { left, right, .. } => {
                self.walk(left);
                self.walk(right);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.walk(test);
                self.walk(consequent);
                self.walk(alternate);
            }
            Expr::Let { bindings, body } => {
                let mut seen = HashSet::new();
                for (name, value) in bindings {
                    self.check_binding_name(name, "a let binding name");
                    if !seen.insert(name.as_str()) {
                        self.report(
                            codes::DUPLICATE_BINDING,
                            format!("duplicate let binding '{name}'"),
                        );
                    }
                    self.walk(value);
                }
                self.walk(body);
            }
            Expr::Member { object, property } => {
                self.check_banned(property, "a property name");
                self.walk(object);
            }
            Expr::Index { object, index } => {
                self.walk(object);
                self.walk(index);
            }
            Expr::Call { callee, args } => {
                self.walk(callee);
                args.iter().for_each(|arg| self.walk(arg));
            }
            Expr::Object(entries) => {
                for entry in entries {
                    match entry {
                        ObjectEntry::Property { key, value } => {
                            self.check_banned(key, "an object key");
                            self.walk(value);
                        }
                        ObjectEntry::Spread(source) => self.walk(source),
                    }
                }
            }
            Expr::Arrow { params, body } => {
                let mut seen = HashSet::new();
                for param in params {
                    if let ArrowParam::Destructure(fields) = param {
                        for field in fields.iter().filter(|f| f.source_key != f.bound_name) {
                            self.check_banned(&field.source_key, "a destructured key");
                        }
                    }
                    for name in param.bound_names() {
                        self.check_binding_name(name, "a parameter name");
                        if !seen.insert(name) {
                            self.report(
                                codes::DUPLICATE_PARAMETER,
                                format!("duplicate parameter '{name}'"),
                            );
                        }
                    }
                }
                self.walk(body);
            }
        }
    }
}

/// Validate `expr`, returning every violation found.
pub fn validate(expr: &Expr, ctx: ValidationContext<'_>) -> Vec<Message> {
    let mut validator = Validator {
        ctx,
        messages: Vec::new(),
    };
    validator.walk(expr);
    validator.messages
}
