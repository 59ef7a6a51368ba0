//! Recursive-descent parser with precedence climbing for binary operators.
//!
//! Precedence, lowest to highest:
//!
//! | level | forms |
//! |---|---|
//! | arrow | `x => e`, `(a, {b}) => e` |
//! | conditional | `t ? a : b` (right-associative) |
//! | 1 | `??` |
//! | 2 | `\|\|` |
//! | 3 | `&&` |
//! | 4 | `==` `!=` (`===` `!==`) |
//! | 5 | `<` `<=` `>` `>=` |
//! | 6 | `&` |
//! | 7 | `+` `-` |
//! | 8 | `*` `/` |
//! | unary | `-e` `!e` |
//! | exponent | `a ** b` (right-associative) |
//! | postfix | `.name` `[i]` `(args)` |
//! | primary | literals, identifiers, `(e)`, `[..]`, `{..}`, `let {..} in e` |

use std::sync::Arc;

use crate::ast::{ArrowParam, BinaryOp, DestructureField, Expr, Literal, ObjectEntry, UnaryOp};
use crate::error::{ParseResult, SyntaxError};
use crate::lexer::{tokenize, Token, TokenKind, TokenStream};

/// Deepest nesting the parser accepts. Operator chains count one level per operator, so this
/// also bounds the height of the resulting tree for every later recursive walk.
pub const MAX_NESTING_DEPTH: usize = 128;

struct Parser {
    tokens: TokenStream,
    depth: usize,
}

impl Parser {
    fn new(source: &str) -> ParseResult<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            depth: 0,
        })
    }

    fn peek(&self) -> &TokenKind {
        self.tokens.peek_kind()
    }

    fn bump(&mut self) -> Token {
        self.tokens.next_token()
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.tokens.peek().offset)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(name)
            }
            other => Err(self.error_here(format!("expected {what}, found {}", describe(&other)))),
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.descend()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_here(format!(
                "expression nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression()?;
        if !self.tokens.is_at_end() {
            return Err(self.error_here(format!("unexpected {}", describe(self.peek()))));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.nested(|p| {
            if let Some(arrow) = p.try_parse_arrow()? {
                return Ok(arrow);
            }
            p.parse_conditional()
        })
    }

    /// Speculatively parse an arrow function. Rewinds and returns `None` unless a parameter
    /// list followed by `=>` is found.
    fn try_parse_arrow(&mut self) -> ParseResult<Option<Expr>> {
        if !matches!(self.peek(), TokenKind::Identifier(_) | TokenKind::LParen) {
            return Ok(None);
        }
        let mark = self.tokens.mark();
        match self.arrow_params() {
            Some(params) if self.peek() == &TokenKind::Arrow => {
                self.bump();
                let body = self.parse_expression()?;
                Ok(Some(Expr::Arrow {
                    params,
                    body: Arc::new(body),
                }))
            }
            _ => {
                self.tokens.reset(mark);
                Ok(None)
            }
        }
    }

    fn arrow_params(&mut self) -> Option<Vec<ArrowParam>> {
        if let TokenKind::Identifier(name) = self.peek().clone() {
            self.bump();
            return Some(vec![ArrowParam::Name(name)]);
        }
        if !self.eat(&TokenKind::LParen) {
            return None;
        }
        let mut params = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Some(params);
        }
        loop {
            match self.peek().clone() {
                TokenKind::Identifier(name) => {
                    self.bump();
                    params.push(ArrowParam::Name(name));
                }
                TokenKind::LBrace => params.push(ArrowParam::Destructure(self.destructure()?)),
                _ => return None,
            }
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            return self.eat(&TokenKind::RParen).then_some(params);
        }
    }

    fn destructure(&mut self) -> Option<Vec<DestructureField>> {
        self.bump(); // '{'
        let mut fields = Vec::new();
        loop {
            if self.eat(&TokenKind::RBrace) {
                return Some(fields);
            }
            let source_key = match self.bump().kind {
                TokenKind::Identifier(name) | TokenKind::String(name) => name,
                _ => return None,
            };
            let bound_name = if self.eat(&TokenKind::Colon) {
                match self.bump().kind {
                    TokenKind::Identifier(name) => name,
                    _ => return None,
                }
            } else {
                source_key.clone()
            };
            fields.push(DestructureField {
                source_key,
                bound_name,
            });
            if !self.eat(&TokenKind::Comma) {
                return self.eat(&TokenKind::RBrace).then_some(fields);
            }
        }
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_expression()?;
        self.expect(TokenKind::Colon, "':' in conditional expression")?;
        let alternate = self.parse_expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let entry_depth = self.depth;
        let result = self.binary_chain(min_prec);
        self.depth = entry_depth;
        result
    }

    fn binary_chain(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((op, prec)) = self.infix_binding_power() {
            if prec < min_prec {
                break;
            }
            self.descend()?;
            self.bump();
            let right = self.parse_binary(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn infix_binding_power(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.peek() {
            TokenKind::Nullish => (BinaryOp::Nullish, 1),
            TokenKind::OrOr => (BinaryOp::Or, 2),
            TokenKind::AndAnd => (BinaryOp::And, 3),
            TokenKind::EqEq => (BinaryOp::Equals, 4),
            TokenKind::NotEq => (BinaryOp::NotEquals, 4),
            TokenKind::Less => (BinaryOp::Less, 5),
            TokenKind::LessEq => (BinaryOp::LessEquals, 5),
            TokenKind::Greater => (BinaryOp::Greater, 5),
            TokenKind::GreaterEq => (BinaryOp::GreaterEquals, 5),
            TokenKind::Ampersand => (BinaryOp::Concat, 6),
            TokenKind::Plus => (BinaryOp::Add, 7),
            TokenKind::Minus => (BinaryOp::Subtract, 7),
            TokenKind::Star => (BinaryOp::Multiply, 8),
            TokenKind::Slash => (BinaryOp::Divide, 8),
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_exponent(),
        };
        self.bump();
        let expr = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_exponent(&mut self) -> ParseResult<Expr> {
        let base = self.parse_postfix()?;
        if !self.eat(&TokenKind::StarStar) {
            return Ok(base);
        }
        // Right-associative: `2 ** 3 ** 2` is `2 ** (3 ** 2)`.
        let exponent = self.nested(Self::parse_unary)?;
        Ok(Expr::Binary {
            op: BinaryOp::Power,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let entry_depth = self.depth;
        let result = self.postfix_chain();
        self.depth = entry_depth;
        result
    }

    fn postfix_chain(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.peek(), TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen) {
                self.descend()?;
            }
            match self.peek() {
                TokenKind::Dot => {
                    self.bump();
                    let property = self.property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::LParen => {
                    self.bump();
                    let args = self.comma_list(TokenKind::RParen, "')'")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Property names after `.` may also be keywords (`row.in`, `flags.true`).
    fn property_name(&mut self) -> ParseResult<String> {
        let name = match self.peek() {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Let => "let".to_string(),
            TokenKind::In => "in".to_string(),
            TokenKind::Boolean(b) => b.to_string(),
            other => {
                return Err(self.error_here(format!(
                    "expected property name, found {}",
                    describe(other)
                )))
            }
        };
        self.bump();
        Ok(name)
    }

    fn comma_list(&mut self, close: TokenKind, what: &str) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close, what)?;
                return Ok(items);
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.bump();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            TokenKind::String(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::Boolean(b) => Ok(Expr::Literal(Literal::Boolean(b))),
            TokenKind::Identifier(name) => Ok(Expr::Identifier(name)),
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => Ok(Expr::Array(self.comma_list(TokenKind::RBracket, "']'")?)),
            TokenKind::LBrace => self.parse_object(),
            TokenKind::Let => self.parse_let(),
            other => Err(SyntaxError::new(
                format!("unexpected {}", describe(&other)),
                token.offset,
            )),
        }
    }

    fn parse_object(&mut self) -> ParseResult<Expr> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&TokenKind::RBrace) {
                return Ok(Expr::Object(entries));
            }
            if self.eat(&TokenKind::Ellipsis) {
                entries.push(ObjectEntry::Spread(self.parse_expression()?));
            } else {
                let key_token = self.bump();
                let (key, shorthand_ok) = match key_token.kind {
                    TokenKind::Identifier(name) => (name, true),
                    TokenKind::String(s) => (s, false),
                    TokenKind::Number(n) => (crate::value::format_number(n), false),
                    TokenKind::Let => ("let".to_string(), false),
                    TokenKind::In => ("in".to_string(), false),
                    TokenKind::Boolean(b) => (b.to_string(), false),
                    other => {
                        return Err(SyntaxError::new(
                            format!("expected object key, found {}", describe(&other)),
                            key_token.offset,
                        ))
                    }
                };
                let value = if self.eat(&TokenKind::Colon) {
                    self.parse_expression()?
                } else if shorthand_ok {
                    Expr::Identifier(key.clone())
                } else {
                    return Err(self.error_here(format!("expected ':' after object key {key:?}")));
                };
                entries.push(ObjectEntry::Property { key, value });
            }
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RBrace, "',' or '}' in object literal")?;
                return Ok(Expr::Object(entries));
            }
        }
    }

    fn parse_let(&mut self) -> ParseResult<Expr> {
        self.expect(TokenKind::LBrace, "'{' after let")?;
        let mut bindings = Vec::new();
        loop {
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            let name = self.expect_identifier("binding name")?;
            self.expect(TokenKind::Assign, "'=' after binding name")?;
            let value = self.parse_expression()?;
            bindings.push((name, value));
            if !(self.eat(&TokenKind::Comma) || self.eat(&TokenKind::Semicolon)) {
                self.expect(TokenKind::RBrace, "',', ';' or '}' in let bindings")?;
                break;
            }
        }
        if bindings.is_empty() {
            return Err(self.error_here("let requires at least one binding"));
        }
        self.expect(TokenKind::In, "'in' after let bindings")?;
        let body = self.parse_expression()?;
        Ok(Expr::Let {
            bindings,
            body: Box::new(body),
        })
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Identifier(name) => format!("identifier '{name}'"),
        TokenKind::Number(n) => format!("number {n}"),
        TokenKind::String(s) => format!("string {s:?}"),
        TokenKind::Boolean(b) => format!("'{b}'"),
        TokenKind::Eof => "end of input".to_string(),
        other => format!("{other:?}"),
    }
}

/// Parse a complete CalcScript expression. Trailing tokens are a syntax error.
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    Parser::new(source)?.parse()
}
