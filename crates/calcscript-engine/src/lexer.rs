//! CalcScript tokenizer.
//!
//! [`tokenize`] turns expression text into a [`TokenStream`]: a flat token vector plus a cursor
//! with [`TokenStream::mark`] / [`TokenStream::reset`] so the parser can backtrack when a
//! speculative arrow-parameter list turns out to be a parenthesized expression.
//!
//! Whitespace and comments (`// ...`, `/* ... */`) are skipped and never produce tokens.

use crate::error::{ParseResult, SyntaxError};

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    String(String),
    Boolean(bool),
    Let,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,
    Bang,
    Less,
    Greater,
    Assign,
    AndAnd,
    OrOr,
    Nullish,
    StarStar,
    /// `==` or `===`.
    EqEq,
    /// `!=` or `!==`.
    NotEq,
    LessEq,
    GreaterEq,
    Arrow,
    Ellipsis,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character of the token.
    pub offset: usize,
}

/// Cursor over a fully tokenized input.
#[derive(Clone, Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

/// Opaque cursor position returned by [`TokenStream::mark`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mark(usize);

impl TokenStream {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> &Token {
        // The last token is always `Eof`, and the cursor never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Look `n` tokens past the current one.
    pub fn peek_nth(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    pub fn next_token(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub fn mark(&self) -> Mark {
        Mark(self.pos)
    }

    pub fn reset(&mut self, mark: Mark) {
        self.pos = mark.0;
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn consume_while<F>(&mut self, mut predicate: F) -> &'a str
    where
        F: FnMut(char) -> bool,
    {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn skip_trivia(&mut self) -> ParseResult<()> {
        loop {
            self.consume_while(char::is_whitespace);
            match (self.peek(), self.peek_at(1)) {
                (Some('/'), Some('/')) => {
                    self.consume_while(|c| c != '\n');
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.input[self.pos..].find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => return Err(SyntaxError::new("unterminated block comment", start)),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_trivia()?;
        let offset = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };

        let kind = match ch {
            '"' | '\'' => self.lex_string(ch)?,
            c if c.is_ascii_digit() => self.lex_number()?,
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number()?,
            c if is_ident_start(c) => {
                let ident = self.consume_while(is_ident_part);
                match ident {
                    "true" => TokenKind::Boolean(true),
                    "false" => TokenKind::Boolean(false),
                    "let" => TokenKind::Let,
                    "in" => TokenKind::In,
                    _ => TokenKind::Identifier(ident.to_string()),
                }
            }
            _ => self.lex_punct(ch, offset)?,
        };
        Ok(Token { kind, offset })
    }

    fn lex_punct(&mut self, ch: char, offset: usize) -> ParseResult<TokenKind> {
        self.bump();
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '/' => TokenKind::Slash,
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.pos += 2;
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '?' => {
                if self.eat('?') {
                    TokenKind::Nullish
                } else {
                    TokenKind::Question
                }
            }
            '*' => {
                if self.eat('*') {
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AndAnd
                } else {
                    TokenKind::Ampersand
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::OrOr
                } else {
                    return Err(SyntaxError::new("unexpected character '|'", offset));
                }
            }
            '=' => {
                if self.eat('=') {
                    self.eat('=');
                    TokenKind::EqEq
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    self.eat('=');
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            other => {
                return Err(SyntaxError::new(
                    format!("unexpected character {other:?}"),
                    offset,
                ))
            }
        };
        Ok(kind)
    }

    fn lex_number(&mut self) -> ParseResult<TokenKind> {
        let start = self.pos;
        self.consume_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.consume_while(|c| c.is_ascii_digit());
        }
        // Exponent notation like `1e3` / `2.5E-2`.
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_start = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.consume_while(|c| c.is_ascii_digit()).is_empty() {
                return Err(SyntaxError::new(
                    "invalid number (expected exponent digits)",
                    exp_start,
                ));
            }
        }
        let text = &self.input[start..self.pos];
        let value: f64 = text
            .parse()
            .map_err(|_| SyntaxError::new(format!("invalid number {text:?}"), start))?;
        if !value.is_finite() {
            return Err(SyntaxError::new(format!("number {text:?} is out of range"), start));
        }
        Ok(TokenKind::Number(value))
    }

    fn lex_string(&mut self, quote: char) -> ParseResult<TokenKind> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(SyntaxError::new("unterminated string literal", start));
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escape_at = self.pos - 1;
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('u') => self.lex_unicode_escape(escape_at)?,
                        _ => return Err(SyntaxError::new("invalid escape sequence", escape_at)),
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
        Ok(TokenKind::String(out))
    }

    fn lex_unicode_escape(&mut self, escape_at: usize) -> ParseResult<char> {
        let digits = self.input.get(self.pos..self.pos + 4).unwrap_or("");
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SyntaxError::new(
                "\\u escape requires four hex digits",
                escape_at,
            ));
        }
        self.pos += 4;
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxError::new("invalid unicode escape", escape_at))
    }
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize `source`. The returned stream always ends with an [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> ParseResult<TokenStream> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(TokenStream::new(tokens));
        }
    }
}

/// Convert a byte offset into a 1-based `(line, column)` pair. Columns count characters.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let column = source[line_start..offset].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut stream = tokenize(source).unwrap();
        let mut out = Vec::new();
        loop {
            let token = stream.next_token();
            if token.kind == TokenKind::Eof {
                return out;
            }
            out.push(token.kind);
        }
    }

    #[test]
    fn multi_char_operators_are_matched_greedily() {
        assert_eq!(
            kinds("a ?? b ** c === d !== e => ...f"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Nullish,
                TokenKind::Identifier("b".into()),
                TokenKind::StarStar,
                TokenKind::Identifier("c".into()),
                TokenKind::EqEq,
                TokenKind::Identifier("d".into()),
                TokenKind::NotEq,
                TokenKind::Identifier("e".into()),
                TokenKind::Arrow,
                TokenKind::Ellipsis,
                TokenKind::Identifier("f".into()),
            ]
        );
    }

    #[test]
    fn numbers_support_fractions_and_exponents() {
        assert_eq!(
            kinds("12 1.5 .5 1e3 2.5E-2"),
            vec![
                TokenKind::Number(12.0),
                TokenKind::Number(1.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.025),
            ]
        );
    }

    #[test]
    fn strings_handle_escapes_in_both_quote_styles() {
        assert_eq!(
            kinds(r#""a\"b\n" 'it\'s' "é""#),
            vec![
                TokenKind::String("a\"b\n".into()),
                TokenKind::String("it's".into()),
                TokenKind::String("é".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // trailing\n + /* inline */ 2"),
            vec![TokenKind::Number(1.0), TokenKind::Plus, TokenKind::Number(2.0)]
        );
    }

    #[test]
    fn unexpected_character_reports_offset() {
        let err = tokenize("1 + #").unwrap_err();
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn unknown_identifiers_are_not_a_lexing_concern() {
        assert!(tokenize("nope.nothing(1)").is_ok());
    }

    #[test]
    fn mark_and_reset_rewind_the_cursor() {
        let mut stream = tokenize("(x) + 1").unwrap();
        let mark = stream.mark();
        stream.next_token();
        stream.next_token();
        assert_eq!(stream.peek_kind(), &TokenKind::RParen);
        stream.reset(mark);
        assert_eq!(stream.peek_kind(), &TokenKind::LParen);
    }

    #[test]
    fn line_col_is_one_based() {
        let src = "a\nbc\n  d";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 3), (2, 2));
        assert_eq!(line_col(src, 7), (3, 3));
    }
}
