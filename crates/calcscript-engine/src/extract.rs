//! Declaration extraction.
//!
//! Splits a calc block into top-level `name = expr;` declarations (optionally written
//! `const name = expr;`) without involving the expression grammar. The scanner tracks string
//! literals, line/block comments and bracket nesting so that a `;` inside any of them never
//! terminates a declaration, and declarations nested inside arrow bodies or `let` blocks are
//! never mistaken for top-level ones.

use crate::diagnostics::{codes, Message};
use crate::lexer::{is_ident_part, is_ident_start, line_col};

/// One top-level declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    /// Raw expression text between `=` and the terminating `;`, trimmed.
    pub expression: String,
    /// Byte offset of `expression` within the scanned source.
    pub expression_offset: usize,
    /// Byte offset one past the terminating `;`.
    pub end_offset: usize,
    /// Absolute (base-line adjusted) line of the declaration name.
    pub line: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub declarations: Vec<Declaration>,
    pub messages: Vec<Message>,
}

/// Where a scan for the end of an expression stopped.
enum ExprEnd {
    /// Offset of the terminating `;`.
    Semicolon(usize),
    /// Offset of the line that starts the next declaration (or end of input).
    Unterminated(usize),
}

struct Scanner<'a> {
    source: &'a str,
    base_line: usize,
}

impl<'a> Scanner<'a> {
    fn line_col(&self, offset: usize) -> (usize, usize) {
        let (line, col) = line_col(self.source, offset);
        (line + self.base_line - 1, col)
    }

    fn next_line_start(&self, offset: usize) -> usize {
        self.source[offset..]
            .find('\n')
            .map_or(self.source.len(), |idx| offset + idx + 1)
    }

    /// Skip whitespace and comments between declarations.
    fn skip_trivia(&self, mut pos: usize) -> usize {
        let bytes = self.source.as_bytes();
        loop {
            while pos < bytes.len() && (bytes[pos] as char).is_ascii_whitespace() {
                pos += 1;
            }
            if self.source[pos..].starts_with("//") {
                pos = self.next_line_start(pos);
            } else if self.source[pos..].starts_with("/*") {
                pos = self.source[pos + 2..]
                    .find("*/")
                    .map_or(self.source.len(), |idx| pos + 2 + idx + 2);
            } else {
                return pos;
            }
        }
    }

    /// Scan expression text starting at `start` until a `;` at nesting depth zero, outside
    /// strings and comments.
    fn scan_expression(&self, start: usize) -> ExprEnd {
        let mut depth: usize = 0;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut line_comment = false;
        let mut block_comment = false;
        let mut chars = self.source[start..].char_indices().peekable();

        while let Some((rel, ch)) = chars.next() {
            let pos = start + rel;
            let next = chars.peek().map(|&(_, c)| c);

            if ch == '\n' {
                line_comment = false;
                // String literals cannot span lines.
                quote = None;
                escaped = false;
                if !block_comment && depth == 0 && starts_declaration(&self.source[pos + 1..]) {
                    return ExprEnd::Unterminated(pos + 1);
                }
                continue;
            }
            if line_comment {
                continue;
            }
            if block_comment {
                if ch == '*' && next == Some('/') {
                    chars.next();
                    block_comment = false;
                }
                continue;
            }
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '"' | '\'' => quote = Some(ch),
                '/' if next == Some('/') => line_comment = true,
                '/' if next == Some('*') => {
                    chars.next();
                    block_comment = true;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ';' if depth == 0 => return ExprEnd::Semicolon(pos),
                _ => {}
            }
        }
        ExprEnd::Unterminated(self.source.len())
    }

    fn skip_statement(&self, from: usize) -> usize {
        match self.scan_expression(from) {
            ExprEnd::Semicolon(pos) => pos + 1,
            ExprEnd::Unterminated(pos) => pos,
        }
    }

    fn run(&self) -> Extraction {
        let mut out = Extraction::default();
        let mut pos = 0;

        loop {
            pos = self.skip_trivia(pos);
            if pos >= self.source.len() {
                return out;
            }

            let rest = &self.source[pos..];
            if let Some(after_const) = strip_keyword(rest, "const") {
                pos += rest.len() - after_const.len();
                pos += leading_inline_whitespace(&self.source[pos..]);
            }

            let name_start = pos;
            let name_len = identifier_len(&self.source[pos..]);
            if name_len == 0 {
                let (line, col) = self.line_col(name_start);
                out.messages.push(
                    Message::error(codes::EXPECT_IDENTIFIER, "expected a declaration name")
                        .at(line, col),
                );
                pos = self.skip_statement(pos);
                continue;
            }
            let name = &self.source[name_start..name_start + name_len];
            pos = name_start + name_len;
            pos += leading_inline_whitespace(&self.source[pos..]);

            let after = &self.source[pos..];
            if !after.starts_with('=') || after.starts_with("==") || after.starts_with("=>") {
                let (line, col) = self.line_col(pos);
                out.messages.push(
                    Message::error(
                        codes::EXPECT_EQUALS,
                        format!("expected '=' after declaration name '{name}'"),
                    )
                    .at(line, col)
                    .for_node(name),
                );
                pos = self.skip_statement(pos);
                continue;
            }
            pos += 1;

            let (line, _) = self.line_col(name_start);
            match self.scan_expression(pos) {
                ExprEnd::Semicolon(end) => {
                    let raw = &self.source[pos..end];
                    let leading = raw.len() - raw.trim_start().len();
                    out.declarations.push(Declaration {
                        name: name.to_string(),
                        expression: raw.trim().to_string(),
                        expression_offset: pos + leading,
                        end_offset: end + 1,
                        line,
                    });
                    pos = end + 1;
                }
                ExprEnd::Unterminated(next) => {
                    let (end_line, end_col) = self.line_col(next_non_newline(self.source, next));
                    out.messages.push(
                        Message::error(
                            codes::MISSING_SEMICOLON,
                            format!("missing ';' after declaration '{name}'"),
                        )
                        .at(end_line.max(line), end_col)
                        .for_node(name),
                    );
                    pos = next;
                }
            }
        }
    }
}

fn next_non_newline(source: &str, offset: usize) -> usize {
    // Report the position just before the next declaration, i.e. the end of the
    // unterminated one.
    let before = &source[..offset];
    before.trim_end().len()
}

fn strip_keyword<'s>(text: &'s str, keyword: &str) -> Option<&'s str> {
    let rest = text.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if c == ' ' || c == '\t' => Some(rest),
        _ => None,
    }
}

fn leading_inline_whitespace(text: &str) -> usize {
    text.len() - text.trim_start_matches([' ', '\t']).len()
}

fn identifier_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if is_ident_start(c) => {}
        _ => return 0,
    }
    chars
        .find(|&(_, c)| !is_ident_part(c))
        .map_or(text.len(), |(idx, _)| idx)
}

/// Whether `line` (text following a newline) opens a new unindented declaration.
fn starts_declaration(line: &str) -> bool {
    let mut rest = line;
    if let Some(after) = strip_keyword(rest, "const") {
        rest = after.trim_start_matches([' ', '\t']);
    }
    let len = identifier_len(rest);
    if len == 0 {
        return false;
    }
    let after = rest[len..].trim_start_matches([' ', '\t']);
    after.starts_with('=') && !after.starts_with("==") && !after.starts_with("=>")
}

/// Extract top-level declarations from `source`. Reported lines are offset so that the first
/// line of `source` is `base_line`.
pub fn extract(source: &str, base_line: usize) -> Extraction {
    Scanner {
        source,
        base_line: base_line.max(1),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(extraction: &Extraction) -> Vec<&str> {
        extraction
            .declarations
            .iter()
            .map(|d| d.name.as_str())
            .collect()
    }

    #[test]
    fn extracts_simple_declarations_with_lines() {
        let src = "a = 1;\nconst b = a + 1;\n\n// note\nc = \"x;y\"; // trailing ; comment\n";
        let out = extract(src, 10);
        assert_eq!(names(&out), vec!["a", "b", "c"]);
        assert_eq!(out.declarations[1].expression, "a + 1");
        assert_eq!(out.declarations[2].expression, "\"x;y\"");
        assert_eq!(out.declarations[2].line, 14);
        assert!(out.messages.is_empty());
    }

    #[test]
    fn semicolons_inside_comments_and_brackets_do_not_terminate() {
        let src = "total = let {\n  a = 1;\n  b = 2; /* ; */\n} in a + b;\nnext = 3;";
        let out = extract(src, 1);
        assert_eq!(names(&out), vec!["total", "next"]);
        assert!(out.declarations[0].expression.ends_with("in a + b"));
    }

    #[test]
    fn indented_declarations_inside_arrow_bodies_are_not_top_level() {
        let src = "f = (x) =>\n  let {\n    y = x * 2\n  } in y;\n";
        let out = extract(src, 1);
        assert_eq!(names(&out), vec!["f"]);
    }

    #[test]
    fn reports_expect_identifier_and_continues() {
        let src = "= 1;\nok = 2;";
        let out = extract(src, 1);
        assert_eq!(names(&out), vec!["ok"]);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].code, codes::EXPECT_IDENTIFIER);
        assert_eq!(out.messages[0].line, Some(1));
    }

    #[test]
    fn reports_expect_equals_and_continues() {
        let src = "a 1;\nb = 2;";
        let out = extract(src, 1);
        assert_eq!(names(&out), vec!["b"]);
        assert_eq!(out.messages[0].code, codes::EXPECT_EQUALS);
        assert_eq!(out.messages[0].column, Some(3));
    }

    #[test]
    fn reports_missing_semicolon_before_next_declaration() {
        let src = "a = 1 +\n  2\nb = 3;\nc = 4";
        let out = extract(src, 1);
        assert_eq!(names(&out), vec!["b"]);
        let codes: Vec<&str> = out.messages.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec![codes::MISSING_SEMICOLON, codes::MISSING_SEMICOLON]);
        assert_eq!(out.messages[0].line, Some(2));
        assert_eq!(out.messages[1].line, Some(4));
    }

    #[test]
    fn expression_offset_points_into_source() {
        let src = "value =   10 * 2;";
        let out = extract(src, 1);
        let decl = &out.declarations[0];
        assert_eq!(&src[decl.expression_offset..decl.expression_offset + 6], "10 * 2");
    }
}
