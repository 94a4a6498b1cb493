//! Lexer for DBML source text.
//!
//! Scans the input into classified tokens. Whitespace and comments are kept as
//! trivia and unrecognised characters as invalid tokens; both are attached to
//! the nearest significant token so that the full spans of the returned
//! tokens tile the input exactly. The lexer never fails: problems are
//! reported as diagnostics and the stream always ends with one `Eof` token.

pub mod token;

use crate::error::{CompileError, CompileErrorCode, NodeOrToken, Report};
pub use token::{Position, SyntaxToken, SyntaxTokenKind, TokenId};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    offset: usize,
    line: usize,
    column: usize,
    errors: Vec<CompileError>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
            offset: 0,
            line: 0,
            column: 0,
            errors: Vec::new(),
        }
    }

    fn here(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    /// Peek at the next character without consuming it
    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn error(&mut self, code: CompileErrorCode, message: impl Into<String>, start: Position) {
        let end = self.here();
        self.errors.push(CompileError::new(
            code,
            message,
            NodeOrToken::Detached,
            start,
            end,
        ));
    }

    fn single(&mut self, kind: SyntaxTokenKind) -> SyntaxToken {
        let start = self.here();
        let ch = self.current_char.unwrap_or_default();
        self.advance();
        SyntaxToken::new(kind, ch.to_string(), start, self.here())
    }

    fn read_run(&mut self, kind: SyntaxTokenKind, target: char) -> SyntaxToken {
        let start = self.here();
        let mut value = String::new();
        while self.current_char == Some(target) {
            value.push(target);
            self.advance();
        }
        SyntaxToken::new(kind, value, start, self.here())
    }

    fn read_newline(&mut self) -> SyntaxToken {
        let start = self.here();
        let mut value = String::new();
        if self.current_char == Some('\r') {
            value.push('\r');
            self.advance();
        }
        if self.current_char == Some('\n') {
            value.push('\n');
            self.advance();
        }
        SyntaxToken::new(SyntaxTokenKind::Newline, value, start, self.here())
    }

    fn read_single_line_comment(&mut self) -> SyntaxToken {
        let start = self.here();
        self.advance();
        self.advance();
        let mut value = String::new();
        while let Some(ch) = self.current_char {
            if ch == '\n' || (ch == '\r' && self.peek_char() == Some('\n')) {
                break;
            }
            value.push(ch);
            self.advance();
        }
        SyntaxToken::new(
            SyntaxTokenKind::SingleLineComment,
            value,
            start,
            self.here(),
        )
    }

    fn read_multiline_comment(&mut self) -> SyntaxToken {
        let start = self.here();
        self.advance();
        self.advance();
        let mut value = String::new();
        loop {
            match self.current_char {
                None => {
                    self.error(
                        CompileErrorCode::UnexpectedEof,
                        "Unterminated multiline comment",
                        start,
                    );
                    break;
                }
                Some('*') if self.peek_char() == Some('/') => {
                    self.advance();
                    self.advance();
                    break;
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
        SyntaxToken::new(SyntaxTokenKind::MultilineComment, value, start, self.here())
    }

    fn read_number(&mut self) -> SyntaxToken {
        let start = self.here();
        let mut text = String::new();

        while let Some(ch) = self.current_char.filter(|c| c.is_ascii_digit()) {
            text.push(ch);
            self.advance();
        }

        if self.current_char == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            text.push('.');
            self.advance();
            while let Some(ch) = self.current_char.filter(|c| c.is_ascii_digit()) {
                text.push(ch);
                self.advance();
            }
        }

        if matches!(self.current_char, Some('e') | Some('E')) {
            let has_exponent = match self.peek_char() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if has_exponent {
                text.push(self.current_char.unwrap_or('e'));
                self.advance();
                if let Some(sign) = self.current_char.filter(|c| *c == '+' || *c == '-') {
                    text.push(sign);
                    self.advance();
                }
                while let Some(ch) = self.current_char.filter(|c| c.is_ascii_digit()) {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        // `2fa_codes` is a name, not a number followed by garbage
        if !text.contains('.') && self.current_char.is_some_and(is_identifier_char) {
            while let Some(ch) = self.current_char.filter(|c| is_identifier_char(*c)) {
                text.push(ch);
                self.advance();
            }
            return SyntaxToken::new(SyntaxTokenKind::Identifier, text, start, self.here());
        }

        SyntaxToken::new(SyntaxTokenKind::NumericLiteral, text, start, self.here())
    }

    fn read_identifier(&mut self) -> SyntaxToken {
        let start = self.here();
        let mut ident = String::new();

        while let Some(ch) = self.current_char {
            if is_identifier_char(ch) {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        SyntaxToken::new(SyntaxTokenKind::Identifier, ident, start, self.here())
    }

    fn read_escape(&mut self, value: &mut String) {
        let escape_start = self.here();
        self.advance(); // Skip backslash
        let Some(escaped) = self.current_char else {
            return;
        };
        match escaped {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '\\' | '\'' | '"' | '`' => value.push(escaped),
            'u' => {
                let hex: String = (1..=4).filter_map(|i| self.peek_nth(i)).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) if hex.len() == 4 => {
                        for _ in 0..4 {
                            self.advance();
                        }
                        value.push(ch);
                    }
                    _ => {
                        self.advance();
                        self.error(
                            CompileErrorCode::InvalidEscapeSequence,
                            "Invalid unicode escape sequence",
                            escape_start,
                        );
                        value.push('u');
                        return;
                    }
                }
            }
            '\n' => {}
            other => {
                self.advance();
                self.error(
                    CompileErrorCode::InvalidEscapeSequence,
                    format!("Unknown escape sequence '\\{}'", other),
                    escape_start,
                );
                value.push(other);
                return;
            }
        }
        self.advance();
    }

    /// Read a quoted token that must close on the same line.
    fn read_quoted(&mut self, quote: char, kind: SyntaxTokenKind) -> SyntaxToken {
        let start = self.here();
        self.advance(); // Skip opening quote

        let mut value = String::new();

        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance(); // Skip closing quote
                return SyntaxToken::new(kind, value, start, self.here());
            } else if ch == '\\' {
                self.read_escape(&mut value);
            } else if ch == '\n' || ch == '\r' {
                self.error(
                    CompileErrorCode::UnexpectedNewline,
                    "Unexpected newline in quoted text",
                    start,
                );
                return SyntaxToken::new(kind, value, start, self.here());
            } else {
                value.push(ch);
                self.advance();
            }
        }

        self.error(
            CompileErrorCode::UnexpectedEof,
            "Unterminated quoted text",
            start,
        );
        SyntaxToken::new(kind, value, start, self.here())
    }

    /// Read a `'''...'''` string, stripping the common indentation.
    fn read_multiline_string(&mut self) -> SyntaxToken {
        let start = self.here();
        for _ in 0..3 {
            self.advance();
        }

        let mut raw = String::new();
        let mut terminated = false;
        while let Some(ch) = self.current_char {
            if ch == '\'' && self.peek_char() == Some('\'') && self.peek_nth(2) == Some('\'') {
                for _ in 0..3 {
                    self.advance();
                }
                terminated = true;
                break;
            } else if ch == '\\' {
                self.read_escape(&mut raw);
            } else {
                raw.push(ch);
                self.advance();
            }
        }

        if !terminated {
            self.error(
                CompileErrorCode::UnexpectedEof,
                "Unterminated multiline string",
                start,
            );
        }

        SyntaxToken::new(
            SyntaxTokenKind::StringLiteral,
            dedent(&raw),
            start,
            self.here(),
        )
    }

    fn read_function_expression(&mut self) -> SyntaxToken {
        let start = self.here();
        self.advance(); // Skip opening backtick

        let mut value = String::new();
        while let Some(ch) = self.current_char {
            if ch == '`' {
                self.advance();
                return SyntaxToken::new(
                    SyntaxTokenKind::FunctionExpression,
                    value,
                    start,
                    self.here(),
                );
            } else if ch == '\\' && self.peek_char() == Some('`') {
                self.advance();
                value.push('`');
                self.advance();
            } else {
                value.push(ch);
                self.advance();
            }
        }

        self.error(
            CompileErrorCode::UnexpectedEof,
            "Unterminated function expression",
            start,
        );
        SyntaxToken::new(
            SyntaxTokenKind::FunctionExpression,
            value,
            start,
            self.here(),
        )
    }

    fn read_color(&mut self) -> SyntaxToken {
        let start = self.here();
        let mut value = String::from("#");
        self.advance();
        while let Some(ch) = self.current_char.filter(|c| c.is_ascii_alphanumeric()) {
            value.push(ch);
            self.advance();
        }
        if value.len() == 1 {
            self.error(CompileErrorCode::UnknownSymbol, "Unknown symbol '#'", start);
            return SyntaxToken::invalid(value, start, self.here());
        }
        SyntaxToken::new(SyntaxTokenKind::ColorLiteral, value, start, self.here())
    }

    fn read_operator(&mut self) -> SyntaxToken {
        let start = self.here();
        let first = self.current_char.unwrap_or_default();
        let second = self.peek_char();
        let two: Option<&str> = match (first, second) {
            ('<', Some('>')) => Some("<>"),
            ('<', Some('=')) => Some("<="),
            ('>', Some('=')) => Some(">="),
            ('=', Some('=')) => Some("=="),
            ('!', Some('=')) => Some("!="),
            ('&', Some('&')) => Some("&&"),
            ('|', Some('|')) => Some("||"),
            _ => None,
        };

        if let Some(op) = two {
            self.advance();
            self.advance();
            return SyntaxToken::new(SyntaxTokenKind::Op, op.to_string(), start, self.here());
        }

        self.advance();
        if matches!(first, '&' | '|') {
            self.error(
                CompileErrorCode::UnknownSymbol,
                format!("Unknown symbol '{}'", first),
                start,
            );
            return SyntaxToken::invalid(first.to_string(), start, self.here());
        }
        SyntaxToken::new(SyntaxTokenKind::Op, first.to_string(), start, self.here())
    }

    /// Scan one raw token, trivia included.
    fn next_raw_token(&mut self) -> SyntaxToken {
        let Some(ch) = self.current_char else {
            let here = self.here();
            return SyntaxToken::new(SyntaxTokenKind::Eof, String::new(), here, here);
        };

        match ch {
            ' ' => self.read_run(SyntaxTokenKind::Space, ' '),
            '\t' => self.read_run(SyntaxTokenKind::Tab, '\t'),
            '\n' => self.read_newline(),
            '\r' if self.peek_char() == Some('\n') => self.read_newline(),
            '/' if self.peek_char() == Some('/') => self.read_single_line_comment(),
            '/' if self.peek_char() == Some('*') => self.read_multiline_comment(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            '\'' if self.peek_char() == Some('\'') && self.peek_nth(2) == Some('\'') => {
                self.read_multiline_string()
            }
            '\'' => self.read_quoted('\'', SyntaxTokenKind::StringLiteral),
            '"' => self.read_quoted('"', SyntaxTokenKind::QuotedString),
            '`' => self.read_function_expression(),
            '#' => self.read_color(),
            ',' => self.single(SyntaxTokenKind::Comma),
            '(' => self.single(SyntaxTokenKind::LeftParen),
            ')' => self.single(SyntaxTokenKind::RightParen),
            '{' => self.single(SyntaxTokenKind::LeftBrace),
            '}' => self.single(SyntaxTokenKind::RightBrace),
            '[' => self.single(SyntaxTokenKind::LeftBracket),
            ']' => self.single(SyntaxTokenKind::RightBracket),
            ':' => self.single(SyntaxTokenKind::Colon),
            ';' => self.single(SyntaxTokenKind::Semicolon),
            '~' => self.single(SyntaxTokenKind::Tilde),
            '<' | '>' | '=' | '!' | '-' | '+' | '*' | '/' | '%' | '.' | '&' | '|' => {
                self.read_operator()
            }
            other => {
                let start = self.here();
                self.advance();
                self.error(
                    CompileErrorCode::UnknownSymbol,
                    format!("Unknown symbol '{}'", other),
                    start,
                );
                SyntaxToken::invalid(other.to_string(), start, self.here())
            }
        }
    }

    /// Tokenize the whole input, attaching trivia and invalid tokens to their
    /// neighbouring significant tokens.
    pub fn tokenize(mut self) -> Report<Vec<SyntaxToken>> {
        let _span = tracing::debug_span!("lex", chars = self.input.len()).entered();

        let mut raw = Vec::new();
        loop {
            let token = self.next_raw_token();
            let is_eof = token.kind == SyntaxTokenKind::Eof;
            raw.push(token);
            if is_eof {
                break;
            }
        }

        let mut tokens = Vec::new();
        let mut leading_trivia = Vec::new();
        let mut leading_invalid = Vec::new();
        let mut raw = raw.into_iter().peekable();

        while let Some(mut token) = raw.next() {
            if token.kind.is_trivia() {
                leading_trivia.push(token);
                continue;
            }
            if token.is_invalid {
                leading_invalid.push(token);
                continue;
            }

            token.leading_trivia = std::mem::take(&mut leading_trivia);
            token.leading_invalid = std::mem::take(&mut leading_invalid);

            while let Some(next) = raw.peek() {
                if next.kind == SyntaxTokenKind::Eof {
                    break;
                }
                if next.kind.is_trivia() {
                    let ends_line = next.kind == SyntaxTokenKind::Newline
                        || (next.kind == SyntaxTokenKind::MultilineComment
                            && next.value.contains('\n'));
                    if let Some(trivia) = raw.next() {
                        token.trailing_trivia.push(trivia);
                    }
                    if ends_line {
                        break;
                    }
                } else if next.is_invalid {
                    if let Some(invalid) = raw.next() {
                        token.trailing_invalid.push(invalid);
                    }
                } else {
                    break;
                }
            }

            tokens.push(token);
        }

        tracing::debug!(
            tokens = tokens.len(),
            errors = self.errors.len(),
            "lexing finished"
        );
        Report::new(tokens, self.errors, Vec::new())
    }
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Strip the leading/trailing blank line and the common indentation of a
/// triple-quoted string.
fn dedent(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.split('\n').collect();
    if lines.first().is_some_and(|l| l.trim().is_empty()) && lines.len() > 1 {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim().is_empty()) && lines.len() > 1 {
        lines.pop();
    }

    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| l.chars().skip(indent).collect::<String>())
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convenience wrapper used by the parser and tests.
pub fn tokenize(input: &str) -> Report<Vec<SyntaxToken>> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<SyntaxTokenKind> {
        tokenize(input).value.iter().map(|t| t.kind).collect()
    }

    fn values(input: &str) -> Vec<String> {
        tokenize(input)
            .value
            .iter()
            .map(|t| t.value.clone())
            .collect()
    }

    fn reconstruct(input: &str, tokens: &[SyntaxToken]) -> String {
        tokens
            .iter()
            .map(|t| &input[t.full_start().offset..t.full_end().offset])
            .collect()
    }

    #[test]
    fn test_table_header() {
        assert_eq!(
            kinds("Table users {"),
            vec![
                SyntaxTokenKind::Identifier,
                SyntaxTokenKind::Identifier,
                SyntaxTokenKind::LeftBrace,
                SyntaxTokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds(",()[]{}:;~"),
            vec![
                SyntaxTokenKind::Comma,
                SyntaxTokenKind::LeftParen,
                SyntaxTokenKind::RightParen,
                SyntaxTokenKind::LeftBracket,
                SyntaxTokenKind::RightBracket,
                SyntaxTokenKind::LeftBrace,
                SyntaxTokenKind::RightBrace,
                SyntaxTokenKind::Colon,
                SyntaxTokenKind::Semicolon,
                SyntaxTokenKind::Tilde,
                SyntaxTokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            values("< > <> <= >= - . == !="),
            vec!["<", ">", "<>", "<=", ">=", "-", ".", "==", "!=", ""]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1 3.14 1e3 2.5E-2").value;
        assert!(tokens[..4]
            .iter()
            .all(|t| t.kind == SyntaxTokenKind::NumericLiteral));
        assert_eq!(tokens[2].value, "1e3");
        assert_eq!(tokens[3].value, "2.5E-2");
    }

    #[test]
    fn test_digit_prefixed_identifier() {
        let tokens = tokenize("2fa_codes").value;
        assert_eq!(tokens[0].kind, SyntaxTokenKind::Identifier);
        assert_eq!(tokens[0].value, "2fa_codes");
    }

    #[test]
    fn test_strings_and_quoted_names() {
        let tokens = tokenize("'hello\\nworld' \"first name\" `now()` #fff").value;
        assert_eq!(tokens[0].kind, SyntaxTokenKind::StringLiteral);
        assert_eq!(tokens[0].value, "hello\nworld");
        assert_eq!(tokens[1].kind, SyntaxTokenKind::QuotedString);
        assert_eq!(tokens[1].value, "first name");
        assert_eq!(tokens[2].kind, SyntaxTokenKind::FunctionExpression);
        assert_eq!(tokens[2].value, "now()");
        assert_eq!(tokens[3].kind, SyntaxTokenKind::ColorLiteral);
        assert_eq!(tokens[3].value, "#fff");
    }

    #[test]
    fn test_multiline_string_dedent() {
        let input = "'''\n    first\n      second\n    '''";
        let tokens = tokenize(input).value;
        assert_eq!(tokens[0].value, "first\n  second");
    }

    #[test]
    fn test_comments_are_trivia() {
        let tokens = tokenize("a // note\n/* block */ b").value;
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens[0].trailing_trivia.last().map(|t| t.kind),
            Some(SyntaxTokenKind::Newline)
        );
        assert!(tokens[0].ends_line());
        assert_eq!(
            tokens[1].leading_trivia[0].kind,
            SyntaxTokenKind::MultilineComment
        );
    }

    #[test]
    fn test_invalid_char_attached_not_fatal() {
        let report = tokenize("a $ b\n? c");
        let tokens = report.value;
        assert_eq!(report.errors.len(), 2);
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].trailing_invalid.len(), 1);
        assert_eq!(tokens[0].trailing_invalid[0].value, "$");
        assert_eq!(tokens[2].leading_invalid.len(), 1);
        assert_eq!(tokens[2].leading_invalid[0].value, "?");
    }

    #[test]
    fn test_unterminated_string_reports() {
        let report = tokenize("'abc\nTable");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, CompileErrorCode::UnexpectedNewline);
        assert_eq!(report.value[0].value, "abc");
        assert_eq!(report.value[1].value, "Table");
    }

    #[test]
    fn test_full_spans_tile_input() {
        let input = "// header\nTable users { // trailing\n  id int [pk] $\n  name 'x'\n}\n\n";
        let tokens = tokenize(input).value;
        for token in &tokens {
            assert!(token.full_start() <= token.start);
            assert!(token.start <= token.end);
            assert!(token.end <= token.full_end());
        }
        assert_eq!(reconstruct(input, &tokens), input);
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = tokenize("a\n  bé c").value;
        assert_eq!(tokens[1].start.line, 1);
        assert_eq!(tokens[1].start.column, 2);
        assert_eq!(tokens[2].start.column, 5);
        assert_eq!(tokens[2].start.offset, 8);
    }

    #[test]
    fn test_eof_only() {
        let tokens = tokenize("").value;
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, SyntaxTokenKind::Eof);
    }
}
