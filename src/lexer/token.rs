use serde::{Deserialize, Serialize};

/// A point in the source text. `line` and `column` are 0-based; `column`
/// counts characters, `offset` counts bytes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Index of a significant token in the stream returned by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxTokenKind {
    // Trivia
    Space,
    Tab,
    Newline,
    SingleLineComment,
    MultilineComment,

    // Punctuation
    Comma,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Colon,
    Semicolon,
    Tilde,

    /// `< > <> <= >= = == != - + * / % . ! && ||`
    Op,

    // Literals and names
    NumericLiteral,
    /// Single-quoted or triple-quoted string
    StringLiteral,
    /// Double-quoted name
    QuotedString,
    ColorLiteral,
    /// Backtick-quoted raw expression
    FunctionExpression,
    Identifier,

    Eof,
}

impl SyntaxTokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            SyntaxTokenKind::Space
                | SyntaxTokenKind::Tab
                | SyntaxTokenKind::Newline
                | SyntaxTokenKind::SingleLineComment
                | SyntaxTokenKind::MultilineComment
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxToken {
    pub kind: SyntaxTokenKind,
    /// Decoded value: string contents without quotes, identifier text,
    /// operator text, comment text.
    pub value: String,
    pub start: Position,
    pub end: Position,
    pub leading_trivia: Vec<SyntaxToken>,
    pub trailing_trivia: Vec<SyntaxToken>,
    pub leading_invalid: Vec<SyntaxToken>,
    pub trailing_invalid: Vec<SyntaxToken>,
    pub is_invalid: bool,
}

impl SyntaxToken {
    pub fn new(kind: SyntaxTokenKind, value: String, start: Position, end: Position) -> Self {
        Self {
            kind,
            value,
            start,
            end,
            leading_trivia: Vec::new(),
            trailing_trivia: Vec::new(),
            leading_invalid: Vec::new(),
            trailing_invalid: Vec::new(),
            is_invalid: false,
        }
    }

    pub fn invalid(value: String, start: Position, end: Position) -> Self {
        let mut token = Self::new(SyntaxTokenKind::Op, value, start, end);
        token.is_invalid = true;
        token
    }

    /// Start of the token including its leading trivia and invalid tokens.
    pub fn full_start(&self) -> Position {
        self.leading_trivia
            .iter()
            .chain(self.leading_invalid.iter())
            .map(|t| t.start)
            .fold(self.start, std::cmp::min)
    }

    /// End of the token including its trailing trivia and invalid tokens.
    pub fn full_end(&self) -> Position {
        self.trailing_trivia
            .iter()
            .chain(self.trailing_invalid.iter())
            .map(|t| t.end)
            .fold(self.end, std::cmp::max)
    }

    /// True when the token is the last significant one on its line.
    pub fn ends_line(&self) -> bool {
        self.trailing_trivia.iter().any(|t| {
            t.kind == SyntaxTokenKind::Newline
                || (t.kind == SyntaxTokenKind::MultilineComment && t.value.contains('\n'))
        })
    }

    pub fn is_op(&self, op: &str) -> bool {
        self.kind == SyntaxTokenKind::Op && !self.is_invalid && self.value == op
    }

    /// Identifiers compare case-insensitively against keywords such as `as`.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == SyntaxTokenKind::Identifier && self.value.eq_ignore_ascii_case(keyword)
    }
}
