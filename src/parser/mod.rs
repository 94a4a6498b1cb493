//! Parser module for DBML.
//!
//! Converts the lexer's token stream into a full-fidelity `SyntaxTree`.
//! Element declarations are parsed by recursive descent, expressions by
//! precedence climbing (see `expressions`). The parser never fails: missing
//! pieces become zero-width `Dummy` nodes and unexpected tokens are reported
//! and skipped.

mod expressions;

use crate::ast::{ElementDeclaration, NodeId, SyntaxNodeKind, SyntaxTree};
use crate::error::{CompileError, CompileErrorCode, NodeOrToken, Report};
use crate::lexer::token::{Position, SyntaxToken, SyntaxTokenKind, TokenId};
use crate::lexer::Lexer;

/// Parser for DBML source
pub struct Parser {
    pub(crate) tree: SyntaxTree,
    pub(crate) position: usize,
    /// Whether `expr[...]` may be parsed as an array type. Disabled while
    /// parsing element names so `Table t [note: 'x']` keeps its settings.
    pub(crate) array_allowed: bool,
    /// Nesting of `( )` and `[ ]`. Line ends only terminate expressions at
    /// depth zero.
    pub(crate) bracket_depth: usize,
    pub(crate) errors: Vec<CompileError>,
}

impl Parser {
    /// Create a parser over an already lexed token stream. The stream must
    /// end with an `Eof` token.
    pub fn new(tokens: Vec<SyntaxToken>) -> Self {
        Self {
            tree: SyntaxTree::new(tokens),
            position: 0,
            array_allowed: true,
            bracket_depth: 0,
            errors: Vec::new(),
        }
    }

    /// Get the current token
    pub(crate) fn current_token(&self) -> &SyntaxToken {
        let last = self.tree.tokens.len().saturating_sub(1);
        &self.tree.tokens[self.position.min(last)]
    }

    pub(crate) fn current_id(&self) -> TokenId {
        let last = self.tree.tokens.len().saturating_sub(1);
        TokenId(self.position.min(last) as u32)
    }

    /// Peek at a token at a given offset from the current position
    pub(crate) fn peek_token(&self, offset: usize) -> &SyntaxToken {
        let last = self.tree.tokens.len().saturating_sub(1);
        &self.tree.tokens[(self.position + offset).min(last)]
    }

    pub(crate) fn previous_token(&self) -> Option<&SyntaxToken> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tree.tokens.get(i))
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.current_token().kind == SyntaxTokenKind::Eof
    }

    pub(crate) fn check(&self, kind: SyntaxTokenKind) -> bool {
        self.current_token().kind == kind
    }

    /// Advance to the next token, returning the consumed one. `Eof` is
    /// never consumed.
    pub(crate) fn advance(&mut self) -> TokenId {
        let id = self.current_id();
        if !self.at_eof() {
            self.position += 1;
        }
        id
    }

    /// Consume a token of `kind` if present, otherwise report it as missing.
    pub(crate) fn expect_closing(&mut self, kind: SyntaxTokenKind, text: &str) -> Option<TokenId> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let at = self.prior_end();
            self.errors.push(CompileError::new(
                CompileErrorCode::MissingClosingToken,
                format!("Missing closing '{}'", text),
                NodeOrToken::Token(self.current_id()),
                at,
                at,
            ));
            None
        }
    }

    /// True when a newline separates the previous token from the current
    /// one and we are not inside brackets.
    pub(crate) fn at_line_break(&self) -> bool {
        self.bracket_depth == 0 && self.previous_token().is_some_and(|t| t.ends_line())
    }

    /// True when no trivia separates the previous token from the current one.
    pub(crate) fn touches_previous(&self) -> bool {
        let current = self.current_token();
        match self.previous_token() {
            Some(prev) => {
                prev.trailing_trivia.is_empty()
                    && prev.trailing_invalid.is_empty()
                    && current.leading_trivia.is_empty()
                    && current.leading_invalid.is_empty()
            }
            None => false,
        }
    }

    /// End of the previous significant token, where dummy nodes are placed.
    pub(crate) fn prior_end(&self) -> Position {
        self.previous_token()
            .map(|t| t.end)
            .unwrap_or_else(|| self.current_token().start)
    }

    pub(crate) fn dummy(&mut self) -> NodeId {
        let at = self.prior_end();
        self.tree.alloc(SyntaxNodeKind::Dummy, at)
    }

    /// A dummy node plus a `MISSING_EXPRESSION` error.
    pub(crate) fn missing_expression(&mut self, what: &str) -> NodeId {
        let at = self.prior_end();
        self.errors.push(CompileError::new(
            CompileErrorCode::MissingExpression,
            format!("Expect {}", what),
            NodeOrToken::Token(self.current_id()),
            at,
            at,
        ));
        self.dummy()
    }

    /// Report and skip the current token.
    pub(crate) fn skip_unexpected(&mut self) {
        let token = self.current_token();
        let message = format!("Unexpected token '{}'", token.value);
        let (start, end) = (token.start, token.end);
        self.errors.push(CompileError::new(
            CompileErrorCode::UnexpectedToken,
            message,
            NodeOrToken::Token(self.current_id()),
            start,
            end,
        ));
        self.advance();
    }

    pub(crate) fn alloc(&mut self, kind: SyntaxNodeKind) -> NodeId {
        let at = self.prior_end();
        self.tree.alloc(kind, at)
    }

    /// Parse a complete program
    pub fn parse(mut self) -> Report<SyntaxTree> {
        let span = tracing::debug_span!("parse", tokens = self.tree.tokens.len());
        let _guard = span.enter();

        let mut body = Vec::new();
        while !self.at_eof() {
            if self.check(SyntaxTokenKind::Identifier) {
                body.push(self.parse_element_declaration());
            } else {
                self.skip_unexpected();
            }
        }
        let eof = self.current_id();
        let root = self.alloc(SyntaxNodeKind::Program { body, eof });
        self.tree.root = root;

        tracing::debug!(
            nodes = self.tree.nodes.len(),
            errors = self.errors.len(),
            "parse finished"
        );
        Report::new(self.tree, self.errors, Vec::new())
    }

    /// Parse `<type> [name] [as alias] [settings] (':' body | '{' body '}')`.
    /// The current token must be the type identifier.
    pub(crate) fn parse_element_declaration(&mut self) -> NodeId {
        let type_token = self.advance();

        let name = if self.can_start_name() {
            Some(self.parse_element_name())
        } else {
            None
        };

        let (as_token, alias) = if self.current_token().is_keyword("as") {
            let as_token = self.advance();
            let alias = if self.can_start_name() {
                self.parse_element_name()
            } else {
                self.missing_expression("an alias")
            };
            (Some(as_token), Some(alias))
        } else {
            (None, None)
        };

        let attribute_list = if self.check(SyntaxTokenKind::LeftBracket) {
            Some(self.parse_list_expression())
        } else {
            None
        };

        let (body_colon, body) = if self.check(SyntaxTokenKind::Colon) {
            let colon = self.advance();
            let body = if self.can_start_expression() && !self.at_line_break() {
                self.parse_line_statement()
            } else {
                self.missing_expression("an element body")
            };
            (Some(colon), Some(body))
        } else if self.check(SyntaxTokenKind::LeftBrace) {
            (None, Some(self.parse_block_expression()))
        } else {
            let token = self.tree.token(type_token);
            let (start, end) = (token.start, token.end);
            let message = format!("Expect a body for '{}'", token.value);
            self.errors.push(CompileError::new(
                CompileErrorCode::MissingBody,
                message,
                NodeOrToken::Token(type_token),
                start,
                end,
            ));
            (None, None)
        };

        self.alloc(SyntaxNodeKind::ElementDeclaration(ElementDeclaration {
            type_token,
            name,
            as_token,
            alias,
            attribute_list,
            body_colon,
            body,
        }))
    }

    fn can_start_name(&self) -> bool {
        let token = self.current_token();
        match token.kind {
            SyntaxTokenKind::Identifier => !token.is_keyword("as"),
            SyntaxTokenKind::QuotedString
            | SyntaxTokenKind::StringLiteral
            | SyntaxTokenKind::NumericLiteral
            | SyntaxTokenKind::LeftParen => true,
            _ => false,
        }
    }

    /// Names are expressions without array indexers. A tuple after the
    /// name is folded into a call even when separated by spaces.
    fn parse_element_name(&mut self) -> NodeId {
        let saved = self.array_allowed;
        self.array_allowed = false;
        let mut name = self.parse_expression();
        if self.check(SyntaxTokenKind::LeftParen) && !self.at_line_break() {
            let arguments = self.parse_tuple_expression();
            name = self.alloc(SyntaxNodeKind::CallExpression {
                callee: name,
                arguments,
            });
        }
        self.array_allowed = saved;
        name
    }

    /// Parse `{ statement* }`
    pub(crate) fn parse_block_expression(&mut self) -> NodeId {
        let open = self.advance();
        let saved_depth = std::mem::replace(&mut self.bracket_depth, 0);

        let mut body = Vec::new();
        loop {
            if self.check(SyntaxTokenKind::RightBrace) || self.at_eof() {
                break;
            }
            if self.is_element_start() {
                body.push(self.parse_element_declaration());
            } else if self.can_start_expression() || self.check(SyntaxTokenKind::Comma) {
                body.push(self.parse_line_statement());
            } else {
                self.skip_unexpected();
            }
        }
        self.bracket_depth = saved_depth;

        let close = self.expect_closing(SyntaxTokenKind::RightBrace, "}");
        self.alloc(SyntaxNodeKind::BlockExpression { open, body, close })
    }

    /// A statement inside a block is an element declaration when it starts
    /// with an identifier and a `{` or `:` occurs at bracket depth zero
    /// before the end of the line.
    fn is_element_start(&self) -> bool {
        if !self.check(SyntaxTokenKind::Identifier) {
            return false;
        }
        let mut depth: usize = 0;
        let mut i = self.position;
        while let Some(token) = self.tree.tokens.get(i) {
            match token.kind {
                SyntaxTokenKind::Eof => return false,
                SyntaxTokenKind::LeftParen | SyntaxTokenKind::LeftBracket => depth += 1,
                SyntaxTokenKind::RightParen | SyntaxTokenKind::RightBracket => {
                    depth = depth.saturating_sub(1)
                }
                SyntaxTokenKind::LeftBrace | SyntaxTokenKind::Colon if depth == 0 => return true,
                SyntaxTokenKind::RightBrace if depth == 0 => return false,
                _ => {}
            }
            if depth == 0 && token.ends_line() {
                return false;
            }
            i += 1;
        }
        false
    }
}

/// Parse DBML source into a syntax tree. Lexer and parser diagnostics are
/// merged into the returned report.
pub fn parse(input: &str) -> Report<SyntaxTree> {
    let lexed = Lexer::new(input).tokenize();
    let mut report = Parser::new(lexed.value).parse();
    let mut errors = lexed.errors;
    errors.append(&mut report.errors);
    report.errors = errors;
    report
}
