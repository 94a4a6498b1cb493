//! Primary expressions: literals, variables, function expressions, groups,
//! tuples and attribute lists.

use crate::ast::{NodeId, SyntaxNodeKind};
use crate::lexer::token::{SyntaxTokenKind, TokenId};
use crate::parser::Parser;

impl Parser {
    pub(super) fn parse_primary_expression(&mut self) -> NodeId {
        match self.current_token().kind {
            SyntaxTokenKind::NumericLiteral
            | SyntaxTokenKind::StringLiteral
            | SyntaxTokenKind::ColorLiteral => {
                let literal = self.advance();
                let inner = self.alloc(SyntaxNodeKind::Literal { literal });
                self.alloc(SyntaxNodeKind::PrimaryExpression { expression: inner })
            }
            SyntaxTokenKind::Identifier | SyntaxTokenKind::QuotedString => {
                let variable = self.advance();
                let inner = self.alloc(SyntaxNodeKind::Variable { variable });
                self.alloc(SyntaxNodeKind::PrimaryExpression { expression: inner })
            }
            SyntaxTokenKind::FunctionExpression => {
                let value = self.advance();
                self.alloc(SyntaxNodeKind::FunctionExpression { value })
            }
            SyntaxTokenKind::LeftParen => self.parse_group_or_tuple(),
            SyntaxTokenKind::LeftBracket => self.parse_list_expression(),
            _ => self.missing_expression("an expression"),
        }
    }

    /// `(expr)` is a group; `()`, `(a, b)` and `(a,)` are tuples.
    fn parse_group_or_tuple(&mut self) -> NodeId {
        let open = self.advance();
        self.bracket_depth += 1;

        if self.check(SyntaxTokenKind::RightParen) {
            self.bracket_depth -= 1;
            let close = Some(self.advance());
            return self.alloc(SyntaxNodeKind::TupleExpression {
                open,
                elements: Vec::new(),
                commas: Vec::new(),
                close,
            });
        }

        let first = self.parse_expression();
        if !self.check(SyntaxTokenKind::Comma) {
            self.bracket_depth -= 1;
            let close = self.expect_closing(SyntaxTokenKind::RightParen, ")");
            return self.alloc(SyntaxNodeKind::GroupExpression {
                open,
                expression: first,
                close,
            });
        }

        let (elements, commas) = self.parse_tuple_rest(vec![first]);
        self.bracket_depth -= 1;
        let close = self.expect_closing(SyntaxTokenKind::RightParen, ")");
        self.alloc(SyntaxNodeKind::TupleExpression {
            open,
            elements,
            commas,
            close,
        })
    }

    /// Call arguments, always a tuple even with a single element.
    pub(crate) fn parse_tuple_expression(&mut self) -> NodeId {
        let open = self.advance();
        self.bracket_depth += 1;

        let (elements, commas) = if self.check(SyntaxTokenKind::RightParen) {
            (Vec::new(), Vec::new())
        } else {
            let first = self.parse_expression();
            self.parse_tuple_rest(vec![first])
        };

        self.bracket_depth -= 1;
        let close = self.expect_closing(SyntaxTokenKind::RightParen, ")");
        self.alloc(SyntaxNodeKind::TupleExpression {
            open,
            elements,
            commas,
            close,
        })
    }

    fn parse_tuple_rest(&mut self, mut elements: Vec<NodeId>) -> (Vec<NodeId>, Vec<TokenId>) {
        let mut commas = Vec::new();
        while self.check(SyntaxTokenKind::Comma) {
            commas.push(self.advance());
            if self.check(SyntaxTokenKind::RightParen) {
                break;
            }
            elements.push(self.parse_expression());
        }
        while !self.check(SyntaxTokenKind::RightParen) && self.can_skip_in_brackets() {
            self.skip_unexpected();
        }
        (elements, commas)
    }

    /// Inside brackets, stray tokens are skipped until a closing or block
    /// token shows up.
    fn can_skip_in_brackets(&self) -> bool {
        !matches!(
            self.current_token().kind,
            SyntaxTokenKind::Eof
                | SyntaxTokenKind::LeftBrace
                | SyntaxTokenKind::RightBrace
                | SyntaxTokenKind::RightParen
                | SyntaxTokenKind::RightBracket
        )
    }

    /// `[attr, attr: value, ...]`
    pub(crate) fn parse_list_expression(&mut self) -> NodeId {
        let open = self.advance();
        self.bracket_depth += 1;

        let mut elements = Vec::new();
        let mut commas = Vec::new();
        loop {
            if self.check(SyntaxTokenKind::RightBracket) || !self.can_skip_in_brackets() {
                break;
            }
            if self.check(SyntaxTokenKind::Comma) {
                commas.push(self.advance());
            } else if self.can_start_expression() {
                elements.push(self.parse_attribute());
            } else {
                self.skip_unexpected();
            }
        }

        self.bracket_depth -= 1;
        let close = self.expect_closing(SyntaxTokenKind::RightBracket, "]");
        self.alloc(SyntaxNodeKind::ListExpression {
            open,
            elements,
            commas,
            close,
        })
    }

    /// `name` or `name: value`. Names made of identifiers become an
    /// identifier stream (`not null`, `primary key`); so do values of two
    /// or more identifiers (`set null`, `no action`).
    fn parse_attribute(&mut self) -> NodeId {
        let name = if self.check(SyntaxTokenKind::Identifier) {
            self.parse_identifier_stream()
        } else {
            self.parse_expression()
        };

        let (colon, value) = if self.check(SyntaxTokenKind::Colon) {
            let colon = self.advance();
            let value = if self.check(SyntaxTokenKind::Identifier)
                && self.peek_token(1).kind == SyntaxTokenKind::Identifier
            {
                self.parse_identifier_stream()
            } else if self.can_start_expression() {
                self.parse_expression()
            } else {
                self.missing_expression("an attribute value")
            };
            (Some(colon), Some(value))
        } else {
            (None, None)
        };

        self.alloc(SyntaxNodeKind::Attribute { name, colon, value })
    }

    fn parse_identifier_stream(&mut self) -> NodeId {
        let mut identifiers = Vec::new();
        while self.check(SyntaxTokenKind::Identifier) {
            identifiers.push(self.advance());
        }
        self.alloc(SyntaxNodeKind::IdentifierStream { identifiers })
    }
}
