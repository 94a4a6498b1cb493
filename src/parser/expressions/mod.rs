//! Expression parsing methods for DBML.
//!
//! - `precedence`: binding powers and the Pratt loop
//! - `primary`: literals, variables, groups, tuples and attribute lists

mod precedence;
mod primary;

use crate::ast::{NodeId, SyntaxNodeKind};
use crate::lexer::token::SyntaxTokenKind;
use crate::parser::Parser;

impl Parser {
    /// Entry point for expression parsing
    pub(crate) fn parse_expression(&mut self) -> NodeId {
        self.parse_expression_bp(0)
    }

    pub(crate) fn can_start_expression(&self) -> bool {
        let token = self.current_token();
        if token.is_invalid {
            return false;
        }
        match token.kind {
            SyntaxTokenKind::NumericLiteral
            | SyntaxTokenKind::StringLiteral
            | SyntaxTokenKind::QuotedString
            | SyntaxTokenKind::ColorLiteral
            | SyntaxTokenKind::FunctionExpression
            | SyntaxTokenKind::Identifier
            | SyntaxTokenKind::LeftParen
            | SyntaxTokenKind::LeftBracket
            | SyntaxTokenKind::Tilde => true,
            SyntaxTokenKind::Op => Self::prefix_binding_power(&token.value).is_some(),
            _ => false,
        }
    }

    /// Parse one line-level statement: an expression (or a comma
    /// expression) followed by any further expressions on the same line,
    /// which make it a function application.
    pub(crate) fn parse_line_statement(&mut self) -> NodeId {
        let callee = self.parse_comma_or_expression();

        let mut args = Vec::new();
        while !self.at_eof() && !self.at_line_break() && self.can_start_expression() {
            args.push(self.parse_expression());
        }

        if args.is_empty() {
            callee
        } else {
            self.alloc(SyntaxNodeKind::FunctionApplication { callee, args })
        }
    }

    /// `a, b, , c` on one line. Empty slots become dummy nodes without
    /// diagnostics; they stand for unquoted empty values. A row may open
    /// with a comma (`, 2`), in which case that comma belongs to this line
    /// even though the previous token ended the last one.
    fn parse_comma_or_expression(&mut self) -> NodeId {
        let leading = self.check(SyntaxTokenKind::Comma);
        let first = if leading {
            let at = self.current_token().start;
            self.tree.alloc(SyntaxNodeKind::Dummy, at)
        } else {
            self.parse_expression()
        };
        if !self.check(SyntaxTokenKind::Comma) || (!leading && self.at_line_break()) {
            return first;
        }

        let mut elements = vec![first];
        let mut commas = Vec::new();
        while self.check(SyntaxTokenKind::Comma) {
            let opens_row = leading && commas.is_empty();
            if !opens_row && self.at_line_break() {
                break;
            }
            commas.push(self.advance());
            let slot_empty = self.at_line_break()
                || self.check(SyntaxTokenKind::Comma)
                || !self.can_start_expression();
            if slot_empty {
                elements.push(self.dummy());
            } else {
                elements.push(self.parse_expression());
            }
        }

        self.alloc(SyntaxNodeKind::CommaExpression { elements, commas })
    }
}
