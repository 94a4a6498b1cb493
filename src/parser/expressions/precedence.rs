//! Operator precedence for DBML expressions.
//!
//! Binding power (lowest to highest):
//! 1. Assignment: `=` (right-associative)
//! 2. Logical OR: `||`
//! 3. Logical AND: `&&`
//! 4. Equality: `==`, `!=`
//! 5. Relational and relationship: `<`, `>`, `<=`, `>=`, `<>`
//! 6. Additive: `+`, `-` (`-` is also the one-to-one relationship)
//! 7. Multiplicative: `*`, `/`, `%`
//! 8. Prefix: `-`, `+`, `!`, `~`, `<`, `>`, `<>`
//! 9. Call `(...)` and array `[...]`, only when touching the previous token
//! 10. Member access: `.`

use crate::ast::{NodeId, SyntaxNodeKind};
use crate::lexer::token::SyntaxTokenKind;
use crate::parser::Parser;

const PREFIX_BP: u8 = 15;
const POSTFIX_BP: u8 = 16;

impl Parser {
    pub(crate) fn prefix_binding_power(op: &str) -> Option<u8> {
        match op {
            "-" | "+" | "!" | "<" | ">" | "<>" => Some(PREFIX_BP),
            _ => None,
        }
    }

    fn infix_binding_power(op: &str) -> Option<(u8, u8)> {
        let bp = match op {
            "=" => (2, 1),
            "||" => (3, 4),
            "&&" => (5, 6),
            "==" | "!=" => (7, 8),
            "<" | ">" | "<=" | ">=" | "<>" => (9, 10),
            "+" | "-" => (11, 12),
            "*" | "/" | "%" => (13, 14),
            "." => (17, 18),
            _ => return None,
        };
        Some(bp)
    }

    /// Precedence climbing. Stops at line ends outside brackets.
    pub(super) fn parse_expression_bp(&mut self, min_bp: u8) -> NodeId {
        let mut lhs = self.parse_prefix_expression();

        loop {
            if self.at_eof() || self.at_line_break() {
                break;
            }
            let token = self.current_token();
            match token.kind {
                SyntaxTokenKind::LeftParen if POSTFIX_BP >= min_bp && self.touches_previous() => {
                    let arguments = self.parse_tuple_expression();
                    lhs = self.alloc(SyntaxNodeKind::CallExpression {
                        callee: lhs,
                        arguments,
                    });
                }
                SyntaxTokenKind::LeftBracket
                    if self.array_allowed && POSTFIX_BP >= min_bp && self.touches_previous() =>
                {
                    let indexer = self.parse_list_expression();
                    lhs = self.alloc(SyntaxNodeKind::Array {
                        expression: lhs,
                        indexer,
                    });
                }
                SyntaxTokenKind::Op if !token.is_invalid => {
                    let Some((left_bp, right_bp)) = Self::infix_binding_power(&token.value) else {
                        break;
                    };
                    if left_bp < min_bp {
                        break;
                    }
                    let op = self.advance();
                    let right = if self.can_start_expression() && !self.at_line_break() {
                        self.parse_expression_bp(right_bp)
                    } else {
                        self.missing_expression("an expression after the operator")
                    };
                    lhs = self.alloc(SyntaxNodeKind::InfixExpression {
                        op,
                        left: lhs,
                        right,
                    });
                }
                _ => break,
            }
        }

        lhs
    }

    fn parse_prefix_expression(&mut self) -> NodeId {
        let token = self.current_token();
        let is_prefix = token.kind == SyntaxTokenKind::Tilde
            || (token.kind == SyntaxTokenKind::Op
                && !token.is_invalid
                && Self::prefix_binding_power(&token.value).is_some());

        if is_prefix {
            let op = self.advance();
            let expression = if self.can_start_expression() && !self.at_line_break() {
                self.parse_expression_bp(PREFIX_BP)
            } else {
                self.missing_expression("an operand")
            };
            self.alloc(SyntaxNodeKind::PrefixExpression { op, expression })
        } else if self.can_start_expression() {
            self.parse_primary_expression()
        } else {
            self.missing_expression("an expression")
        }
    }
}
