//! Syntax tree for DBML.
//!
//! Nodes live in an arena owned by `SyntaxTree` and refer to each other and
//! to tokens by index. Every node stores its tight span and its
//! trivia-inclusive span, computed once from its children when allocated.
//! The analyzer later fills in `symbol` (entity the node declares) and
//! `referee` (entity the node refers to).

use crate::analyzer::symbol::SymbolId;
use crate::lexer::token::{Position, SyntaxToken, SyntaxTokenKind, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Header and body of `<type> [name] [as alias] [settings] (: body | { body })`
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDeclaration {
    pub type_token: TokenId,
    pub name: Option<NodeId>,
    pub as_token: Option<TokenId>,
    pub alias: Option<NodeId>,
    /// `ListExpression` of attributes
    pub attribute_list: Option<NodeId>,
    pub body_colon: Option<TokenId>,
    /// `BlockExpression` for `{ ... }` bodies, any expression or
    /// `FunctionApplication` for `: ...` bodies
    pub body: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNodeKind {
    Program {
        body: Vec<NodeId>,
        eof: TokenId,
    },
    ElementDeclaration(ElementDeclaration),
    /// `name[: value]` inside a `[...]` list
    Attribute {
        name: NodeId,
        colon: Option<TokenId>,
        value: Option<NodeId>,
    },
    /// Space separated identifiers such as `not null` or `set default`
    IdentifierStream {
        identifiers: Vec<TokenId>,
    },
    Literal {
        literal: TokenId,
    },
    Variable {
        variable: TokenId,
    },
    PrefixExpression {
        op: TokenId,
        expression: NodeId,
    },
    InfixExpression {
        op: TokenId,
        left: NodeId,
        right: NodeId,
    },
    CallExpression {
        callee: NodeId,
        /// Always a `TupleExpression`
        arguments: NodeId,
    },
    /// Wraps a `Literal` or a `Variable`
    PrimaryExpression {
        expression: NodeId,
    },
    GroupExpression {
        open: TokenId,
        expression: NodeId,
        close: Option<TokenId>,
    },
    FunctionExpression {
        value: TokenId,
    },
    /// `callee arg1 arg2 ...` on a single line
    FunctionApplication {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    BlockExpression {
        open: TokenId,
        body: Vec<NodeId>,
        close: Option<TokenId>,
    },
    ListExpression {
        open: TokenId,
        elements: Vec<NodeId>,
        commas: Vec<TokenId>,
        close: Option<TokenId>,
    },
    TupleExpression {
        open: TokenId,
        elements: Vec<NodeId>,
        commas: Vec<TokenId>,
        close: Option<TokenId>,
    },
    /// Bare comma separated values, used by record rows
    CommaExpression {
        elements: Vec<NodeId>,
        commas: Vec<TokenId>,
    },
    /// `expression[...]`, e.g. `int[]`
    Array {
        expression: NodeId,
        indexer: NodeId,
    },
    /// Zero-width placeholder for something the parser expected but did not find
    Dummy,
}

/// A child of a node in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    Token(TokenId),
    Node(NodeId),
}

impl SyntaxNodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            SyntaxNodeKind::Program { .. } => "Program",
            SyntaxNodeKind::ElementDeclaration(_) => "ElementDeclaration",
            SyntaxNodeKind::Attribute { .. } => "Attribute",
            SyntaxNodeKind::IdentifierStream { .. } => "IdentifierStream",
            SyntaxNodeKind::Literal { .. } => "Literal",
            SyntaxNodeKind::Variable { .. } => "Variable",
            SyntaxNodeKind::PrefixExpression { .. } => "PrefixExpression",
            SyntaxNodeKind::InfixExpression { .. } => "InfixExpression",
            SyntaxNodeKind::CallExpression { .. } => "CallExpression",
            SyntaxNodeKind::PrimaryExpression { .. } => "PrimaryExpression",
            SyntaxNodeKind::GroupExpression { .. } => "GroupExpression",
            SyntaxNodeKind::FunctionExpression { .. } => "FunctionExpression",
            SyntaxNodeKind::FunctionApplication { .. } => "FunctionApplication",
            SyntaxNodeKind::BlockExpression { .. } => "BlockExpression",
            SyntaxNodeKind::ListExpression { .. } => "ListExpression",
            SyntaxNodeKind::TupleExpression { .. } => "TupleExpression",
            SyntaxNodeKind::CommaExpression { .. } => "CommaExpression",
            SyntaxNodeKind::Array { .. } => "Array",
            SyntaxNodeKind::Dummy => "Dummy",
        }
    }

    /// Children in source order.
    pub fn children(&self) -> Vec<Child> {
        use Child::{Node, Token};

        fn opt_token(out: &mut Vec<Child>, token: Option<TokenId>) {
            if let Some(t) = token {
                out.push(Child::Token(t));
            }
        }
        fn opt_node(out: &mut Vec<Child>, node: Option<NodeId>) {
            if let Some(n) = node {
                out.push(Child::Node(n));
            }
        }
        fn interleave(
            out: &mut Vec<Child>,
            open: TokenId,
            elements: &[NodeId],
            commas: &[TokenId],
            close: Option<TokenId>,
        ) {
            out.push(Child::Token(open));
            interleave_bare(out, elements, commas);
            opt_token(out, close);
        }
        fn interleave_bare(out: &mut Vec<Child>, elements: &[NodeId], commas: &[TokenId]) {
            for i in 0..elements.len().max(commas.len()) {
                if let Some(n) = elements.get(i) {
                    out.push(Child::Node(*n));
                }
                if let Some(t) = commas.get(i) {
                    out.push(Child::Token(*t));
                }
            }
        }

        let mut out = Vec::new();
        match self {
            SyntaxNodeKind::Program { body, eof } => {
                out.extend(body.iter().map(|n| Node(*n)));
                out.push(Token(*eof));
            }
            SyntaxNodeKind::ElementDeclaration(decl) => {
                out.push(Token(decl.type_token));
                opt_node(&mut out, decl.name);
                opt_token(&mut out, decl.as_token);
                opt_node(&mut out, decl.alias);
                opt_node(&mut out, decl.attribute_list);
                opt_token(&mut out, decl.body_colon);
                opt_node(&mut out, decl.body);
            }
            SyntaxNodeKind::Attribute { name, colon, value } => {
                out.push(Node(*name));
                opt_token(&mut out, *colon);
                opt_node(&mut out, *value);
            }
            SyntaxNodeKind::IdentifierStream { identifiers } => {
                out.extend(identifiers.iter().map(|t| Token(*t)));
            }
            SyntaxNodeKind::Literal { literal } => out.push(Token(*literal)),
            SyntaxNodeKind::Variable { variable } => out.push(Token(*variable)),
            SyntaxNodeKind::PrefixExpression { op, expression } => {
                out.push(Token(*op));
                out.push(Node(*expression));
            }
            SyntaxNodeKind::InfixExpression { op, left, right } => {
                out.push(Node(*left));
                out.push(Token(*op));
                out.push(Node(*right));
            }
            SyntaxNodeKind::CallExpression { callee, arguments } => {
                out.push(Node(*callee));
                out.push(Node(*arguments));
            }
            SyntaxNodeKind::PrimaryExpression { expression } => out.push(Node(*expression)),
            SyntaxNodeKind::GroupExpression {
                open,
                expression,
                close,
            } => {
                out.push(Token(*open));
                out.push(Node(*expression));
                opt_token(&mut out, *close);
            }
            SyntaxNodeKind::FunctionExpression { value } => out.push(Token(*value)),
            SyntaxNodeKind::FunctionApplication { callee, args } => {
                out.push(Node(*callee));
                out.extend(args.iter().map(|n| Node(*n)));
            }
            SyntaxNodeKind::BlockExpression { open, body, close } => {
                out.push(Token(*open));
                out.extend(body.iter().map(|n| Node(*n)));
                opt_token(&mut out, *close);
            }
            SyntaxNodeKind::ListExpression {
                open,
                elements,
                commas,
                close,
            }
            | SyntaxNodeKind::TupleExpression {
                open,
                elements,
                commas,
                close,
            } => interleave(&mut out, *open, elements, commas, *close),
            SyntaxNodeKind::CommaExpression { elements, commas } => {
                interleave_bare(&mut out, elements, commas)
            }
            SyntaxNodeKind::Array {
                expression,
                indexer,
            } => {
                out.push(Node(*expression));
                out.push(Node(*indexer));
            }
            SyntaxNodeKind::Dummy => {}
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub id: NodeId,
    pub kind: SyntaxNodeKind,
    pub start: Position,
    pub end: Position,
    pub full_start: Position,
    pub full_end: Position,
    pub parent: Option<NodeId>,
    /// Entity this node declares
    pub symbol: Option<SymbolId>,
    /// Entity this node references, set by the binder
    pub referee: Option<SymbolId>,
}

/// Element kinds recognised from the declaration's type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Table,
    TablePartial,
    Enum,
    Ref,
    Note,
    Project,
    Indexes,
    Checks,
    TableGroup,
    Records,
    Policy,
    /// Any other `key: value` element, only meaningful inside a Project
    Custom,
}

impl ElementKind {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_lowercase().as_str() {
            "table" => ElementKind::Table,
            "tablepartial" => ElementKind::TablePartial,
            "enum" => ElementKind::Enum,
            "ref" => ElementKind::Ref,
            "note" => ElementKind::Note,
            "project" => ElementKind::Project,
            "indexes" => ElementKind::Indexes,
            "checks" => ElementKind::Checks,
            "tablegroup" => ElementKind::TableGroup,
            "records" => ElementKind::Records,
            "policy" => ElementKind::Policy,
            _ => ElementKind::Custom,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ElementKind::Table => "Table",
            ElementKind::TablePartial => "TablePartial",
            ElementKind::Enum => "Enum",
            ElementKind::Ref => "Ref",
            ElementKind::Note => "Note",
            ElementKind::Project => "Project",
            ElementKind::Indexes => "Indexes",
            ElementKind::Checks => "Checks",
            ElementKind::TableGroup => "TableGroup",
            ElementKind::Records => "Records",
            ElementKind::Policy => "Policy",
            ElementKind::Custom => "Custom element",
        }
    }

    /// The display name behind its indefinite article: "A Table", "An Enum".
    pub fn with_article(self) -> String {
        let name = self.display_name();
        let article = if name.starts_with(['A', 'E', 'I', 'O', 'U']) {
            "An"
        } else {
            "A"
        };
        format!("{} {}", article, name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub tokens: Vec<SyntaxToken>,
    pub nodes: Vec<SyntaxNode>,
    pub root: NodeId,
}

impl SyntaxTree {
    pub fn new(tokens: Vec<SyntaxToken>) -> Self {
        Self {
            tokens,
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SyntaxNode {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &SyntaxNodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn token(&self, id: TokenId) -> &SyntaxToken {
        &self.tokens[id.index()]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Allocate a node, computing its spans from its children and linking
    /// the children back to it. `dummy_at` positions nodes that have no
    /// children at all.
    pub fn alloc(&mut self, kind: SyntaxNodeKind, dummy_at: Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let children = kind.children();

        let mut span: Option<(Position, Position, Position, Position)> = None;
        for child in &children {
            let (start, end, full_start, full_end) = match child {
                Child::Token(t) => {
                    let token = self.token(*t);
                    (token.start, token.end, token.full_start(), token.full_end())
                }
                Child::Node(n) => {
                    let node = self.node(*n);
                    (node.start, node.end, node.full_start, node.full_end)
                }
            };
            span = Some(match span {
                None => (start, end, full_start, full_end),
                Some((s, e, fs, fe)) => (
                    s.min(start),
                    e.max(end),
                    fs.min(full_start),
                    fe.max(full_end),
                ),
            });
        }
        let (start, end, full_start, full_end) =
            span.unwrap_or((dummy_at, dummy_at, dummy_at, dummy_at));

        for child in &children {
            if let Child::Node(n) = child {
                self.nodes[n.index()].parent = Some(id);
            }
        }

        self.nodes.push(SyntaxNode {
            id,
            kind,
            start,
            end,
            full_start,
            full_end,
            parent: None,
            symbol: None,
            referee: None,
        });
        id
    }

    pub fn is_dummy(&self, id: NodeId) -> bool {
        matches!(self.kind(id), SyntaxNodeKind::Dummy)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementDeclaration> {
        match self.kind(id) {
            SyntaxNodeKind::ElementDeclaration(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn element_kind(&self, id: NodeId) -> Option<ElementKind> {
        self.element(id)
            .map(|decl| ElementKind::from_keyword(&self.token(decl.type_token).value))
    }

    /// The element declaration that syntactically contains `id`, if any.
    pub fn enclosing_element(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.element(node).is_some() {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Statements of an element's block body, or an empty slice for colon
    /// bodies.
    pub fn block_body(&self, element: NodeId) -> &[NodeId] {
        let Some(body) = self.element(element).and_then(|d| d.body) else {
            return &[];
        };
        match self.kind(body) {
            SyntaxNodeKind::BlockExpression { body, .. } => body,
            _ => &[],
        }
    }

    /// Callee and arguments of a statement. A bare expression is a
    /// statement with no arguments.
    pub fn statement_parts(&self, id: NodeId) -> (NodeId, &[NodeId]) {
        match self.kind(id) {
            SyntaxNodeKind::FunctionApplication { callee, args } => (*callee, args),
            _ => (id, &[]),
        }
    }

    /// Values of a records row: the elements of a comma expression, or the
    /// single expression itself.
    pub fn row_values(&self, id: NodeId) -> Vec<NodeId> {
        match self.kind(id) {
            SyntaxNodeKind::CommaExpression { elements, .. } => elements.clone(),
            _ => vec![id],
        }
    }

    /// Elements of a tuple, or the single element of a group.
    pub fn tuple_elements(&self, id: NodeId) -> Option<Vec<NodeId>> {
        match self.kind(id) {
            SyntaxNodeKind::TupleExpression { elements, .. } => Some(elements.clone()),
            SyntaxNodeKind::GroupExpression { expression, .. } => Some(vec![*expression]),
            _ => None,
        }
    }

    /// Elements of the `[...]` attribute list of a declaration.
    pub fn attributes_of(&self, list: Option<NodeId>) -> &[NodeId] {
        match list.map(|l| self.kind(l)) {
            Some(SyntaxNodeKind::ListExpression { elements, .. }) => elements,
            _ => &[],
        }
    }

    /// Text of a `PrimaryExpression(Variable)` or bare `Variable` node.
    pub fn variable_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            SyntaxNodeKind::PrimaryExpression { expression } => self.variable_name(*expression),
            SyntaxNodeKind::Variable { variable } => Some(self.token(*variable).value.as_str()),
            _ => None,
        }
    }

    /// The literal token wrapped by a `PrimaryExpression(Literal)`.
    pub fn literal_token(&self, id: NodeId) -> Option<&SyntaxToken> {
        match self.kind(id) {
            SyntaxNodeKind::PrimaryExpression { expression } => self.literal_token(*expression),
            SyntaxNodeKind::Literal { literal } => Some(self.token(*literal)),
            _ => None,
        }
    }

    /// Value of a single-quoted string literal.
    pub fn string_literal(&self, id: NodeId) -> Option<&str> {
        self.literal_token(id)
            .filter(|t| t.kind == SyntaxTokenKind::StringLiteral)
            .map(|t| t.value.as_str())
    }

    pub fn color_literal(&self, id: NodeId) -> Option<&str> {
        self.literal_token(id)
            .filter(|t| t.kind == SyntaxTokenKind::ColorLiteral)
            .map(|t| t.value.as_str())
    }

    pub fn function_expression(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            SyntaxNodeKind::FunctionExpression { value } => Some(self.token(*value).value.as_str()),
            _ => None,
        }
    }

    /// Flatten a `a.b.c` member access chain into its segment nodes.
    /// Returns `None` when any part is not a member access or a segment.
    pub fn member_access_segments(&self, id: NodeId) -> Option<Vec<NodeId>> {
        match self.kind(id) {
            SyntaxNodeKind::InfixExpression { op, left, right } if self.token(*op).is_op(".") => {
                let mut segments = self.member_access_segments(*left)?;
                segments.extend(self.member_access_segments(*right)?);
                Some(segments)
            }
            SyntaxNodeKind::PrimaryExpression { .. }
            | SyntaxNodeKind::TupleExpression { .. }
            | SyntaxNodeKind::GroupExpression { .. } => Some(vec![id]),
            _ => None,
        }
    }

    /// Names of a dotted variable chain such as `auth.users`. Every segment
    /// must be a plain variable.
    pub fn complex_variable_names(&self, id: NodeId) -> Option<Vec<String>> {
        self.member_access_segments(id)?
            .into_iter()
            .map(|seg| self.variable_name(seg).map(str::to_string))
            .collect()
    }

    /// Space-joined names of an `IdentifierStream`, lowercased.
    pub fn identifier_stream_text(&self, id: NodeId) -> Option<String> {
        match self.kind(id) {
            SyntaxNodeKind::IdentifierStream { identifiers } => Some(
                identifiers
                    .iter()
                    .map(|t| self.token(*t).value.to_ascii_lowercase())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        }
    }

    /// Source-ish text of a node, rebuilt from its significant tokens.
    pub fn node_text(&self, id: NodeId, source: &str) -> String {
        let node = self.node(id);
        source
            .get(node.start.offset..node.end.offset)
            .unwrap_or_default()
            .to_string()
    }

    /// The innermost node whose tight span contains `offset`.
    pub fn innermost_node_at(&self, offset: usize) -> Option<NodeId> {
        let mut current = self.root;
        let root = self.node(current);
        if offset < root.full_start.offset || offset > root.full_end.offset {
            return None;
        }
        'descend: loop {
            for child in self.kind(current).children() {
                if let Child::Node(n) = child {
                    let node = self.node(n);
                    if !self.is_dummy(n) && node.start.offset <= offset && offset <= node.end.offset
                    {
                        current = n;
                        continue 'descend;
                    }
                }
            }
            return Some(current);
        }
    }

    /// Chain of element declarations containing `offset`, outermost first.
    pub fn element_stack_at(&self, offset: usize) -> Vec<NodeId> {
        let mut stack = Vec::new();
        let mut current = self.innermost_node_at(offset);
        while let Some(node) = current {
            if self.element(node).is_some() {
                stack.push(node);
            }
            current = self.parent(node);
        }
        stack.reverse();
        stack
    }

    /// Index of the significant token whose full span contains `offset`.
    pub fn token_at(&self, offset: usize) -> Option<TokenId> {
        let idx = self
            .tokens
            .partition_point(|t| t.full_end().offset <= offset)
            .min(self.tokens.len().saturating_sub(1));
        let token = self.tokens.get(idx)?;
        (token.full_start().offset <= offset).then_some(TokenId(idx as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_element_kind_keywords_case_insensitive() {
        assert_eq!(ElementKind::from_keyword("Table"), ElementKind::Table);
        assert_eq!(ElementKind::from_keyword("table"), ElementKind::Table);
        assert_eq!(ElementKind::from_keyword("TableGroup"), ElementKind::TableGroup);
        assert_eq!(ElementKind::from_keyword("records"), ElementKind::Records);
        assert_eq!(ElementKind::from_keyword("database_type"), ElementKind::Custom);
    }

    #[test]
    fn test_child_spans_are_contained() {
        let tree = parse("Table auth.users as U [note: 'x'] {\n  id int [pk]\n  name varchar(255)\n}\n").value;
        for node in &tree.nodes {
            if let Some(parent) = node.parent {
                let p = tree.node(parent);
                assert!(p.start <= node.start, "{:?} starts before parent", node.kind);
                assert!(node.end <= p.end, "{:?} ends after parent", node.kind);
                assert!(p.full_start <= node.full_start);
                assert!(node.full_end <= p.full_end);
            }
            assert!(node.full_start <= node.start && node.end <= node.full_end);
        }
    }

    #[test]
    fn test_complex_variable_names() {
        let tree = parse("Table auth.users {\n  id int\n}").value;
        let table = match tree.kind(tree.root) {
            SyntaxNodeKind::Program { body, .. } => body[0],
            other => panic!("unexpected root {:?}", other),
        };
        let name = tree.element(table).unwrap().name.unwrap();
        assert_eq!(
            tree.complex_variable_names(name),
            Some(vec!["auth".to_string(), "users".to_string()])
        );
    }

    #[test]
    fn test_element_stack_at_offset() {
        let source = "Table users {\n  id int\n  indexes {\n    id\n  }\n}";
        let tree = parse(source).value;
        let offset = source.find("    id").unwrap() + 4;
        let stack = tree.element_stack_at(offset);
        assert_eq!(stack.len(), 2);
        assert_eq!(tree.element_kind(stack[0]), Some(ElementKind::Table));
        assert_eq!(tree.element_kind(stack[1]), Some(ElementKind::Indexes));
    }
}
