//! Helpers shared by the validator, binder and interpreter for reading
//! settings lists and value expressions.

use crate::ast::{NodeId, SyntaxNodeKind, SyntaxTree};
use crate::lexer::token::SyntaxTokenKind;

/// One `[name: value]` entry of a settings list.
#[derive(Debug, Clone)]
pub(crate) struct Setting {
    /// Lowercased, space-joined name; `None` when the name is not made of
    /// identifiers
    pub name: Option<String>,
    pub attribute: NodeId,
    pub value: Option<NodeId>,
}

pub(crate) fn settings_of(tree: &SyntaxTree, list: Option<NodeId>) -> Vec<Setting> {
    tree.attributes_of(list)
        .iter()
        .filter_map(|attribute| match tree.kind(*attribute) {
            SyntaxNodeKind::Attribute { name, value, .. } => Some(Setting {
                name: tree
                    .identifier_stream_text(*name)
                    .or_else(|| tree.variable_name(*name).map(|n| n.to_ascii_lowercase())),
                attribute: *attribute,
                value: *value,
            }),
            _ => None,
        })
        .collect()
}

/// The first setting called `name`, and its value.
pub(crate) fn find_setting<'a>(settings: &'a [Setting], name: &str) -> Option<&'a Setting> {
    settings.iter().find(|s| s.name.as_deref() == Some(name))
}

pub(crate) fn has_setting(settings: &[Setting], names: &[&str]) -> bool {
    settings
        .iter()
        .any(|s| s.name.as_deref().is_some_and(|n| names.contains(&n)))
}

/// Numeric text of a number literal, optionally signed: `1`, `-2.5`, `+3e2`.
pub(crate) fn signed_number(tree: &SyntaxTree, id: NodeId) -> Option<String> {
    match tree.kind(id) {
        SyntaxNodeKind::PrefixExpression { op, expression } => {
            let op = tree.token(*op);
            let sign = if op.is_op("-") {
                "-"
            } else if op.is_op("+") {
                ""
            } else {
                return None;
            };
            let inner = signed_number(tree, *expression)?;
            match (sign, inner.strip_prefix('-')) {
                ("-", Some(positive)) => Some(positive.to_string()),
                ("-", None) => Some(format!("-{}", inner)),
                _ => Some(inner),
            }
        }
        _ => tree
            .literal_token(id)
            .filter(|t| t.kind == SyntaxTokenKind::NumericLiteral)
            .map(|t| t.value.clone()),
    }
}

/// `true`, `false` or `null` written as bare identifiers.
pub(crate) fn keyword_value(tree: &SyntaxTree, id: NodeId) -> Option<&'static str> {
    let node = match tree.kind(id) {
        SyntaxNodeKind::PrimaryExpression { expression } => *expression,
        _ => return None,
    };
    let SyntaxNodeKind::Variable { variable } = tree.kind(node) else {
        return None;
    };
    let token = tree.token(*variable);
    if token.kind != SyntaxTokenKind::Identifier {
        return None;
    }
    match token.value.to_ascii_lowercase().as_str() {
        "true" => Some("true"),
        "false" => Some("false"),
        "null" => Some("null"),
        _ => None,
    }
}

/// Relationship operator of an infix or prefix ref expression.
pub(crate) fn relationship_op(tree: &SyntaxTree, op: crate::lexer::token::TokenId) -> Option<&str> {
    let token = tree.token(op);
    ["<", ">", "-", "<>"]
        .into_iter()
        .find(|candidate| token.is_op(candidate))
}

/// A `<>` ref is many-to-many, `<` one-to-many, `>` many-to-one, `-`
/// one-to-one. Returns the relations of the left and right endpoints.
pub(crate) fn relation_pair(op: &str) -> (&'static str, &'static str) {
    match op {
        "<" => ("1", "*"),
        ">" => ("*", "1"),
        "<>" => ("*", "*"),
        _ => ("1", "1"),
    }
}

/// Whether a node is a dotted name ending in a column tuple, such as
/// `t.(a, b)`, or a plain dotted name.
pub(crate) fn endpoint_parts(tree: &SyntaxTree, id: NodeId) -> Option<(Vec<String>, Vec<NodeId>)> {
    let segments = tree.member_access_segments(id)?;
    if segments.len() < 2 {
        return None;
    }
    let (last, path) = segments.split_last()?;
    let path = path
        .iter()
        .map(|seg| tree.variable_name(*seg).map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    let columns = match tree.tuple_elements(*last) {
        Some(elements) => elements,
        None => vec![*last],
    };
    if columns.is_empty() || columns.iter().any(|c| tree.variable_name(*c).is_none()) {
        return None;
    }
    Some((path, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn column_settings(source: &str) -> (SyntaxTree, Vec<Setting>) {
        let tree = parse(source).value;
        let table = match tree.kind(tree.root) {
            SyntaxNodeKind::Program { body, .. } => body[0],
            other => panic!("unexpected {:?}", other),
        };
        let column = tree.block_body(table)[0];
        let (_, args) = tree.statement_parts(column);
        let list = args.last().copied();
        let settings = settings_of(&tree, list);
        (tree, settings)
    }

    #[test]
    fn test_settings_of_names() {
        let (_, settings) =
            column_settings("Table t {\n  id int [PK, Not Null, default: -1, note: 'x']\n}");
        let names: Vec<Option<String>> = settings.iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                Some("pk".to_string()),
                Some("not null".to_string()),
                Some("default".to_string()),
                Some("note".to_string())
            ]
        );
        assert!(has_setting(&settings, &["pk", "primary key"]));
    }

    #[test]
    fn test_signed_number() {
        let (tree, settings) = column_settings("Table t {\n  a int [default: -1.5]\n}");
        let value = find_setting(&settings, "default").unwrap().value.unwrap();
        assert_eq!(signed_number(&tree, value), Some("-1.5".to_string()));

        let (tree, settings) = column_settings("Table t {\n  a int [default: - -2]\n}");
        let value = find_setting(&settings, "default").unwrap().value.unwrap();
        assert_eq!(signed_number(&tree, value), Some("2".to_string()));
    }

    #[test]
    fn test_keyword_value() {
        let (tree, settings) = column_settings("Table t {\n  a bool [default: TRUE]\n}");
        let value = find_setting(&settings, "default").unwrap().value.unwrap();
        assert_eq!(keyword_value(&tree, value), Some("true"));
    }

    #[test]
    fn test_endpoint_parts() {
        let (tree, settings) = column_settings("Table t {\n  a int [ref: > s.users.id]\n}");
        let value = find_setting(&settings, "ref").unwrap().value.unwrap();
        let SyntaxNodeKind::PrefixExpression { op, expression } = tree.kind(value).clone() else {
            panic!("expected prefix ref");
        };
        assert_eq!(relationship_op(&tree, op), Some(">"));
        let (path, columns) = endpoint_parts(&tree, expression).unwrap();
        assert_eq!(path, vec!["s".to_string(), "users".to_string()]);
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn test_relation_pair() {
        assert_eq!(relation_pair("<"), ("1", "*"));
        assert_eq!(relation_pair(">"), ("*", "1"));
        assert_eq!(relation_pair("-"), ("1", "1"));
        assert_eq!(relation_pair("<>"), ("*", "*"));
    }
}
