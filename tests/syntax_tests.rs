//! Lexer and parser tests through the public API
//!
//! Covers:
//! - Token full spans tiling the source exactly
//! - Node spans nested inside their parents
//! - Error recovery keeping the tree usable

mod common;

use dbml_parse::ast::{ElementKind, SyntaxNodeKind};
use dbml_parse::lexer::token::SyntaxTokenKind;
use dbml_parse::lexer::tokenize;
use dbml_parse::parser::parse;

const DOCUMENT: &str = r#"// users and their posts
Table users as U [headercolor: #3498db] {
  id int [pk, increment] // surrogate key
  "full name" varchar(255) [not null, note: '''
    shown on the profile
  ''']
}

/* relation */
Ref user_posts: posts.user_id > U.id [delete: cascade]

Table posts {
  id int
  user_id int
  body text [default: `now()`]
}
records posts(id, user_id, body) {
  1, 1, 'hello'
  2, null, ''
}
"#;

#[test]
fn test_full_spans_reconstruct_source() {
    common::init_tracing();
    for source in [DOCUMENT, "", "\n\n", "Table a { id int $ }", "'unterminated\nTable"] {
        let tokens = tokenize(source).value;
        let mut rebuilt = String::new();
        for token in &tokens {
            assert!(token.full_start() <= token.start);
            assert!(token.start <= token.end);
            assert!(token.end <= token.full_end());
            rebuilt.push_str(&source[token.full_start().offset..token.full_end().offset]);
        }
        assert_eq!(rebuilt, source);
        assert_eq!(tokens.last().map(|t| t.kind), Some(SyntaxTokenKind::Eof));
    }
}

#[test]
fn test_node_spans_nest() {
    let report = parse(DOCUMENT);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let tree = report.value;
    for node in &tree.nodes {
        assert!(node.full_start <= node.start && node.end <= node.full_end);
        if let Some(parent) = node.parent {
            let parent = tree.node(parent);
            assert!(parent.start <= node.start, "{:?}", node.kind);
            assert!(node.end <= parent.end, "{:?}", node.kind);
        }
    }
}

#[test]
fn test_top_level_elements() {
    let tree = parse(DOCUMENT).value;
    let SyntaxNodeKind::Program { body, .. } = tree.kind(tree.root) else {
        panic!("root is not a program");
    };
    let kinds: Vec<ElementKind> = body.iter().filter_map(|e| tree.element_kind(*e)).collect();
    assert_eq!(
        kinds,
        vec![ElementKind::Table, ElementKind::Ref, ElementKind::Table, ElementKind::Records]
    );
}

#[test]
fn test_recovery_keeps_later_elements() {
    let report = parse("Table a {\n  id int [pk\n}\nTable b {\n  id int\n}\n");
    assert!(!report.errors.is_empty());
    let tree = report.value;
    let names: Vec<String> = tree
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, SyntaxNodeKind::ElementDeclaration(_)))
        .filter_map(|n| tree.element(n.id).and_then(|d| d.name))
        .filter_map(|name| tree.variable_name(name).map(str::to_string))
        .collect();
    assert!(names.contains(&"b".to_string()), "{:?}", names);
}
