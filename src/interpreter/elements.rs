//! Enums, table groups, sticky notes and the project.

use indexmap::IndexMap;

use super::types::*;
use super::{split_qualified, Interpreter};
use crate::analyzer::utils::{find_setting, settings_of};
use crate::analyzer::validator::note_content;
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};

impl<'a> Interpreter<'a> {
    pub(super) fn interpret_enum(&mut self, element: NodeId) {
        let tree = self.tree;
        let Some(names) = tree
            .element(element)
            .and_then(|d| d.name)
            .and_then(|n| tree.complex_variable_names(n))
        else {
            return;
        };
        let (schema_name, name) = split_qualified(names);

        let values = tree
            .block_body(element)
            .iter()
            .filter(|s| tree.element(**s).is_none())
            .filter_map(|statement| {
                let (callee, args) = tree.statement_parts(*statement);
                let name = tree.variable_name(callee)?.to_string();
                let settings = settings_of(tree, args.first().copied());
                let note = find_setting(&settings, "note").and_then(|s| {
                    Some(Note {
                        value: tree.string_literal(s.value?)?.to_string(),
                        token: TokenSpan::of(tree, s.attribute),
                    })
                });
                Some(EnumValue {
                    name,
                    token: TokenSpan::of(tree, *statement),
                    note,
                })
            })
            .collect();

        self.db.enums.push(Enum {
            name,
            schema_name,
            token: TokenSpan::of(tree, element),
            values,
        });
    }

    pub(super) fn interpret_table_group(&mut self, element: NodeId) {
        let tree = self.tree;
        let Some(decl) = tree.element(element) else {
            return;
        };
        let Some(names) = decl.name.and_then(|n| tree.complex_variable_names(n)) else {
            return;
        };
        let (schema_name, name) = split_qualified(names);
        let settings = settings_of(tree, decl.attribute_list);
        let mut note = find_setting(&settings, "note").and_then(|s| {
            Some(Note {
                value: tree.string_literal(s.value?)?.to_string(),
                token: TokenSpan::of(tree, s.attribute),
            })
        });

        let mut tables = Vec::new();
        for statement in tree.block_body(element) {
            if tree.element_kind(*statement) == Some(ElementKind::Note) {
                if let Some(value) = note_content(tree, *statement) {
                    note = Some(Note {
                        value,
                        token: TokenSpan::of(tree, *statement),
                    });
                }
                continue;
            }
            if let Some(member) = tree.complex_variable_names(*statement) {
                let (schema_name, name) = split_qualified(member);
                tables.push(TableGroupMember { name, schema_name });
            }
        }

        self.db.table_groups.push(TableGroup {
            name,
            schema_name,
            tables,
            token: TokenSpan::of(tree, element),
            color: find_setting(&settings, "color")
                .and_then(|s| s.value)
                .and_then(|v| tree.color_literal(v))
                .map(str::to_string),
            note,
        });
    }

    pub(super) fn interpret_sticky_note(&mut self, element: NodeId) {
        let tree = self.tree;
        let Some(decl) = tree.element(element) else {
            return;
        };
        let Some(name) = decl.name.and_then(|n| tree.variable_name(n)) else {
            return;
        };
        let Some(content) = note_content(tree, element) else {
            return;
        };
        let settings = settings_of(tree, decl.attribute_list);
        self.db.notes.push(StickyNote {
            name: name.to_string(),
            content,
            header_color: find_setting(&settings, "headercolor")
                .and_then(|s| s.value)
                .and_then(|v| tree.color_literal(v))
                .map(str::to_string),
            token: TokenSpan::of(tree, element),
        });
    }

    /// The project's own fields; any other element inside it is
    /// interpreted as if it were top-level.
    pub(super) fn interpret_project(&mut self, element: NodeId) {
        let tree = self.tree;
        let name = tree
            .element(element)
            .and_then(|d| d.name)
            .and_then(|n| tree.variable_name(n))
            .map(str::to_string);
        let mut note = None;
        let mut database_type = None;
        let mut fields = IndexMap::new();

        for statement in tree.block_body(element).to_vec() {
            match tree.element_kind(statement) {
                Some(ElementKind::Note) => {
                    note = note_content(tree, statement).map(|value| Note {
                        value,
                        token: TokenSpan::of(tree, statement),
                    });
                }
                Some(ElementKind::Custom) => {
                    let Some(decl) = tree.element(statement) else {
                        continue;
                    };
                    let key = tree.token(decl.type_token).value.clone();
                    let Some(value) = decl.body.and_then(|b| field_value(tree, b)) else {
                        continue;
                    };
                    if key == "database_type" {
                        database_type = Some(value);
                    } else {
                        fields.insert(key, value);
                    }
                }
                Some(_) => self.interpret_element(statement),
                None => {}
            }
        }

        self.db.project = Some(Project {
            name,
            note,
            database_type,
            token: TokenSpan::of(tree, element),
            fields,
        });
    }
}

/// Text of a project field value: a string, a name or a number.
fn field_value(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    if let SyntaxNodeKind::FunctionApplication { .. } = tree.kind(node) {
        return None;
    }
    tree.string_literal(node)
        .or_else(|| tree.variable_name(node))
        .map(str::to_string)
        .or_else(|| tree.literal_token(node).map(|t| t.value.clone()))
}
