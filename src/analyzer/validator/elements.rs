//! Enums, notes, projects, table groups, records, policies and custom
//! project fields.

use super::{
    expect_color, expect_string, is_top_level, BodyRule, ElementValidator, HeaderRules, NameRule,
    Validator,
};
use crate::analyzer::symbol::SymbolKind;
use crate::analyzer::utils::{keyword_value, signed_number};
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};
use crate::error::CompileErrorCode;

pub(crate) struct EnumValidator;
pub(crate) struct NoteValidator;
pub(crate) struct ProjectValidator;
pub(crate) struct TableGroupValidator;
pub(crate) struct RecordsValidator;
pub(crate) struct PolicyValidator;
pub(crate) struct CustomValidator;

impl ElementValidator for EnumValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            is_top_level(parent),
            CompileErrorCode::InvalidEnumContext,
            "An Enum must appear at the top level",
            element,
        );
        v.check_header(
            element,
            ElementKind::Enum,
            HeaderRules::new(NameRule::Required, BodyRule::Block).dotted(),
        );
        let symbol =
            v.register_schema_element(element, SymbolKind::Enum, CompileErrorCode::DuplicateEnumName);

        let body = v.tree.block_body(element).to_vec();
        let is_block = v
            .tree
            .element(element)
            .and_then(|d| d.body)
            .is_some_and(|b| matches!(v.tree.kind(b), SyntaxNodeKind::BlockExpression { .. }));
        if is_block && body.is_empty() {
            v.error(
                CompileErrorCode::EmptyEnum,
                "An Enum must have at least one field",
                element,
            );
        }

        for statement in body {
            let (callee, args) = v.tree.statement_parts(statement);
            let args = args.to_vec();
            let name = v.tree.variable_name(callee).map(str::to_string);
            let list = args.first().copied();
            let shape_ok = v.tree.element(statement).is_none()
                && args.len() <= 1
                && list.map_or(true, |l| {
                    matches!(v.tree.kind(l), SyntaxNodeKind::ListExpression { .. })
                });
            let Some(name) = name.filter(|_| shape_ok) else {
                v.error(
                    CompileErrorCode::InvalidEnumElement,
                    "An enum field must be an identifier with an optional setting list",
                    statement,
                );
                continue;
            };
            v.check_settings(list, "enum field", &["note"], &[], expect_string);
            v.register_member(
                symbol,
                SymbolKind::EnumField,
                &name,
                statement,
                CompileErrorCode::DuplicateEnumFieldName,
                format!("Duplicate enum field '{}'", name),
                callee,
            );
        }
    }
}

impl ElementValidator for NoteValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        let nested = matches!(
            parent,
            Some(
                ElementKind::Table
                    | ElementKind::TablePartial
                    | ElementKind::TableGroup
                    | ElementKind::Project
            )
        );
        if !v.check_context(
            parent.is_none() || nested,
            CompileErrorCode::InvalidNoteContext,
            "A Note must appear at the top level or inside a Table, TablePartial, TableGroup or Project",
            element,
        ) {
            return;
        }

        if parent.is_none() {
            v.check_header(
                element,
                ElementKind::Note,
                HeaderRules::new(NameRule::Required, BodyRule::Any).with_settings(),
            );
            let decl = v.tree.element(element).cloned();
            if let Some(decl) = decl {
                v.check_settings(decl.attribute_list, "note", &["headercolor"], &[], expect_color);
                if let Some(name) = decl.name.and_then(|n| v.tree.variable_name(n).map(str::to_string)) {
                    if !v.note_names.insert(name.clone()) {
                        v.error(
                            CompileErrorCode::DuplicateNoteName,
                            format!("Note '{}' already exists", name),
                            element,
                        );
                    }
                }
            }
        } else {
            v.check_header(
                element,
                ElementKind::Note,
                HeaderRules::new(NameRule::Forbidden, BodyRule::Any),
            );
        }

        if note_content(v.tree, element).is_none() {
            let at = v.tree.element(element).and_then(|d| d.body).unwrap_or(element);
            v.error(
                CompileErrorCode::InvalidNoteContent,
                "A Note must contain a single string",
                at,
            );
        }
    }
}

/// The string held by a Note element, from either `Note: '...'` or
/// `Note { '...' }`.
pub(crate) fn note_content(tree: &SyntaxTree, element: NodeId) -> Option<String> {
    let body = tree.element(element)?.body?;
    let inner = match tree.kind(body) {
        SyntaxNodeKind::BlockExpression { body, .. } if body.len() == 1 => body[0],
        SyntaxNodeKind::BlockExpression { .. } => return None,
        _ => body,
    };
    tree.string_literal(inner).map(str::to_string)
}

impl ElementValidator for ProjectValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            parent.is_none(),
            CompileErrorCode::InvalidProjectContext,
            "A Project must appear at the top level",
            element,
        );
        if v.project_seen {
            v.error(
                CompileErrorCode::DuplicateProject,
                "Only one Project can exist",
                element,
            );
        }
        v.project_seen = true;
        v.check_header(
            element,
            ElementKind::Project,
            HeaderRules::new(NameRule::Optional, BodyRule::Block),
        );

        let body = v.tree.block_body(element).to_vec();
        for statement in body {
            if v.tree.element(statement).is_some() {
                v.validate_element(statement, Some(ElementKind::Project));
            } else {
                v.error(
                    CompileErrorCode::InvalidProjectField,
                    "A Project field must be written as 'key: value'",
                    statement,
                );
            }
        }
    }
}

impl ElementValidator for TableGroupValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            is_top_level(parent),
            CompileErrorCode::InvalidTableGroupContext,
            "A TableGroup must appear at the top level",
            element,
        );
        v.check_header(
            element,
            ElementKind::TableGroup,
            HeaderRules::new(NameRule::Required, BodyRule::Block)
                .dotted()
                .with_settings(),
        );
        let list = v.tree.element(element).and_then(|d| d.attribute_list);
        v.check_settings(list, "table group", &["color", "note"], &[], |tree, name, value| {
            match name {
                "color" => expect_color(tree, name, value),
                _ => expect_string(tree, name, value),
            }
        });

        let symbol = v.register_schema_element(
            element,
            SymbolKind::TableGroup,
            CompileErrorCode::DuplicateTableGroupName,
        );

        let body = v.tree.block_body(element).to_vec();
        for statement in body {
            if v.tree.element(statement).is_some() {
                v.validate_element(statement, Some(ElementKind::TableGroup));
                continue;
            }
            let Some(names) = v.tree.complex_variable_names(statement) else {
                v.error(
                    CompileErrorCode::InvalidTableGroupField,
                    "A TableGroup field must be a table name",
                    statement,
                );
                continue;
            };
            let key = names.join(".");
            v.register_member(
                symbol,
                SymbolKind::TableGroupField,
                &key,
                statement,
                CompileErrorCode::DuplicateTableGroupFieldName,
                format!("Table '{}' is already in this TableGroup", key),
                statement,
            );
        }
    }
}

impl ElementValidator for RecordsValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        let in_table = parent == Some(ElementKind::Table);
        if !v.check_context(
            is_top_level(parent) || in_table,
            CompileErrorCode::InvalidRecordsContext,
            "Records must appear at the top level or inside a Table",
            element,
        ) {
            return;
        }
        v.check_header(
            element,
            ElementKind::Records,
            HeaderRules::new(NameRule::Custom, BodyRule::Block),
        );

        let name = v.tree.element(element).and_then(|d| d.name);
        match (in_table, name) {
            (false, None) => v.error(
                CompileErrorCode::NameNotFound,
                "Top-level records must name a table and its columns, e.g. 'records users(id, name)'",
                element,
            ),
            (false, Some(name)) if records_target(v.tree, name).is_none() => v.error(
                CompileErrorCode::InvalidName,
                "Top-level records must name a table and its columns, e.g. 'records users(id, name)'",
                name,
            ),
            (true, Some(name)) if records_column_list(v.tree, name).is_none() => v.error(
                CompileErrorCode::InvalidName,
                "Records inside a table may only list columns, e.g. 'records (id, name)'",
                name,
            ),
            _ => {}
        }

        let body = v.tree.block_body(element).to_vec();
        for row in body {
            if v.tree.element(row).is_some()
                || matches!(v.tree.kind(row), SyntaxNodeKind::FunctionApplication { .. })
            {
                v.error(
                    CompileErrorCode::InvalidRecordsField,
                    "A records row must be a comma separated list of values",
                    row,
                );
                continue;
            }
            for value in v.tree.row_values(row) {
                if !is_valid_record_value(v.tree, value) {
                    v.error(
                        CompileErrorCode::InvalidRecordsField,
                        "Invalid records value",
                        value,
                    );
                }
            }
        }
    }
}

/// `table(col, ...)` or `schema.table(col, ...)`: table name segments and
/// column nodes.
pub(crate) fn records_target(tree: &SyntaxTree, name: NodeId) -> Option<(NodeId, Vec<NodeId>)> {
    match tree.kind(name) {
        SyntaxNodeKind::CallExpression { callee, arguments } => {
            tree.complex_variable_names(*callee)?;
            let columns = records_column_list(tree, *arguments)?;
            Some((*callee, columns))
        }
        _ => None,
    }
}

/// `(col, ...)` where every element is a plain name.
pub(crate) fn records_column_list(tree: &SyntaxTree, node: NodeId) -> Option<Vec<NodeId>> {
    let columns = tree.tuple_elements(node)?;
    columns
        .iter()
        .all(|c| tree.variable_name(*c).is_some())
        .then_some(columns)
}

fn is_valid_record_value(tree: &SyntaxTree, value: NodeId) -> bool {
    tree.is_dummy(value)
        || tree.literal_token(value).is_some()
        || signed_number(tree, value).is_some()
        || keyword_value(tree, value).is_some()
        || tree.function_expression(value).is_some()
        || tree.complex_variable_names(value).is_some()
}

impl ElementValidator for PolicyValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            is_top_level(parent),
            CompileErrorCode::InvalidPolicyContext,
            "A Policy must appear at the top level or inside a Project",
            element,
        );
        v.check_header(
            element,
            ElementKind::Policy,
            HeaderRules::new(NameRule::Required, BodyRule::Block).with_settings(),
        );

        let body = v.tree.block_body(element).to_vec();
        for statement in body {
            if v.tree.element(statement).is_some() {
                v.validate_element(statement, Some(ElementKind::Policy));
                continue;
            }
            let (callee, _) = v.tree.statement_parts(statement);
            if v.tree.variable_name(callee).is_none() {
                v.error(
                    CompileErrorCode::InvalidSettings,
                    "A Policy entry must start with a key",
                    statement,
                );
            }
        }
    }
}

impl ElementValidator for CustomValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        let keyword = v
            .tree
            .element(element)
            .map(|d| v.tree.token(d.type_token).value.clone())
            .unwrap_or_default();
        if !v.check_context(
            parent == Some(ElementKind::Project),
            CompileErrorCode::InvalidCustomContext,
            &format!("Unknown element type '{}'", keyword),
            element,
        ) {
            return;
        }
        v.check_header(
            element,
            ElementKind::Custom,
            HeaderRules::new(NameRule::Forbidden, BodyRule::Colon),
        );
        if let Some(body) = v.tree.element(element).and_then(|d| d.body) {
            if matches!(v.tree.kind(body), SyntaxNodeKind::FunctionApplication { .. }) {
                v.error(
                    CompileErrorCode::InvalidProjectField,
                    "A Project field must hold a single value",
                    body,
                );
            }
        }
    }
}
