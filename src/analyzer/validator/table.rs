//! Tables, table partials, their columns, indexes and checks.

use super::{
    canonical_setting, expect_color, expect_no_value, expect_string, is_top_level, BodyRule,
    ElementValidator, HeaderRules, NameRule, Validator,
};
use crate::analyzer::symbol::{NodeSymbolIndex, SymbolId, SymbolKind};
use crate::analyzer::utils::{
    endpoint_parts, has_setting, keyword_value, relationship_op, signed_number,
};
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};
use crate::error::CompileErrorCode;
use crate::lexer::token::SyntaxTokenKind;

pub(crate) struct TableValidator;
pub(crate) struct TablePartialValidator;
pub(crate) struct IndexesValidator;
pub(crate) struct ChecksValidator;

const TABLE_HEADER: HeaderRules = HeaderRules::new(NameRule::Required, BodyRule::Block)
    .dotted()
    .with_alias()
    .with_settings();

const PARTIAL_HEADER: HeaderRules =
    HeaderRules::new(NameRule::Required, BodyRule::Block).with_settings();

const SUB_BLOCK_HEADER: HeaderRules = HeaderRules::new(NameRule::Forbidden, BodyRule::Block);

pub(crate) const TABLE_SETTINGS: [&str; 2] = ["headercolor", "note"];
pub(crate) const INDEX_SETTINGS: [&str; 5] = ["pk", "unique", "name", "type", "note"];

pub(crate) const COLUMN_SETTINGS: [&str; 9] = [
    "pk",
    "null",
    "not null",
    "unique",
    "increment",
    "note",
    "default",
    "ref",
    "check",
];

fn check_table_setting(tree: &SyntaxTree, name: &str, value: Option<NodeId>) -> Option<String> {
    match name {
        "headercolor" => expect_color(tree, name, value),
        _ => expect_string(tree, name, value),
    }
}

impl ElementValidator for TableValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            is_top_level(parent),
            CompileErrorCode::InvalidTableContext,
            "A Table must appear at the top level",
            element,
        );
        v.check_header(element, ElementKind::Table, TABLE_HEADER);

        let Some(decl) = v.tree.element(element).cloned() else {
            return;
        };
        v.check_settings(
            decl.attribute_list,
            "table",
            &TABLE_SETTINGS,
            &[],
            check_table_setting,
        );

        let symbol =
            v.register_schema_element(element, SymbolKind::Table, CompileErrorCode::DuplicateTableName);

        if let Some(alias) = decl.alias {
            if let Some(alias_name) = v.tree.variable_name(alias).map(str::to_string) {
                let program = v.program;
                let taken = v
                    .symbols
                    .table_mut(program)
                    .map(|t| {
                        t.insert(NodeSymbolIndex::new(SymbolKind::Table, alias_name.clone()), symbol)
                            .is_err()
                    })
                    .unwrap_or(false);
                if taken {
                    v.error(
                        CompileErrorCode::DuplicateTableName,
                        format!("Table name '{}' already exists", alias_name),
                        alias,
                    );
                }
            }
        }

        validate_table_body(v, element, symbol, ElementKind::Table);
    }
}

impl ElementValidator for TablePartialValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            is_top_level(parent),
            CompileErrorCode::InvalidTablePartialContext,
            "A TablePartial must appear at the top level",
            element,
        );
        v.check_header(element, ElementKind::TablePartial, PARTIAL_HEADER);

        let Some(decl) = v.tree.element(element).cloned() else {
            return;
        };
        v.check_settings(
            decl.attribute_list,
            "table partial",
            &TABLE_SETTINGS,
            &[],
            check_table_setting,
        );

        let symbol = v.symbols.create(SymbolKind::TablePartial, Some(element));
        v.tree.node_mut(element).symbol = Some(symbol);
        if let Some(name) = decl.name.and_then(|n| v.tree.variable_name(n).map(str::to_string)) {
            let program = v.program;
            let taken = v
                .symbols
                .table_mut(program)
                .map(|t| {
                    t.insert(NodeSymbolIndex::new(SymbolKind::TablePartial, name.clone()), symbol)
                        .is_err()
                })
                .unwrap_or(false);
            if taken {
                v.error(
                    CompileErrorCode::DuplicateTablePartialName,
                    format!("TablePartial name '{}' already exists", name),
                    element,
                );
            }
        }

        validate_table_body(v, element, symbol, ElementKind::TablePartial);
    }
}

/// Columns, partial injections and sub-elements of a Table or TablePartial.
fn validate_table_body(v: &mut Validator<'_>, element: NodeId, owner: SymbolId, kind: ElementKind) {
    let body = v.tree.block_body(element).to_vec();
    for statement in body {
        if v.tree.element(statement).is_some() {
            v.validate_element(statement, Some(kind));
        } else if let Some(name) = injected_partial_name(v.tree, statement) {
            if kind == ElementKind::TablePartial {
                v.error(
                    CompileErrorCode::InvalidColumn,
                    "A TablePartial cannot inject other partials",
                    statement,
                );
                continue;
            }
            v.register_member(
                owner,
                SymbolKind::PartialInjection,
                &name,
                statement,
                CompileErrorCode::DuplicatePartialInjection,
                format!("Partial '{}' is injected more than once", name),
                statement,
            );
        } else {
            validate_column(v, statement, owner);
        }
    }
}

/// `~name` statements.
pub(crate) fn injected_partial_name(tree: &SyntaxTree, statement: NodeId) -> Option<String> {
    match tree.kind(statement) {
        SyntaxNodeKind::PrefixExpression { op, expression }
            if tree.token(*op).kind == SyntaxTokenKind::Tilde =>
        {
            tree.variable_name(*expression).map(str::to_string)
        }
        _ => None,
    }
}

fn validate_column(v: &mut Validator<'_>, statement: NodeId, owner: SymbolId) {
    let (callee, args) = v.tree.statement_parts(statement);
    let args = args.to_vec();

    let Some(name) = v.tree.variable_name(callee).map(str::to_string) else {
        v.error(
            CompileErrorCode::InvalidColumnName,
            "A column name must be an identifier or a quoted identifier",
            callee,
        );
        return;
    };

    let Some(column_type) = args.first().copied() else {
        v.error(
            CompileErrorCode::InvalidColumn,
            format!("Column '{}' must have a type", name),
            statement,
        );
        return;
    };
    if !is_valid_column_type(v.tree, column_type) {
        v.error(
            CompileErrorCode::InvalidColumnType,
            "Invalid column type",
            column_type,
        );
    }

    let list = match args.get(1) {
        Some(list) if matches!(v.tree.kind(*list), SyntaxNodeKind::ListExpression { .. }) => {
            Some(*list)
        }
        Some(other) => {
            v.error(
                CompileErrorCode::InvalidColumn,
                "Expect a setting list after the column type",
                *other,
            );
            None
        }
        None => None,
    };
    for extra in args.iter().skip(2) {
        v.error(
            CompileErrorCode::InvalidColumn,
            "Unexpected expression after the column settings",
            *extra,
        );
    }

    let settings = v.check_settings(list, "column", &COLUMN_SETTINGS, &["ref", "check"], check_column_setting);
    if has_setting(&settings, &["null"]) && has_setting(&settings, &["not null"]) {
        if let Some(list) = list {
            v.error(
                CompileErrorCode::ConflictingSetting,
                "'null' and 'not null' cannot both be set",
                list,
            );
        }
    }

    v.register_member(
        owner,
        SymbolKind::Column,
        &name,
        statement,
        CompileErrorCode::DuplicateColumnName,
        format!("Duplicate column '{}'", name),
        callee,
    );
}

fn check_column_setting(tree: &SyntaxTree, name: &str, value: Option<NodeId>) -> Option<String> {
    match canonical_setting(name) {
        "pk" | "null" | "not null" | "unique" | "increment" => expect_no_value(name, value),
        "note" => expect_string(tree, name, value),
        "default" => match value {
            Some(v) if is_valid_default(tree, v) => None,
            _ => Some(
                "'default' must be a string, a number, a boolean, null, an expression or an enum value"
                    .to_string(),
            ),
        },
        "ref" => match value {
            Some(v) if is_valid_inline_ref(tree, v) => None,
            _ => Some("'ref' must be a relationship such as '> table.column'".to_string()),
        },
        "check" => match value {
            Some(v) if tree.function_expression(v).is_some() => None,
            _ => Some("'check' must be a backtick expression".to_string()),
        },
        _ => None,
    }
}

pub(crate) fn is_valid_default(tree: &SyntaxTree, value: NodeId) -> bool {
    tree.string_literal(value).is_some()
        || signed_number(tree, value).is_some()
        || keyword_value(tree, value).is_some()
        || tree.function_expression(value).is_some()
        || tree
            .complex_variable_names(value)
            .is_some_and(|names| names.len() >= 2)
}

fn is_valid_inline_ref(tree: &SyntaxTree, value: NodeId) -> bool {
    match tree.kind(value) {
        SyntaxNodeKind::PrefixExpression { op, expression } => {
            relationship_op(tree, *op).is_some()
                && endpoint_parts(tree, *expression).is_some_and(|(_, cols)| cols.len() == 1)
        }
        _ => false,
    }
}

/// Types are names (`int`), dotted names (`schema.enum`), calls
/// (`varchar(255)`, `decimal(10, 2)`) or arrays of those (`int[]`).
pub(crate) fn is_valid_column_type(tree: &SyntaxTree, node: NodeId) -> bool {
    match tree.kind(node) {
        SyntaxNodeKind::PrimaryExpression { .. } => tree.variable_name(node).is_some(),
        SyntaxNodeKind::InfixExpression { .. } => tree.complex_variable_names(node).is_some(),
        SyntaxNodeKind::CallExpression { callee, arguments } => {
            is_valid_column_type(tree, *callee)
                && tree.tuple_elements(*arguments).is_some_and(|args| {
                    args.iter().all(|a| {
                        signed_number(tree, *a).is_some()
                            || tree.variable_name(*a).is_some()
                            || tree.string_literal(*a).is_some()
                    })
                })
        }
        SyntaxNodeKind::Array {
            expression,
            indexer,
        } => {
            let indexes = tree.attributes_of(Some(*indexer));
            is_valid_column_type(tree, *expression)
                && indexes.len() <= 1
                && indexes.iter().all(|a| match tree.kind(*a) {
                    SyntaxNodeKind::Attribute {
                        name, value: None, ..
                    } => signed_number(tree, *name).is_some(),
                    _ => false,
                })
        }
        _ => false,
    }
}

impl ElementValidator for IndexesValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            matches!(parent, Some(ElementKind::Table | ElementKind::TablePartial)),
            CompileErrorCode::InvalidIndexesContext,
            "An Indexes block must appear inside a Table or a TablePartial",
            element,
        );
        v.check_header(element, ElementKind::Indexes, SUB_BLOCK_HEADER);

        let body = v.tree.block_body(element).to_vec();
        for statement in body {
            if v.tree.element(statement).is_some() {
                v.error(
                    CompileErrorCode::InvalidIndex,
                    "An index must be a column, an expression or a tuple of them",
                    statement,
                );
                continue;
            }
            let (callee, args) = v.tree.statement_parts(statement);
            let args = args.to_vec();
            if !is_valid_index_target(v.tree, callee) {
                v.error(
                    CompileErrorCode::InvalidIndex,
                    "An index must be a column, an expression or a tuple of them",
                    callee,
                );
            }
            let list = args.first().copied();
            if args.len() > 1
                || list.is_some_and(|l| {
                    !matches!(v.tree.kind(l), SyntaxNodeKind::ListExpression { .. })
                })
            {
                v.error(
                    CompileErrorCode::InvalidIndex,
                    "An index can only be followed by a setting list",
                    statement,
                );
                continue;
            }
            v.check_settings(
                list,
                "index",
                &INDEX_SETTINGS,
                &[],
                |tree, name, value| match name {
                    "pk" | "unique" => expect_no_value(name, value),
                    "type" => match value {
                        Some(v) if tree.variable_name(v).is_some() => None,
                        _ => Some("'type' must be an index type such as btree or hash".to_string()),
                    },
                    _ => expect_string(tree, name, value),
                },
            );
        }
    }
}

fn is_valid_index_target(tree: &SyntaxTree, node: NodeId) -> bool {
    let is_part =
        |n: NodeId| tree.variable_name(n).is_some() || tree.function_expression(n).is_some();
    if is_part(node) {
        return true;
    }
    tree.tuple_elements(node)
        .is_some_and(|parts| !parts.is_empty() && parts.iter().all(|p| is_part(*p)))
}

impl ElementValidator for ChecksValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            matches!(parent, Some(ElementKind::Table | ElementKind::TablePartial)),
            CompileErrorCode::InvalidChecksContext,
            "A Checks block must appear inside a Table or a TablePartial",
            element,
        );
        v.check_header(element, ElementKind::Checks, SUB_BLOCK_HEADER);

        let body = v.tree.block_body(element).to_vec();
        for statement in body {
            let (callee, args) = v.tree.statement_parts(statement);
            let args = args.to_vec();
            let list = args.first().copied();
            let valid = v.tree.element(statement).is_none()
                && v.tree.function_expression(callee).is_some()
                && args.len() <= 1
                && list.map_or(true, |l| {
                    matches!(v.tree.kind(l), SyntaxNodeKind::ListExpression { .. })
                });
            if !valid {
                v.error(
                    CompileErrorCode::InvalidCheck,
                    "A check must be a backtick expression with an optional setting list",
                    statement,
                );
                continue;
            }
            v.check_settings(list, "check", &["name"], &[], expect_string);
        }
    }
}
