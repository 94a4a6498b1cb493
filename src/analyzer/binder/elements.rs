use super::{Binder, ElementBinder};
use crate::analyzer::symbol::{SymbolId, SymbolKind};
use crate::analyzer::utils::settings_of;
use crate::analyzer::validator::{injected_partial_name, records_column_list, records_target};
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind};
use crate::error::{CompileError, CompileErrorCode, NodeOrToken};

pub(crate) struct TableBinder;
pub(crate) struct RefBinder;
pub(crate) struct TableGroupBinder;
pub(crate) struct RecordsBinder;
pub(crate) struct IndexesBinder;
pub(crate) struct ProjectBinder;

impl ElementBinder for TableBinder {
    fn bind(&self, b: &mut Binder<'_>, element: NodeId, scopes: &[SymbolId]) {
        let Some(owner) = b.tree.node(element).symbol else {
            return;
        };
        let is_table = b.tree.element_kind(element) == Some(ElementKind::Table);
        let mut inner = vec![owner];
        inner.extend_from_slice(scopes);

        let body = b.tree.block_body(element).to_vec();
        for statement in body {
            if b.tree.element(statement).is_some() {
                b.bind_element(statement, &inner);
            } else if injected_partial_name(b.tree, statement).is_none() {
                bind_column(b, statement, &inner, is_table);
            }
        }
    }
}

fn bind_column(b: &mut Binder<'_>, statement: NodeId, scopes: &[SymbolId], is_table: bool) {
    let own_symbol = b.tree.node(statement).symbol;
    let (_, args) = b.tree.statement_parts(statement);
    let args = args.to_vec();

    if let Some(column_type) = args.first() {
        let mut type_node = *column_type;
        loop {
            match b.tree.kind(type_node) {
                SyntaxNodeKind::CallExpression { callee, .. } => type_node = *callee,
                SyntaxNodeKind::Array { expression, .. } => type_node = *expression,
                _ => break,
            }
        }
        // Types usually name built-in SQL types, so a miss is not an error.
        if let Some(nodes) = b.tree.member_access_segments(type_node) {
            let segments = b.qualified_segments(&nodes, &[SymbolKind::Enum]);
            b.lookup_and_bind_in_scope(scopes, &segments, false);
        }
    }

    let list = args
        .get(1)
        .copied()
        .filter(|l| matches!(b.tree.kind(*l), SyntaxNodeKind::ListExpression { .. }));
    for setting in settings_of(b.tree, list) {
        let Some(value) = setting.value else {
            continue;
        };
        match setting.name.as_deref() {
            Some("default") => bind_enum_value(b, value),
            Some("ref") => {
                let SyntaxNodeKind::PrefixExpression { expression, .. } = b.tree.kind(value).clone()
                else {
                    continue;
                };
                let target = bind_endpoint(b, scopes, expression);
                if let (true, Some(own), Some(target)) = (is_table, own_symbol, target) {
                    if target.len() == 1 && resolves_to(b, target[0], own) {
                        let error = same_endpoint_error(b, value);
                        b.errors.push(error);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Whether `symbol` is `column`, directly or through an injection.
fn resolves_to(b: &Binder<'_>, symbol: SymbolId, column: SymbolId) -> bool {
    symbol == column || b.symbols.get(symbol).injected_from == Some(column)
}

fn same_endpoint_error(b: &Binder<'_>, node: NodeId) -> CompileError {
    let n = b.tree.node(node);
    CompileError::new(
        CompileErrorCode::SameEndpoint,
        "Two endpoints of a ref are the same",
        NodeOrToken::Node(node),
        n.start,
        n.end,
    )
}

/// `enum.field` or `schema.enum.field` used as a value.
fn bind_enum_value(b: &mut Binder<'_>, value: NodeId) {
    let Some(nodes) = b.tree.member_access_segments(value) else {
        return;
    };
    if nodes.len() < 2 || nodes.iter().any(|n| b.tree.variable_name(*n).is_none()) {
        return;
    }
    let segments = b.qualified_segments(&nodes, &[SymbolKind::Enum, SymbolKind::EnumField]);
    let program = [b.program];
    b.lookup_and_bind_in_scope(&program, &segments, true);
}

/// Resolve `table.column`, `schema.table.column` or `table.(a, b)`.
/// Returns the column symbols when every part resolves.
fn bind_endpoint(b: &mut Binder<'_>, scopes: &[SymbolId], endpoint: NodeId) -> Option<Vec<SymbolId>> {
    let nodes = b.tree.member_access_segments(endpoint)?;
    let (last, path) = nodes.split_last()?;
    if path.is_empty() {
        return None;
    }
    let segments = b.qualified_segments(path, &[SymbolKind::Table]);
    let resolved = b.lookup_and_bind_in_scope(scopes, &segments, true)?;
    let table = *resolved.last()?;
    let columns = b.tree.tuple_elements(*last).unwrap_or_else(|| vec![*last]);
    let table_node = path[path.len() - 1];
    bind_columns(b, table, table_node, &columns)
}

/// Resolve column names in the scope of `table`, reporting each miss.
fn bind_columns(
    b: &mut Binder<'_>,
    table: SymbolId,
    table_node: NodeId,
    columns: &[NodeId],
) -> Option<Vec<SymbolId>> {
    let table_name = b.tree.variable_name(table_node).unwrap_or_default().to_string();
    let mut resolved = Vec::with_capacity(columns.len());
    let mut complete = true;
    for column in columns {
        match b.lookup_and_bind_in_scope(&[table], &[(*column, SymbolKind::Column)], false) {
            Some(found) => resolved.extend(found),
            None => {
                complete = false;
                if let Some(name) = b.tree.variable_name(*column).map(str::to_string) {
                    b.binding_error(
                        format!("Column '{}' does not exist in table '{}'", name, table_name),
                        *column,
                    );
                }
            }
        }
    }
    complete.then_some(resolved)
}

impl ElementBinder for RefBinder {
    fn bind(&self, b: &mut Binder<'_>, element: NodeId, scopes: &[SymbolId]) {
        let Some(body) = b.tree.element(element).and_then(|d| d.body) else {
            return;
        };
        let statement = match b.tree.kind(body) {
            SyntaxNodeKind::BlockExpression { body: statements, .. } => match statements.as_slice() {
                [only] => *only,
                _ => return,
            },
            _ => body,
        };
        let (callee, _) = b.tree.statement_parts(statement);
        let SyntaxNodeKind::InfixExpression { left, right, .. } = b.tree.kind(callee).clone() else {
            return;
        };
        let left = bind_endpoint(b, scopes, left);
        let right = bind_endpoint(b, scopes, right);
        if let (Some(left), Some(right)) = (left, right) {
            if left == right {
                let error = same_endpoint_error(b, callee);
                b.errors.push(error);
            }
        }
    }
}

impl ElementBinder for TableGroupBinder {
    fn bind(&self, b: &mut Binder<'_>, element: NodeId, scopes: &[SymbolId]) {
        let body = b.tree.block_body(element).to_vec();
        for statement in body {
            if b.tree.element(statement).is_some() {
                continue;
            }
            let Some(nodes) = b.tree.member_access_segments(statement) else {
                continue;
            };
            if nodes.iter().any(|n| b.tree.variable_name(*n).is_none()) {
                continue;
            }
            let segments = b.qualified_segments(&nodes, &[SymbolKind::Table]);
            b.lookup_and_bind_in_scope(scopes, &segments, true);
        }
    }
}

impl ElementBinder for RecordsBinder {
    fn bind(&self, b: &mut Binder<'_>, element: NodeId, scopes: &[SymbolId]) {
        let name = b.tree.element(element).and_then(|d| d.name);
        let owner = b
            .tree
            .enclosing_element(element)
            .filter(|p| b.tree.element_kind(*p) == Some(ElementKind::Table))
            .and_then(|p| b.tree.node(p).symbol);

        match (owner, name) {
            (Some(table), Some(name)) => {
                if let Some(columns) = records_column_list(b.tree, name) {
                    let table_node = b
                        .tree
                        .enclosing_element(element)
                        .and_then(|t| b.tree.element(t).and_then(|d| d.name))
                        .and_then(|n| b.tree.member_access_segments(n))
                        .and_then(|segs| segs.last().copied());
                    if let Some(table_node) = table_node {
                        bind_columns(b, table, table_node, &columns);
                    }
                }
            }
            (None, Some(name)) => {
                if let Some((callee, columns)) = records_target(b.tree, name) {
                    if let Some(nodes) = b.tree.member_access_segments(callee) {
                        let segments = b.qualified_segments(&nodes, &[SymbolKind::Table]);
                        let program = [b.program];
                        let scopes = if scopes.is_empty() { &program[..] } else { scopes };
                        if let Some(resolved) = b.lookup_and_bind_in_scope(scopes, &segments, true) {
                            if let (Some(table), Some(table_node)) = (resolved.last(), nodes.last()) {
                                bind_columns(b, *table, *table_node, &columns);
                            }
                        }
                    }
                }
            }
            _ => {}
        }

        let rows = b.tree.block_body(element).to_vec();
        for row in rows {
            if b.tree.element(row).is_some() {
                continue;
            }
            for value in b.tree.row_values(row) {
                bind_enum_value(b, value);
            }
        }
    }
}

impl ElementBinder for IndexesBinder {
    fn bind(&self, b: &mut Binder<'_>, element: NodeId, scopes: &[SymbolId]) {
        let Some(owner) = scopes.first().copied() else {
            return;
        };
        let table_node = b
            .tree
            .enclosing_element(element)
            .and_then(|t| b.tree.element(t).and_then(|d| d.name))
            .and_then(|n| b.tree.member_access_segments(n))
            .and_then(|segs| segs.last().copied());
        let Some(table_node) = table_node else {
            return;
        };

        let body = b.tree.block_body(element).to_vec();
        for statement in body {
            if b.tree.element(statement).is_some() {
                continue;
            }
            let (callee, _) = b.tree.statement_parts(statement);
            let targets = b.tree.tuple_elements(callee).unwrap_or_else(|| vec![callee]);
            let columns: Vec<NodeId> = targets
                .into_iter()
                .filter(|t| b.tree.variable_name(*t).is_some())
                .collect();
            bind_columns(b, owner, table_node, &columns);
        }
    }
}

impl ElementBinder for ProjectBinder {
    fn bind(&self, b: &mut Binder<'_>, element: NodeId, scopes: &[SymbolId]) {
        let body = b.tree.block_body(element).to_vec();
        for statement in body {
            if b.tree.element(statement).is_some() {
                b.bind_element(statement, scopes);
            }
        }
    }
}
