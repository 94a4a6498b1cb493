//! Explicit and inline relationships.

use std::collections::{HashMap, HashSet};

use super::types::*;
use super::{split_qualified, Interpreter};
use crate::analyzer::symbol::SymbolId;
use crate::analyzer::utils::{endpoint_parts, find_setting, relation_pair, relationship_op, settings_of};
use crate::ast::{NodeId, SyntaxNodeKind, SyntaxTree};
use crate::error::CompileErrorCode;

/// An inline `ref:` setting waiting for its table to be merged.
#[derive(Debug, Clone)]
pub(crate) struct PendingInlineRef {
    pub target_table: Option<SymbolId>,
    pub op: String,
    pub inline: InlineRef,
}

/// A table and the column names of one ref endpoint.
type EndpointKey = (SymbolId, Vec<String>);

#[derive(Debug)]
pub(crate) enum RefRejection {
    Duplicate,
    Circular,
}

/// Accepted refs, with the endpoint keys used to detect duplicates and
/// cycles.
#[derive(Debug, Default)]
pub(crate) struct RefRegistry {
    refs: Vec<Ref>,
    keys: Vec<(EndpointKey, EndpointKey)>,
    /// Foreign endpoint -> referenced endpoint
    edges: HashMap<EndpointKey, Vec<EndpointKey>>,
}

impl RefRegistry {
    pub fn add(&mut self, r: Ref, left: EndpointKey, right: EndpointKey) -> Result<(), RefRejection> {
        let duplicate = self
            .keys
            .iter()
            .any(|(l, rr)| (l == &left && rr == &right) || (l == &right && rr == &left));
        if duplicate {
            return Err(RefRejection::Duplicate);
        }

        let relations = r
            .endpoints
            .first()
            .zip(r.endpoints.get(1))
            .map(|(a, b)| (a.relation.as_str(), b.relation.as_str()));
        let edge = match relations {
            Some(("*", "1")) | Some(("1", "1")) => Some((left.clone(), right.clone())),
            Some(("1", "*")) => Some((right.clone(), left.clone())),
            _ => None,
        };
        if let Some((from, to)) = edge {
            if from != to {
                if self.reaches(&to, &from) {
                    return Err(RefRejection::Circular);
                }
                self.edges.entry(from).or_default().push(to);
            }
        }

        self.keys.push((left, right));
        self.refs.push(r);
        Ok(())
    }

    fn reaches(&self, start: &EndpointKey, target: &EndpointKey) -> bool {
        let mut stack = vec![start];
        let mut visited: HashSet<&EndpointKey> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = self.edges.get(current) {
                stack.extend(next.iter());
            }
        }
        false
    }

    pub fn into_refs(self) -> Vec<Ref> {
        self.refs
    }
}

impl<'a> Interpreter<'a> {
    pub(super) fn interpret_ref(&mut self, element: NodeId) {
        let tree = self.tree;
        let Some(decl) = tree.element(element).cloned() else {
            return;
        };
        let Some(body) = decl.body else {
            return;
        };
        let statement = match tree.kind(body) {
            SyntaxNodeKind::BlockExpression { body: statements, .. } => match statements.as_slice() {
                [only] => *only,
                _ => return,
            },
            _ => body,
        };
        let (callee, args) = tree.statement_parts(statement);
        let SyntaxNodeKind::InfixExpression { op, left, right } = tree.kind(callee) else {
            return;
        };
        let Some(op) = relationship_op(tree, *op) else {
            return;
        };
        let (left_relation, right_relation) = relation_pair(op);
        let (Some((left_endpoint, left_key)), Some((right_endpoint, right_key))) = (
            endpoint(tree, *left, left_relation),
            endpoint(tree, *right, right_relation),
        ) else {
            return;
        };

        let (schema_name, name) = match decl.name.and_then(|n| tree.complex_variable_names(n)) {
            Some(names) => {
                let (schema, name) = split_qualified(names);
                (schema, Some(name))
            }
            None => (None, None),
        };
        let settings = settings_of(tree, args.first().copied());
        let action = |key: &str| {
            find_setting(&settings, key).and_then(|s| s.value).and_then(|v| {
                tree.identifier_stream_text(v)
                    .or_else(|| tree.variable_name(v).map(|n| n.to_ascii_lowercase()))
            })
        };

        let r = Ref {
            name,
            schema_name,
            endpoints: vec![left_endpoint, right_endpoint],
            on_delete: action("delete"),
            on_update: action("update"),
            color: find_setting(&settings, "color")
                .and_then(|s| s.value)
                .and_then(|v| tree.color_literal(v))
                .map(str::to_string),
            token: TokenSpan::of(tree, element),
        };
        self.register_ref(r, left_key, right_key, element);
    }

    /// Turn queued inline refs into top-level refs: per table, direct
    /// columns first, then columns contributed by partials.
    pub(super) fn emit_inline_refs(&mut self) {
        let mut emitted = Vec::new();
        for entry in self.tables.values() {
            for node in &entry.inline_ref_order {
                let Some(pending) = self.inline_refs.get(node) else {
                    continue;
                };
                let (callee, _) = self.tree.statement_parts(*node);
                let Some(column_name) = self.tree.variable_name(callee) else {
                    continue;
                };
                for inline in pending {
                    let Some(target) = inline.target_table else {
                        continue;
                    };
                    let (own_relation, target_relation) = relation_pair(&inline.op);
                    let own = RefEndpoint {
                        schema_name: entry.table.schema_name.clone(),
                        table_name: entry.table.name.clone(),
                        field_names: vec![column_name.to_string()],
                        relation: own_relation.to_string(),
                        token: inline.inline.token,
                    };
                    let other = RefEndpoint {
                        schema_name: inline.inline.schema_name.clone(),
                        table_name: inline.inline.table_name.clone(),
                        field_names: inline.inline.field_names.clone(),
                        relation: target_relation.to_string(),
                        token: inline.inline.token,
                    };
                    let r = Ref {
                        name: None,
                        schema_name: None,
                        endpoints: vec![own, other],
                        on_delete: None,
                        on_update: None,
                        color: None,
                        token: inline.inline.token,
                    };
                    let own_key = (entry.symbol, vec![column_name.to_string()]);
                    let target_key = (target, inline.inline.field_names.clone());
                    emitted.push((r, own_key, target_key, *node));
                }
            }
        }
        for (r, own_key, target_key, node) in emitted {
            self.register_ref(r, own_key, target_key, node);
        }
    }

    fn register_ref(&mut self, r: Ref, left: EndpointKey, right: EndpointKey, node: NodeId) {
        match self.refs.add(r, left, right) {
            Ok(()) => {}
            Err(RefRejection::Duplicate) => self.error(
                CompileErrorCode::DuplicateRef,
                "References with same endpoints exist",
                node,
            ),
            Err(RefRejection::Circular) => self.error(
                CompileErrorCode::CircularRef,
                "Reference creates a circular dependency between columns",
                node,
            ),
        }
    }
}

/// Build a ref endpoint and its key. The table segment must be bound.
fn endpoint(tree: &SyntaxTree, node: NodeId, relation: &str) -> Option<(RefEndpoint, EndpointKey)> {
    let (path, columns) = endpoint_parts(tree, node)?;
    let segments = tree.member_access_segments(node)?;
    let table_node = segments.get(segments.len().checked_sub(2)?)?;
    let table = tree.node(*table_node).referee?;
    let field_names: Vec<String> = columns
        .iter()
        .filter_map(|c| tree.variable_name(*c).map(str::to_string))
        .collect();
    let (schema_name, table_name) = split_qualified(path);
    Some((
        RefEndpoint {
            schema_name,
            table_name,
            field_names: field_names.clone(),
            relation: relation.to_string(),
            token: TokenSpan::of(tree, node),
        },
        (table, field_names),
    ))
}
