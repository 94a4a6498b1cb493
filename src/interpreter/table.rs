//! Tables, table partials, columns and the partial merge.

use std::collections::HashSet;

use serde_json::Value;

use super::records::RecordsSource;
use super::refs::PendingInlineRef;
use super::types::*;
use super::{schema_scope, split_qualified, Interpreter};
use crate::analyzer::symbol::SymbolId;
use crate::analyzer::utils::{
    endpoint_parts, find_setting, keyword_value, relationship_op, settings_of, signed_number, Setting,
};
use crate::analyzer::validator::{injected_partial_name, note_content};
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};

/// A table as declared, before partials are merged in.
pub(crate) struct TableEntry {
    pub symbol: SymbolId,
    pub table: Table,
    /// Statement node of each direct column, parallel to `table.fields`
    pub column_nodes: Vec<NodeId>,
    pub layout: Vec<Slot>,
    /// Statement nodes of the merged fields, filled by the merge
    pub merged_nodes: Vec<NodeId>,
    /// Column statements in the order their inline refs are emitted
    pub inline_ref_order: Vec<NodeId>,
}

/// One field-producing statement of a table body, in source order.
pub(crate) enum Slot {
    Column(usize),
    Partial(String),
}

pub(crate) struct PartialEntry {
    pub partial: TablePartial,
    pub column_nodes: Vec<NodeId>,
}

/// Header settings and sub-elements shared by tables and partials.
#[derive(Default)]
struct TableParts {
    header_color: Option<String>,
    note: Option<Note>,
    indexes: Vec<Index>,
    checks: Vec<Check>,
}

impl<'a> Interpreter<'a> {
    pub(super) fn interpret_table(&mut self, element: NodeId) {
        let tree = self.tree;
        let Some(symbol) = tree.node(element).symbol else {
            return;
        };
        let Some(decl) = tree.element(element).cloned() else {
            return;
        };
        let names = decl
            .name
            .and_then(|n| tree.complex_variable_names(n))
            .unwrap_or_default();
        let (schema_name, name) = split_qualified(names);
        let alias = decl
            .alias
            .and_then(|a| tree.variable_name(a))
            .map(str::to_string);
        let mut parts = self.header_parts(decl.attribute_list);

        let mut fields = Vec::new();
        let mut column_nodes = Vec::new();
        let mut layout = Vec::new();
        let mut partials = Vec::new();
        for statement in tree.block_body(element).to_vec() {
            if tree.element(statement).is_some() {
                if tree.element_kind(statement) == Some(ElementKind::Records) {
                    self.records.push(RecordsSource {
                        element: statement,
                        table: Some(symbol),
                    });
                } else {
                    self.interpret_sub_element(statement, &mut parts);
                }
            } else if let Some(partial) = injected_partial_name(tree, statement) {
                partials.push(PartialRef {
                    order: layout.len(),
                    name: partial.clone(),
                    token: TokenSpan::of(tree, statement),
                });
                layout.push(Slot::Partial(partial));
            } else if let Some(column) = self.interpret_column(statement) {
                layout.push(Slot::Column(fields.len()));
                fields.push(column);
                column_nodes.push(statement);
            }
        }

        let table = Table {
            name,
            schema_name,
            alias,
            fields,
            token: TokenSpan::of(tree, element),
            indexes: parts.indexes,
            checks: parts.checks,
            header_color: parts.header_color,
            note: parts.note,
            partials,
        };
        self.tables.insert(
            symbol,
            TableEntry {
                symbol,
                table,
                column_nodes,
                layout,
                merged_nodes: Vec::new(),
                inline_ref_order: Vec::new(),
            },
        );
    }

    pub(super) fn interpret_partial(&mut self, element: NodeId) {
        let tree = self.tree;
        let Some(decl) = tree.element(element).cloned() else {
            return;
        };
        let Some(name) = decl
            .name
            .and_then(|n| tree.variable_name(n))
            .map(str::to_string)
        else {
            return;
        };
        let mut parts = self.header_parts(decl.attribute_list);

        let mut fields = Vec::new();
        let mut column_nodes = Vec::new();
        for statement in tree.block_body(element).to_vec() {
            if tree.element(statement).is_some() {
                self.interpret_sub_element(statement, &mut parts);
            } else if injected_partial_name(tree, statement).is_none() {
                if let Some(column) = self.interpret_column(statement) {
                    fields.push(column);
                    column_nodes.push(statement);
                }
            }
        }

        let partial = TablePartial {
            name: name.clone(),
            fields,
            token: TokenSpan::of(tree, element),
            indexes: parts.indexes,
            checks: parts.checks,
            header_color: parts.header_color,
            note: parts.note,
        };
        self.partials.entry(name).or_insert(PartialEntry {
            partial,
            column_nodes,
        });
    }

    fn header_parts(&self, list: Option<NodeId>) -> TableParts {
        let settings = settings_of(self.tree, list);
        TableParts {
            header_color: find_setting(&settings, "headercolor")
                .and_then(|s| s.value)
                .and_then(|v| self.tree.color_literal(v))
                .map(str::to_string),
            note: find_setting(&settings, "note").and_then(|s| note_setting(self.tree, s)),
            ..TableParts::default()
        }
    }

    fn interpret_sub_element(&mut self, element: NodeId, parts: &mut TableParts) {
        let tree = self.tree;
        match tree.element_kind(element) {
            Some(ElementKind::Note) => {
                if let Some(value) = note_content(tree, element) {
                    parts.note = Some(Note {
                        value,
                        token: TokenSpan::of(tree, element),
                    });
                }
            }
            Some(ElementKind::Indexes) => {
                for statement in tree.block_body(element) {
                    if let Some(index) = interpret_index(tree, *statement) {
                        parts.indexes.push(index);
                    }
                }
            }
            Some(ElementKind::Checks) => {
                for statement in tree.block_body(element) {
                    let (callee, args) = tree.statement_parts(*statement);
                    let Some(expression) = tree.function_expression(callee) else {
                        continue;
                    };
                    let settings = settings_of(tree, args.first().copied());
                    parts.checks.push(Check {
                        expression: expression.to_string(),
                        name: find_setting(&settings, "name")
                            .and_then(|s| s.value)
                            .and_then(|v| tree.string_literal(v))
                            .map(str::to_string),
                        token: TokenSpan::of(tree, *statement),
                    });
                }
            }
            _ => {}
        }
    }

    /// `name type [settings]`. Inline refs are queued for emission after
    /// the partial merge.
    pub(super) fn interpret_column(&mut self, statement: NodeId) -> Option<Column> {
        let tree = self.tree;
        let (callee, args) = tree.statement_parts(statement);
        let name = tree.variable_name(callee)?.to_string();
        let column_type = column_type(tree, *args.first()?);
        let list = args
            .get(1)
            .copied()
            .filter(|l| matches!(tree.kind(*l), SyntaxNodeKind::ListExpression { .. }));

        let mut column = Column {
            name,
            column_type,
            token: TokenSpan::of(tree, statement),
            inline_refs: Vec::new(),
            pk: false,
            unique: false,
            not_null: None,
            increment: false,
            dbdefault: None,
            note: None,
            checks: Vec::new(),
        };
        for setting in settings_of(tree, list) {
            match setting.name.as_deref() {
                Some("pk" | "primary key") => column.pk = true,
                Some("unique") => column.unique = true,
                Some("not null") => column.not_null = Some(true),
                Some("null") => column.not_null = Some(false),
                Some("increment") => column.increment = true,
                Some("note") => column.note = note_setting(tree, &setting),
                Some("default") => column.dbdefault = setting.value.and_then(|v| default_value(tree, v)),
                Some("check") => {
                    if let Some(expression) = setting.value.and_then(|v| tree.function_expression(v)) {
                        column.checks.push(Check {
                            expression: expression.to_string(),
                            name: None,
                            token: TokenSpan::of(tree, setting.attribute),
                        });
                    }
                }
                Some("ref") => {
                    if let Some(pending) = setting.value.and_then(|v| inline_ref(tree, v)) {
                        column.inline_refs.push(pending.inline.clone());
                        self.inline_refs.entry(statement).or_default().push(pending);
                    }
                }
                _ => {}
            }
        }
        Some(column)
    }

    /// Merge every table with the partials it injects. Later injections win
    /// over earlier ones for the same column name; direct columns always
    /// win.
    pub(super) fn merge_partials(&mut self) {
        for entry in self.tables.values_mut() {
            let partial_slots: Vec<&String> = entry
                .layout
                .iter()
                .filter_map(|slot| match slot {
                    Slot::Partial(name) => Some(name),
                    Slot::Column(_) => None,
                })
                .collect();

            let direct: HashSet<&str> = entry.table.fields.iter().map(|c| c.name.as_str()).collect();
            let mut seen: HashSet<String> = HashSet::new();
            let mut chosen: Vec<Vec<(Column, NodeId)>> = vec![Vec::new(); partial_slots.len()];
            for (i, name) in partial_slots.iter().enumerate().rev() {
                let Some(partial) = self.partials.get(*name) else {
                    continue;
                };
                for (column, node) in partial.partial.fields.iter().zip(&partial.column_nodes) {
                    if direct.contains(column.name.as_str()) || !seen.insert(column.name.clone()) {
                        continue;
                    }
                    chosen[i].push((column.clone(), *node));
                }
            }

            let mut fields = Vec::new();
            let mut nodes = Vec::new();
            let mut partial_index = 0;
            for slot in &entry.layout {
                match slot {
                    Slot::Column(i) => {
                        fields.push(entry.table.fields[*i].clone());
                        nodes.push(entry.column_nodes[*i]);
                    }
                    Slot::Partial(_) => {
                        for (column, node) in &chosen[partial_index] {
                            fields.push(column.clone());
                            nodes.push(*node);
                        }
                        partial_index += 1;
                    }
                }
            }

            let mut inline_ref_order = entry.column_nodes.clone();
            for picked in chosen.iter().rev() {
                inline_ref_order.extend(picked.iter().map(|(_, node)| *node));
            }

            for name in &partial_slots {
                let Some(partial) = self.partials.get(*name) else {
                    continue;
                };
                entry.table.indexes.extend(partial.partial.indexes.iter().cloned());
                entry.table.checks.extend(partial.partial.checks.iter().cloned());
            }
            if entry.table.header_color.is_none() {
                entry.table.header_color = partial_slots
                    .iter()
                    .rev()
                    .filter_map(|n| self.partials.get(*n))
                    .find_map(|p| p.partial.header_color.clone());
            }
            if entry.table.note.is_none() {
                entry.table.note = partial_slots
                    .iter()
                    .rev()
                    .filter_map(|n| self.partials.get(*n))
                    .find_map(|p| p.partial.note.clone());
            }

            entry.table.fields = fields;
            entry.merged_nodes = nodes;
            entry.inline_ref_order = inline_ref_order;
        }
    }

    /// Flag column types naming a declared enum. Runs after every element
    /// is interpreted so enums declared later still count.
    pub(super) fn mark_enum_columns(&mut self) {
        let default_schema = self.config.default_schema.clone();
        let scoped = |schema: &Option<String>| {
            schema_scope(schema.as_deref(), &default_schema).map(str::to_string)
        };
        let enums: HashSet<(Option<String>, String)> = self
            .db
            .enums
            .iter()
            .map(|e| (scoped(&e.schema_name), e.name.clone()))
            .collect();
        let is_enum = |t: &ColumnType| enums.contains(&(scoped(&t.schema_name), t.base_name.clone()));
        for entry in self.tables.values_mut() {
            for column in &mut entry.table.fields {
                column.column_type.is_enum = is_enum(&column.column_type);
            }
        }
        for entry in self.partials.values_mut() {
            for column in &mut entry.partial.fields {
                column.column_type.is_enum = is_enum(&column.column_type);
            }
        }
    }
}

fn note_setting(tree: &SyntaxTree, setting: &Setting) -> Option<Note> {
    let value = setting.value?;
    Some(Note {
        value: tree.string_literal(value)?.to_string(),
        token: TokenSpan::of(tree, setting.attribute),
    })
}

/// Peel array and call wrappers off a column type: `varchar(10)[3][2]`
/// has base name `varchar`, arguments `10` and suffix `[3][2]`.
pub(crate) fn column_type(tree: &SyntaxTree, node: NodeId) -> ColumnType {
    let mut node = node;
    let mut suffix = String::new();
    while let SyntaxNodeKind::Array {
        expression,
        indexer,
    } = tree.kind(node)
    {
        let size = tree
            .attributes_of(Some(*indexer))
            .first()
            .and_then(|a| match tree.kind(*a) {
                SyntaxNodeKind::Attribute { name, .. } => signed_number(tree, *name),
                _ => None,
            })
            .unwrap_or_default();
        suffix = format!("[{}]{}", size, suffix);
        node = *expression;
    }

    let mut args = Vec::new();
    if let SyntaxNodeKind::CallExpression { callee, arguments } = tree.kind(node) {
        args = tree
            .tuple_elements(*arguments)
            .unwrap_or_default()
            .iter()
            .filter_map(|a| type_argument(tree, *a))
            .collect();
        node = *callee;
    }

    let names = tree.complex_variable_names(node).unwrap_or_default();
    let (schema_name, base_name) = split_qualified(names);
    let args_text = (!args.is_empty()).then(|| args.join(","));
    let type_name = match &args_text {
        Some(a) => format!("{}({}){}", base_name, a, suffix),
        None => format!("{}{}", base_name, suffix),
    };
    let numbers: Vec<u32> = args.iter().filter_map(|a| a.parse().ok()).collect();
    let (numeric_params, length_param) = match (args.len(), numbers.as_slice()) {
        (2, [precision, scale]) => (
            Some(NumericParams {
                precision: *precision,
                scale: *scale,
            }),
            None,
        ),
        (1, [length]) => (None, Some(LengthParam { length: *length })),
        _ => (None, None),
    };

    ColumnType {
        schema_name,
        type_name,
        base_name,
        args: args_text,
        numeric_params,
        length_param,
        is_enum: false,
    }
}

fn type_argument(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    signed_number(tree, node)
        .or_else(|| tree.variable_name(node).map(str::to_string))
        .or_else(|| tree.string_literal(node).map(|s| format!("'{}'", s)))
}

fn default_value(tree: &SyntaxTree, node: NodeId) -> Option<DefaultValue> {
    if let Some(text) = tree.string_literal(node) {
        return Some(DefaultValue {
            kind: DefaultType::String,
            value: Value::String(text.to_string()),
        });
    }
    if let Some(number) = signed_number(tree, node) {
        return Some(DefaultValue {
            kind: DefaultType::Number,
            value: number_value(&number),
        });
    }
    if let Some(keyword) = keyword_value(tree, node) {
        return Some(DefaultValue {
            kind: DefaultType::Boolean,
            value: Value::String(keyword.to_string()),
        });
    }
    if let Some(expression) = tree.function_expression(node) {
        return Some(DefaultValue {
            kind: DefaultType::Expression,
            value: Value::String(expression.to_string()),
        });
    }
    // Enum member access: the default is the member name
    let member = tree.complex_variable_names(node)?.pop()?;
    Some(DefaultValue {
        kind: DefaultType::String,
        value: Value::String(member),
    })
}

/// JSON number for numeric literal text, integral when possible.
pub(crate) fn number_value(text: &str) -> Value {
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

fn inline_ref(tree: &SyntaxTree, value: NodeId) -> Option<PendingInlineRef> {
    let SyntaxNodeKind::PrefixExpression { op, expression } = tree.kind(value) else {
        return None;
    };
    let op = relationship_op(tree, *op)?.to_string();
    let (path, columns) = endpoint_parts(tree, *expression)?;
    let segments = tree.member_access_segments(*expression)?;
    let table_node = segments.get(segments.len().checked_sub(2)?)?;
    let (schema_name, table_name) = split_qualified(path);
    let field_names = columns
        .iter()
        .filter_map(|c| tree.variable_name(*c).map(str::to_string))
        .collect();
    Some(PendingInlineRef {
        target_table: tree.node(*table_node).referee,
        op: op.clone(),
        inline: InlineRef {
            schema_name,
            table_name,
            field_names,
            relation: op,
            token: TokenSpan::of(tree, value),
        },
    })
}

fn interpret_index(tree: &SyntaxTree, statement: NodeId) -> Option<Index> {
    if tree.element(statement).is_some() {
        return None;
    }
    let (callee, args) = tree.statement_parts(statement);
    let targets = tree.tuple_elements(callee).unwrap_or_else(|| vec![callee]);
    let columns = targets
        .iter()
        .filter_map(|t| {
            let (kind, value) = match (tree.variable_name(*t), tree.function_expression(*t)) {
                (Some(name), _) => (IndexColumnKind::Column, name),
                (None, Some(expression)) => (IndexColumnKind::Expression, expression),
                _ => return None,
            };
            Some(IndexColumn {
                kind,
                value: value.to_string(),
                token: TokenSpan::of(tree, *t),
            })
        })
        .collect();

    let settings = settings_of(tree, args.first().copied());
    let string_setting = |name: &str| {
        find_setting(&settings, name)
            .and_then(|s| s.value)
            .and_then(|v| tree.string_literal(v))
            .map(str::to_string)
    };
    Some(Index {
        columns,
        token: TokenSpan::of(tree, statement),
        pk: find_setting(&settings, "pk").is_some(),
        unique: find_setting(&settings, "unique").is_some(),
        name: string_setting("name"),
        index_type: find_setting(&settings, "type")
            .and_then(|s| s.value)
            .and_then(|v| tree.variable_name(v))
            .map(str::to_string),
        note: find_setting(&settings, "note").and_then(|s| note_setting(tree, s)),
    })
}
