//! Turns an analyzed tree into a plain `Database`.
//!
//! Elements are interpreted one by one into an accumulator keyed by symbol.
//! Work that needs the whole program (partial merge, inline refs, enum
//! detection on column types, records) runs afterwards, in that order.

mod elements;
mod records;
mod refs;
mod table;
pub mod types;

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, debug_span};

use crate::analyzer::symbol::SymbolId;
use crate::analyzer::Analysis;
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileErrorCode, NodeOrToken, Report};
use records::RecordsSource;
use refs::{PendingInlineRef, RefRegistry};
use table::{PartialEntry, TableEntry};

pub use types::*;

pub fn interpret(analysis: &Analysis, config: &CompilerConfig) -> Report<Database> {
    let span = debug_span!("interpret");
    let _enter = span.enter();

    let interpreter = Interpreter::new(&analysis.tree, config);
    let report = interpreter.run();
    debug!(
        tables = report.value.tables.len(),
        refs = report.value.refs.len(),
        records = report.value.records.len(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "interpreted"
    );
    report
}

pub(crate) struct Interpreter<'a> {
    tree: &'a SyntaxTree,
    config: &'a CompilerConfig,
    db: Database,
    tables: IndexMap<SymbolId, TableEntry>,
    partials: IndexMap<String, PartialEntry>,
    refs: RefRegistry,
    /// Inline refs declared on a column, keyed by the column statement
    inline_refs: HashMap<NodeId, Vec<PendingInlineRef>>,
    records: Vec<RecordsSource>,
    errors: Vec<CompileError>,
    warnings: Vec<CompileError>,
}

impl<'a> Interpreter<'a> {
    fn new(tree: &'a SyntaxTree, config: &'a CompilerConfig) -> Self {
        Self {
            tree,
            config,
            db: Database::default(),
            tables: IndexMap::new(),
            partials: IndexMap::new(),
            refs: RefRegistry::default(),
            inline_refs: HashMap::new(),
            records: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn run(mut self) -> Report<Database> {
        let body = match self.tree.kind(self.tree.root) {
            SyntaxNodeKind::Program { body, .. } => body.clone(),
            _ => Vec::new(),
        };
        for element in body {
            self.interpret_element(element);
        }

        self.merge_partials();
        self.emit_inline_refs();
        self.mark_enum_columns();
        self.interpret_records();
        self.finish()
    }

    pub(crate) fn interpret_element(&mut self, element: NodeId) {
        let Some(kind) = self.tree.element_kind(element) else {
            return;
        };
        match kind {
            ElementKind::Table => self.interpret_table(element),
            ElementKind::TablePartial => self.interpret_partial(element),
            ElementKind::Enum => self.interpret_enum(element),
            ElementKind::Ref => self.interpret_ref(element),
            ElementKind::TableGroup => self.interpret_table_group(element),
            ElementKind::Note => self.interpret_sticky_note(element),
            ElementKind::Project => self.interpret_project(element),
            ElementKind::Records => self.records.push(RecordsSource {
                element,
                table: None,
            }),
            // Policies are validated only; other kinds only occur in a Project
            ElementKind::Policy
            | ElementKind::Indexes
            | ElementKind::Checks
            | ElementKind::Custom => {}
        }
    }

    fn finish(mut self) -> Report<Database> {
        let mut schemas: Vec<String> = Vec::new();
        let mut aliases = Vec::new();
        let mut tables = Vec::with_capacity(self.tables.len());
        for (_, entry) in std::mem::take(&mut self.tables) {
            let table = entry.table;
            if let Some(alias) = &table.alias {
                aliases.push(Alias {
                    name: alias.clone(),
                    kind: "table".to_string(),
                    value: AliasTarget {
                        table_name: table.name.clone(),
                        schema_name: table.schema_name.clone(),
                    },
                });
            }
            if let Some(schema) = &table.schema_name {
                if !schemas.contains(schema) {
                    schemas.push(schema.clone());
                }
            }
            tables.push(table);
        }
        for schema in self.db.enums.iter().filter_map(|e| e.schema_name.as_ref()) {
            if !schemas.contains(schema) {
                schemas.push(schema.clone());
            }
        }

        let mut db = std::mem::take(&mut self.db);
        db.schemas = schemas.into_iter().map(|name| Schema { name }).collect();
        db.tables = tables;
        db.aliases = aliases;
        db.refs = self.refs.into_refs();
        db.table_partials = self.partials.into_values().map(|p| p.partial).collect();
        Report::new(db, self.errors, self.warnings)
    }

    fn diagnostic(&self, code: CompileErrorCode, message: impl Into<String>, node: NodeId) -> CompileError {
        let n = self.tree.node(node);
        CompileError::new(code, message, NodeOrToken::Node(node), n.start, n.end)
    }

    fn error(&mut self, code: CompileErrorCode, message: impl Into<String>, node: NodeId) {
        let error = self.diagnostic(code, message, node);
        self.errors.push(error);
    }

    fn warn(&mut self, code: CompileErrorCode, message: impl Into<String>, node: NodeId) {
        let warning = self.diagnostic(code, message, node);
        self.warnings.push(warning);
    }
}

/// Split `[schema..., name]` into the schema qualifier and the name.
pub(crate) fn split_qualified(mut names: Vec<String>) -> (Option<String>, String) {
    let name = names.pop().unwrap_or_default();
    let schema = (!names.is_empty()).then(|| names.join("."));
    (schema, name)
}

/// The schema qualifier as the analyzer scopes it. A leading default schema
/// names the program scope, so `public.status` and `status` are one enum.
pub(crate) fn schema_scope<'s>(schema: Option<&'s str>, default_schema: &str) -> Option<&'s str> {
    schema.filter(|s| *s != default_schema)
}
