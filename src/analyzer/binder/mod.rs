//! Reference resolution.
//!
//! Runs after validation has registered every symbol. Partial injections
//! are resolved for all tables first, so that column lookups anywhere can
//! see injected columns; then each element kind's `ElementBinder` resolves
//! the names it references.

mod elements;

use crate::analyzer::symbol::{NodeSymbolIndex, SymbolArena, SymbolId, SymbolKind};
use crate::analyzer::validator::injected_partial_name;
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileErrorCode, NodeOrToken};

pub(crate) trait ElementBinder: Sync {
    fn bind(&self, b: &mut Binder<'_>, element: NodeId, scopes: &[SymbolId]);
}

static BINDERS: [(ElementKind, &dyn ElementBinder); 7] = [
    (ElementKind::Table, &elements::TableBinder),
    (ElementKind::TablePartial, &elements::TableBinder),
    (ElementKind::Ref, &elements::RefBinder),
    (ElementKind::TableGroup, &elements::TableGroupBinder),
    (ElementKind::Records, &elements::RecordsBinder),
    (ElementKind::Indexes, &elements::IndexesBinder),
    (ElementKind::Project, &elements::ProjectBinder),
];

fn pick_binder(kind: ElementKind) -> Option<&'static dyn ElementBinder> {
    BINDERS.iter().find(|(k, _)| *k == kind).map(|(_, b)| *b)
}

pub(crate) struct Binder<'a> {
    pub tree: &'a mut SyntaxTree,
    pub symbols: &'a mut SymbolArena,
    pub config: &'a CompilerConfig,
    pub program: SymbolId,
    pub errors: Vec<CompileError>,
}

impl<'a> Binder<'a> {
    pub fn new(
        tree: &'a mut SyntaxTree,
        symbols: &'a mut SymbolArena,
        config: &'a CompilerConfig,
        program: SymbolId,
    ) -> Self {
        Self {
            tree,
            symbols,
            config,
            program,
            errors: Vec::new(),
        }
    }

    /// Top-level elements, including those nested in a Project.
    fn top_level_elements(&self) -> Vec<NodeId> {
        let body = match self.tree.kind(self.tree.root) {
            SyntaxNodeKind::Program { body, .. } => body.clone(),
            _ => Vec::new(),
        };
        let mut elements = Vec::new();
        for element in body {
            elements.push(element);
            if self.tree.element_kind(element) == Some(ElementKind::Project) {
                elements.extend(
                    self.tree
                        .block_body(element)
                        .iter()
                        .filter(|s| self.tree.element(**s).is_some()),
                );
            }
        }
        elements
    }

    pub fn bind_program(&mut self) {
        let elements = self.top_level_elements();
        for element in &elements {
            if self.tree.element_kind(*element) == Some(ElementKind::Table) {
                self.resolve_partial_injections(*element);
            }
        }

        let program = self.program;
        let body = match self.tree.kind(self.tree.root) {
            SyntaxNodeKind::Program { body, .. } => body.clone(),
            _ => Vec::new(),
        };
        for element in body {
            self.bind_element(element, &[program]);
        }
    }

    pub fn bind_element(&mut self, element: NodeId, scopes: &[SymbolId]) {
        let Some(kind) = self.tree.element_kind(element) else {
            return;
        };
        if let Some(binder) = pick_binder(kind) {
            binder.bind(self, element, scopes);
        }
    }

    /// Copy every column of each `~partial` into the table's scope as an
    /// injected column. Later injections override earlier ones; direct
    /// columns are never overridden.
    pub fn resolve_partial_injections(&mut self, table: NodeId) {
        let Some(table_symbol) = self.tree.node(table).symbol else {
            return;
        };
        let program = self.program;
        let statements = self.tree.block_body(table).to_vec();
        for statement in statements {
            let Some(name) = injected_partial_name(self.tree, statement) else {
                continue;
            };
            let operand = match self.tree.kind(statement) {
                SyntaxNodeKind::PrefixExpression { expression, .. } => *expression,
                _ => continue,
            };
            let index = NodeSymbolIndex::new(SymbolKind::TablePartial, name.clone());
            let Some(partial) = self.symbols.lookup(program, &index) else {
                self.binding_error(format!("TablePartial '{}' does not exist", name), operand);
                continue;
            };
            self.bind_node(operand, partial);

            let columns: Vec<(NodeSymbolIndex, SymbolId)> = self
                .symbols
                .table(partial)
                .map(|t| {
                    t.iter()
                        .filter(|(k, _)| k.kind == SymbolKind::Column)
                        .map(|(k, v)| (k.clone(), v))
                        .collect()
                })
                .unwrap_or_default();
            for (key, column) in columns {
                let direct = self
                    .symbols
                    .lookup(table_symbol, &key)
                    .is_some_and(|s| self.symbols.get(s).kind == SymbolKind::Column);
                if direct {
                    continue;
                }
                let declaration = self.symbols.get(column).declaration;
                let injected = self.symbols.create(SymbolKind::InjectedColumn, declaration);
                self.symbols.get_mut(injected).injected_from = Some(column);
                if let Some(scope) = self.symbols.table_mut(table_symbol) {
                    scope.overwrite(key, injected);
                }
            }
        }
    }

    pub fn binding_error(&mut self, message: String, node: NodeId) {
        let n = self.tree.node(node);
        let (start, end) = (n.start, n.end);
        self.errors.push(CompileError::new(
            CompileErrorCode::BindingError,
            message,
            NodeOrToken::Node(node),
            start,
            end,
        ));
    }

    /// Link a referencing node and its symbol in both directions.
    pub fn bind_node(&mut self, node: NodeId, symbol: SymbolId) {
        let slot = &mut self.tree.node_mut(node).referee;
        if slot.is_some() {
            return;
        }
        *slot = Some(symbol);
        self.symbols.get_mut(symbol).references.push(node);
    }

    /// Resolve a chain of name segments. The first segment is looked up
    /// through `scopes` (innermost first), every following segment inside
    /// the previous segment's own table. Resolved prefixes are bound even
    /// when a later segment fails. Errors are only reported when `report`
    /// is set.
    pub fn lookup_and_bind_in_scope(
        &mut self,
        scopes: &[SymbolId],
        segments: &[(NodeId, SymbolKind)],
        report: bool,
    ) -> Option<Vec<SymbolId>> {
        let mut segments = segments;
        let program = [self.program];
        let mut scopes = scopes;
        if let Some((first, SymbolKind::Schema)) = segments.first() {
            let is_default = self.tree.variable_name(*first) == Some(self.config.default_schema.as_str());
            let declared = self
                .symbols
                .lookup(
                    self.program,
                    &NodeSymbolIndex::new(SymbolKind::Schema, self.config.default_schema.clone()),
                )
                .is_some();
            if is_default && !declared {
                segments = &segments[1..];
                scopes = &program;
            }
        }

        let mut resolved = Vec::with_capacity(segments.len());
        let mut previous: Option<(SymbolId, String, SymbolKind)> = None;
        for (node, kind) in segments {
            let Some(name) = self.tree.variable_name(*node).map(str::to_string) else {
                return None;
            };
            let index = NodeSymbolIndex::new(*kind, name.clone());
            let found = match &previous {
                None => scopes.iter().find_map(|s| self.symbols.lookup(*s, &index)),
                Some((owner, _, _)) => self.symbols.lookup(*owner, &index),
            };
            let Some(symbol) = found else {
                if report {
                    let message = match &previous {
                        None => format!("{} '{}' does not exist", capitalize(kind.describe()), name),
                        Some((_, owner_name, owner_kind)) => format!(
                            "{} '{}' does not exist in {} '{}'",
                            capitalize(kind.describe()),
                            name,
                            owner_kind.describe(),
                            owner_name
                        ),
                    };
                    self.binding_error(message, *node);
                }
                return None;
            };
            self.bind_node(*node, symbol);
            resolved.push(symbol);
            previous = Some((symbol, name, *kind));
        }
        Some(resolved)
    }

    /// Pair dotted name segments with the kinds they resolve to: the last
    /// segments take `kinds_from_end`, every earlier one is a schema.
    pub fn qualified_segments(&self, nodes: &[NodeId], kinds_from_end: &[SymbolKind]) -> Vec<(NodeId, SymbolKind)> {
        let schema_count = nodes.len().saturating_sub(kinds_from_end.len());
        nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let kind = if i < schema_count {
                    SymbolKind::Schema
                } else {
                    kinds_from_end[i - schema_count]
                };
                (*node, kind)
            })
            .collect()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
