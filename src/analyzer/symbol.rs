//! Symbols and scoped symbol tables.
//!
//! Symbols live in a `SymbolArena` and are addressed by `SymbolId`. A
//! symbol records the node that declares it and every node that refers to
//! it; nodes point back through `symbol` / `referee`. Scopes are symbol
//! tables owned by the symbol that opens them (program, schema, table,
//! enum, table group, table partial).

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

use crate::ast::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Schema,
    Table,
    Column,
    Enum,
    EnumField,
    TableGroup,
    TableGroupField,
    TablePartial,
    PartialInjection,
    /// A column copied into a table from a `~partial`
    InjectedColumn,
}

impl SymbolKind {
    /// Kind used in table keys. Injected columns share the `Column` key so
    /// they resolve like direct columns.
    pub fn index_kind(self) -> SymbolKind {
        match self {
            SymbolKind::InjectedColumn => SymbolKind::Column,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Schema => "Schema",
            SymbolKind::Table => "Table",
            SymbolKind::Column => "Column",
            SymbolKind::Enum => "Enum",
            SymbolKind::EnumField => "EnumField",
            SymbolKind::TableGroup => "TableGroup",
            SymbolKind::TableGroupField => "TableGroupField",
            SymbolKind::TablePartial => "TablePartial",
            SymbolKind::PartialInjection => "PartialInjection",
            SymbolKind::InjectedColumn => "InjectedColumn",
        }
    }

    /// Lowercase noun used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::Schema => "schema",
            SymbolKind::Table => "table",
            SymbolKind::Column | SymbolKind::InjectedColumn => "column",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumField => "enum field",
            SymbolKind::TableGroup => "table group",
            SymbolKind::TableGroupField => "table group field",
            SymbolKind::TablePartial => "table partial",
            SymbolKind::PartialInjection => "partial injection",
        }
    }

    const INDEXABLE: [SymbolKind; 9] = [
        SymbolKind::Schema,
        SymbolKind::Table,
        SymbolKind::Column,
        SymbolKind::Enum,
        SymbolKind::EnumField,
        SymbolKind::TableGroup,
        SymbolKind::TableGroupField,
        SymbolKind::TablePartial,
        SymbolKind::PartialInjection,
    ];
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymbolKind::INDEXABLE
            .iter()
            .chain(std::iter::once(&SymbolKind::InjectedColumn))
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown symbol kind: {}", s))
    }
}

/// Key of a symbol inside a scope: `"{Kind}:{name}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeSymbolIndex {
    pub kind: SymbolKind,
    pub name: String,
}

impl NodeSymbolIndex {
    pub fn new(kind: SymbolKind, name: impl Into<String>) -> Self {
        Self {
            kind: kind.index_kind(),
            name: name.into(),
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        let (kind, name) = key.split_once(':')?;
        Some(Self::new(kind.parse().ok()?, name))
    }
}

impl fmt::Display for NodeSymbolIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)
    }
}

/// Every kind-qualified key a bare name could be stored under.
pub fn generate_possible_indexes(name: &str) -> Vec<NodeSymbolIndex> {
    SymbolKind::INDEXABLE
        .iter()
        .map(|kind| NodeSymbolIndex::new(*kind, name))
        .collect()
}

/// One scope. Entries keep declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    entries: IndexMap<NodeSymbolIndex, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. Returns the existing symbol if the key is taken.
    pub fn insert(&mut self, index: NodeSymbolIndex, symbol: SymbolId) -> Result<(), SymbolId> {
        match self.entries.get(&index) {
            Some(existing) => Err(*existing),
            None => {
                self.entries.insert(index, symbol);
                Ok(())
            }
        }
    }

    /// Replace (or add) an entry, keeping its original position.
    pub fn overwrite(&mut self, index: NodeSymbolIndex, symbol: SymbolId) {
        self.entries.insert(index, symbol);
    }

    pub fn get(&self, index: &NodeSymbolIndex) -> Option<SymbolId> {
        self.entries.get(index).copied()
    }

    pub fn contains(&self, index: &NodeSymbolIndex) -> bool {
        self.entries.contains_key(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeSymbolIndex, SymbolId)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSymbol {
    pub id: SymbolId,
    pub kind: SymbolKind,
    /// Node that introduced this symbol
    pub declaration: Option<NodeId>,
    /// Nodes bound to this symbol
    pub references: Vec<NodeId>,
    /// Nested scope, for kinds that open one
    pub symbol_table: Option<SymbolTable>,
    /// For injected columns, the partial's column symbol they copy
    pub injected_from: Option<SymbolId>,
}

/// Hands out monotonically increasing symbol ids.
#[derive(Debug, Clone, Default)]
pub struct SymbolFactory {
    next: u32,
}

impl SymbolFactory {
    pub fn next_id(&mut self) -> SymbolId {
        let id = SymbolId(self.next);
        self.next += 1;
        id
    }
}

/// Owner of every symbol created during one analysis.
#[derive(Debug, Clone, Default)]
pub struct SymbolArena {
    factory: SymbolFactory,
    symbols: Vec<NodeSymbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: SymbolKind, declaration: Option<NodeId>) -> SymbolId {
        let id = self.factory.next_id();
        let symbol_table = matches!(
            kind,
            SymbolKind::Schema
                | SymbolKind::Table
                | SymbolKind::Enum
                | SymbolKind::TableGroup
                | SymbolKind::TablePartial
        )
        .then(SymbolTable::new);
        self.symbols.push(NodeSymbol {
            id,
            kind,
            declaration,
            references: Vec::new(),
            symbol_table,
            injected_from: None,
        });
        id
    }

    pub fn get(&self, id: SymbolId) -> &NodeSymbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut NodeSymbol {
        &mut self.symbols[id.index()]
    }

    pub fn table(&self, id: SymbolId) -> Option<&SymbolTable> {
        self.get(id).symbol_table.as_ref()
    }

    pub fn table_mut(&mut self, id: SymbolId) -> Option<&mut SymbolTable> {
        self.get_mut(id).symbol_table.as_mut()
    }

    /// Look `index` up directly in the scope of `scope`.
    pub fn lookup(&self, scope: SymbolId, index: &NodeSymbolIndex) -> Option<SymbolId> {
        self.table(scope).and_then(|t| t.get(index))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeSymbol> {
        self.symbols.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let index = NodeSymbolIndex::new(SymbolKind::Table, "users");
        assert_eq!(index.to_string(), "Table:users");
        assert_eq!(NodeSymbolIndex::parse("Table:users"), Some(index));
        assert_eq!(NodeSymbolIndex::parse("Nope:users"), None);
        assert_eq!(NodeSymbolIndex::parse("users"), None);
    }

    #[test]
    fn test_injected_column_uses_column_key() {
        let index = NodeSymbolIndex::new(SymbolKind::InjectedColumn, "id");
        assert_eq!(index.to_string(), "Column:id");
    }

    #[test]
    fn test_generate_possible_indexes() {
        let keys: Vec<String> = generate_possible_indexes("foo")
            .iter()
            .map(|i| i.to_string())
            .collect();
        assert!(keys.contains(&"Table:foo".to_string()));
        assert!(keys.contains(&"Enum:foo".to_string()));
        assert!(keys.contains(&"Schema:foo".to_string()));
        assert!(!keys.iter().any(|k| k.starts_with("InjectedColumn")));
    }

    #[test]
    fn test_symbol_table_keeps_declaration_order() {
        let mut arena = SymbolArena::new();
        let mut table = SymbolTable::new();
        for name in ["b", "a", "c"] {
            let id = arena.create(SymbolKind::Column, None);
            table
                .insert(NodeSymbolIndex::new(SymbolKind::Column, name), id)
                .unwrap();
        }
        let names: Vec<&str> = table.iter().map(|(k, _)| k.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);

        let dup = arena.create(SymbolKind::Column, None);
        assert!(table
            .insert(NodeSymbolIndex::new(SymbolKind::Column, "a"), dup)
            .is_err());
        table.overwrite(NodeSymbolIndex::new(SymbolKind::Column, "a"), dup);
        assert_eq!(
            table.get(&NodeSymbolIndex::new(SymbolKind::Column, "a")),
            Some(dup)
        );
        let names: Vec<&str> = table.iter().map(|(k, _)| k.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_factory_ids_are_monotonic() {
        let mut arena = SymbolArena::new();
        let a = arena.create(SymbolKind::Table, None);
        let b = arena.create(SymbolKind::Enum, None);
        assert!(a < b);
        assert!(arena.table(a).is_some());
        let c = arena.create(SymbolKind::Column, None);
        assert!(arena.table(c).is_none());
    }
}
