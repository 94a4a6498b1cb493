//! Memoised query results for one source text.
//!
//! Whole-document passes get one `OnceCell` slot each; offset queries get a
//! map keyed by offset. Nothing is invalidated piecemeal: a new source
//! replaces the whole cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::analyzer::symbol::SymbolId;
use crate::analyzer::Analysis;
use crate::ast::{NodeId, SyntaxTree};
use crate::error::Report;
use crate::interpreter::Database;
use crate::lexer::token::{SyntaxToken, TokenId};

pub(crate) struct QueryCache {
    pub lex: OnceCell<Report<Vec<SyntaxToken>>>,
    pub parse: OnceCell<Report<SyntaxTree>>,
    /// `None` when parsing reported errors
    pub analyze: OnceCell<Option<Report<Analysis>>>,
    /// `None` when parsing or analysis reported errors
    pub interpret: OnceCell<Option<Report<Database>>>,
    /// Analysis of the error-recovered tree, for editor services only
    pub recovered: OnceCell<Analysis>,
    pub token_at: OffsetCache<Option<TokenId>>,
    pub container_stack: OffsetCache<Vec<NodeId>>,
    pub node_at: OffsetCache<Option<NodeId>>,
    /// Symbol and the node that carries it
    pub symbol_at: OffsetCache<Option<(SymbolId, NodeId)>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self {
            lex: OnceCell::new(),
            parse: OnceCell::new(),
            analyze: OnceCell::new(),
            interpret: OnceCell::new(),
            recovered: OnceCell::new(),
            token_at: OffsetCache::new("token_at"),
            container_stack: OffsetCache::new("container_stack"),
            node_at: OffsetCache::new("node_at"),
            symbol_at: OffsetCache::new("symbol_at"),
        }
    }
}

/// Results of one offset query.
pub(crate) struct OffsetCache<V> {
    name: &'static str,
    entries: RefCell<HashMap<usize, V>>,
}

impl<V> OffsetCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RefCell::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl<V: Clone> OffsetCache<V> {
    /// Cached value for `offset`, computing it on a miss. `compute` may run
    /// other queries but must not re-enter this one.
    pub fn get_or_compute(&self, offset: usize, compute: impl FnOnce() -> V) -> V {
        memoize(&self.entries, self.name, offset, compute)
    }
}

fn memoize<K, V>(slot: &RefCell<HashMap<K, V>>, query: &str, key: K, compute: impl FnOnce() -> V) -> V
where
    K: Hash + Eq + Copy + std::fmt::Debug,
    V: Clone,
{
    if let Some(value) = slot.borrow().get(&key) {
        trace!(query, ?key, "cache hit");
        return value.clone();
    }
    trace!(query, ?key, "cache miss");
    let value = compute();
    slot.borrow_mut().insert(key, value.clone());
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_offset_cache_computes_once() {
        let cache: OffsetCache<Option<NodeId>> = OffsetCache::new("node_at");
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Some(NodeId(7))
        };
        assert_eq!(cache.get_or_compute(3, compute), Some(NodeId(7)));
        assert_eq!(cache.get_or_compute(3, || unreachable!()), Some(NodeId(7)));
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.get_or_compute(4, || None), None);
        assert_eq!(cache.len(), 2);
    }
}
