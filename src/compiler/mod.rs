//! The compiler façade.
//!
//! A `Compiler` owns one source text and memoises every pass over it, plus
//! the offset queries editor services are built on. Replacing the source
//! drops the whole cache.

mod cache;
mod format;
mod services;

use tracing::debug;

use crate::analyzer::symbol::{SymbolArena, SymbolId};
use crate::analyzer::{analyze, Analysis};
use crate::ast::{NodeId, SyntaxTree};
use crate::config::CompilerConfig;
use crate::error::{CompileError, Report, WireError};
use crate::interpreter::{interpret, Database};
use crate::lexer::token::SyntaxToken;
use crate::lexer::Lexer;
use crate::parser::Parser;
use cache::QueryCache;

pub use format::{parse_with_format, DialectImporter, ImporterRegistry, InputFormat};
pub use services::{CompletionItem, CompletionKind, Hover};

/// Everything one compilation produced.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub ast: SyntaxTree,
    pub tokens: Vec<SyntaxToken>,
    /// Present whenever interpretation ran
    pub database: Option<Database>,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompileError>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn wire_errors(&self) -> Vec<WireError> {
        self.errors.iter().map(CompileError::to_wire).collect()
    }

    pub fn wire_warnings(&self) -> Vec<WireError> {
        self.warnings.iter().map(CompileError::to_wire).collect()
    }
}

/// Compile DBML source with the default configuration.
pub fn compile(source: &str) -> CompileResult {
    compile_with(source, &CompilerConfig::default())
}

pub fn compile_with(source: &str, config: &CompilerConfig) -> CompileResult {
    let mut compiler = Compiler::new(config.clone());
    compiler.set_source(source);
    compiler.result()
}

pub struct Compiler {
    config: CompilerConfig,
    source: String,
    cache: QueryCache,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            source: String::new(),
            cache: QueryCache::default(),
        }
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.cache = QueryCache::default();
        debug!(bytes = self.source.len(), "source replaced");
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn lex(&self) -> &Report<Vec<SyntaxToken>> {
        self.cache.lex.get_or_init(|| Lexer::new(&self.source).tokenize())
    }

    /// Syntax tree with lexer and parser diagnostics merged.
    pub fn parse(&self) -> &Report<SyntaxTree> {
        self.cache.parse.get_or_init(|| {
            let lexed = self.lex();
            let mut report = Parser::new(lexed.value.clone()).parse();
            let mut errors = lexed.errors.clone();
            errors.append(&mut report.errors);
            report.errors = errors;
            report
        })
    }

    /// `None` when parsing reported errors.
    pub fn analyze(&self) -> Option<&Report<Analysis>> {
        self.cache
            .analyze
            .get_or_init(|| {
                let parsed = self.parse();
                if parsed.has_errors() {
                    debug!(errors = parsed.errors.len(), "skipping analysis");
                    return None;
                }
                Some(analyze(parsed.value.clone(), &self.config))
            })
            .as_ref()
    }

    /// `None` when parsing or analysis reported errors.
    pub fn interpret(&self) -> Option<&Report<Database>> {
        self.cache
            .interpret
            .get_or_init(|| {
                let analysis = self.analyze()?;
                if analysis.has_errors() {
                    debug!(errors = analysis.errors.len(), "skipping interpretation");
                    return None;
                }
                Some(interpret(&analysis.value, &self.config))
            })
            .as_ref()
    }

    /// Diagnostics of every pass that ran, in pass order.
    pub fn errors(&self) -> Vec<CompileError> {
        let mut errors = self.parse().errors.clone();
        if let Some(analysis) = self.analyze() {
            errors.extend(analysis.errors.iter().cloned());
        }
        if let Some(database) = self.interpret() {
            errors.extend(database.errors.iter().cloned());
        }
        errors
    }

    pub fn warnings(&self) -> Vec<CompileError> {
        self.interpret()
            .map(|report| report.warnings.clone())
            .unwrap_or_default()
    }

    pub fn result(&self) -> CompileResult {
        let ast = match self.analyze() {
            Some(report) => report.value.tree.clone(),
            None => self.parse().value.clone(),
        };
        CompileResult {
            ast,
            tokens: self.lex().value.clone(),
            database: self.interpret().map(|report| report.value.clone()),
            errors: self.errors(),
            warnings: self.warnings(),
        }
    }

    /// Analysis that offset queries run against. When parsing failed the
    /// recovered tree is analysed anyway and its diagnostics are dropped,
    /// so editor services keep working on incomplete text.
    pub(crate) fn editor_analysis(&self) -> &Analysis {
        match self.analyze() {
            Some(report) => &report.value,
            None => self.cache.recovered.get_or_init(|| {
                debug!("analysing recovered tree for editor queries");
                analyze(self.parse().value.clone(), &self.config).value
            }),
        }
    }

    pub fn syntax_tree(&self) -> &SyntaxTree {
        &self.editor_analysis().tree
    }

    pub fn symbols(&self) -> &SymbolArena {
        &self.editor_analysis().symbols
    }

    /// Significant token whose span, trivia included, contains `offset`.
    pub fn token_at(&self, offset: usize) -> Option<&SyntaxToken> {
        let id = self
            .cache
            .token_at
            .get_or_compute(offset, || self.syntax_tree().token_at(offset));
        id.map(|id| self.syntax_tree().token(id))
    }

    /// Element declarations containing `offset`, outermost first.
    pub fn container_stack(&self, offset: usize) -> Vec<NodeId> {
        self.cache
            .container_stack
            .get_or_compute(offset, || self.syntax_tree().element_stack_at(offset))
    }

    pub fn node_at(&self, offset: usize) -> Option<NodeId> {
        self.cache
            .node_at
            .get_or_compute(offset, || self.syntax_tree().innermost_node_at(offset))
    }

    /// Symbol under `offset`: the nearest bound reference, else the nearest
    /// enclosing declaration.
    pub fn symbol_at(&self, offset: usize) -> Option<SymbolId> {
        self.symbol_site(offset).map(|(symbol, _)| symbol)
    }

    pub(crate) fn symbol_site(&self, offset: usize) -> Option<(SymbolId, NodeId)> {
        self.cache.symbol_at.get_or_compute(offset, || {
            let tree = self.syntax_tree();
            let mut current = self.node_at(offset);
            while let Some(node) = current {
                if node == tree.root {
                    break;
                }
                let n = tree.node(node);
                if let Some(symbol) = n.referee.or(n.symbol) {
                    return Some((symbol, node));
                }
                current = n.parent;
            }
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::symbol::SymbolKind;
    use crate::error::CompileErrorCode;

    const SOURCE: &str = "Table users {\n  id int [pk]\n}\nTable posts {\n  user_id int [ref: > users.id]\n}\n";

    fn compiler(source: &str) -> Compiler {
        let mut compiler = Compiler::new(CompilerConfig::default());
        compiler.set_source(source);
        compiler
    }

    #[test]
    fn test_passes_are_memoised() {
        let c = compiler(SOURCE);
        assert!(std::ptr::eq(c.lex(), c.lex()));
        assert!(std::ptr::eq(c.parse(), c.parse()));
        let first = c.interpret().unwrap();
        let second = c.interpret().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.value.tables.len(), 2);
    }

    #[test]
    fn test_set_source_drops_cache() {
        let mut c = compiler(SOURCE);
        assert_eq!(c.interpret().unwrap().value.tables.len(), 2);
        assert!(c.node_at(3).is_some());

        c.set_source("Enum e {\n  a\n}\n");
        assert_eq!(c.cache.node_at.len(), 0);
        let db = &c.interpret().unwrap().value;
        assert!(db.tables.is_empty());
        assert_eq!(db.enums.len(), 1);
    }

    #[test]
    fn test_parse_errors_short_circuit() {
        let c = compiler("Table users {\n  id int\n");
        assert!(c.parse().has_errors());
        assert!(c.analyze().is_none());
        assert!(c.interpret().is_none());
        let result = c.result();
        assert!(result.database.is_none());
        assert_eq!(result.errors.len(), c.parse().errors.len());
    }

    #[test]
    fn test_analysis_errors_block_interpretation() {
        let c = compiler("Table a {\n  id int [ref: > ghost.id]\n}\n");
        assert!(c.analyze().unwrap().has_errors());
        assert!(c.interpret().is_none());
        let result = c.result();
        assert_eq!(result.errors[0].code, CompileErrorCode::BindingError);
        assert!(result.database.is_none());
    }

    #[test]
    fn test_compile_result() {
        let result = compile(SOURCE);
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
        let db = result.database.unwrap();
        assert_eq!(db.refs.len(), 1);
        assert_eq!(result.tokens.last().map(|t| t.kind), Some(crate::lexer::token::SyntaxTokenKind::Eof));
    }

    #[test]
    fn test_offset_queries() {
        let c = compiler(SOURCE);
        let offset = SOURCE.find("users.id").unwrap() + 1;
        assert_eq!(c.token_at(offset).map(|t| t.value.as_str()), Some("users"));

        let stack = c.container_stack(offset);
        assert_eq!(stack.len(), 1);
        assert_eq!(c.syntax_tree().element_kind(stack[0]), Some(crate::ast::ElementKind::Table));

        let symbol = c.symbol_at(offset).unwrap();
        assert_eq!(c.symbols().get(symbol).kind, SymbolKind::Table);

        let column = SOURCE.find("id int").unwrap();
        let symbol = c.symbol_at(column).unwrap();
        assert_eq!(c.symbols().get(symbol).kind, SymbolKind::Column);
        assert_eq!(c.symbol_at(0).map(|s| c.symbols().get(s).kind), Some(SymbolKind::Table));
    }

    #[test]
    fn test_offset_queries_survive_parse_errors() {
        let source = "Table users {\n  id int\n}\nRef: users.id > users.id\nTable broken {\n";
        let c = compiler(source);
        assert!(c.parse().has_errors());
        assert!(c.analyze().is_none());
        let offset = source.find("users.id").unwrap() + 2;
        let symbol = c.symbol_at(offset).unwrap();
        assert_eq!(c.symbols().get(symbol).kind, SymbolKind::Table);
    }
}
