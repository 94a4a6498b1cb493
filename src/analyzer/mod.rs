//! Semantic analysis: validation and symbol registration, then name
//! binding. Both passes run over the same tree and symbol arena.

mod binder;
pub mod symbol;
pub(crate) mod utils;
pub(crate) mod validator;

use tracing::{debug, debug_span};

use crate::ast::SyntaxTree;
use crate::config::CompilerConfig;
use crate::error::Report;
use symbol::{SymbolArena, SymbolId, SymbolKind};

/// A tree whose declaration nodes carry symbols and whose references are
/// bound, together with the symbols themselves.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub tree: SyntaxTree,
    pub symbols: SymbolArena,
    /// Schema symbol of the whole program
    pub program: SymbolId,
}

pub fn analyze(mut tree: SyntaxTree, config: &CompilerConfig) -> Report<Analysis> {
    let span = debug_span!("analyze");
    let _enter = span.enter();

    let mut symbols = SymbolArena::new();
    let root = tree.root;
    let program = symbols.create(SymbolKind::Schema, Some(root));
    tree.node_mut(root).symbol = Some(program);

    let mut errors = {
        let mut validator = validator::Validator::new(&mut tree, &mut symbols, config, program);
        validator.validate_program();
        validator.errors
    };
    debug!(symbols = symbols.len(), errors = errors.len(), "validated");

    let mut binder = binder::Binder::new(&mut tree, &mut symbols, config, program);
    binder.bind_program();
    let binding_errors = binder.errors;
    debug!(errors = binding_errors.len(), "bound");
    errors.extend(binding_errors);

    Report::new(
        Analysis {
            tree,
            symbols,
            program,
        },
        errors,
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SyntaxNodeKind;
    use crate::error::CompileErrorCode;
    use crate::parser::parse;
    use symbol::NodeSymbolIndex;

    fn analyze_source(source: &str) -> Report<Analysis> {
        let parsed = parse(source);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        analyze(parsed.value, &CompilerConfig::default())
    }

    fn codes(report: &Report<Analysis>) -> Vec<CompileErrorCode> {
        report.errors.iter().map(|e| e.code).collect()
    }

    fn table_symbol(analysis: &Analysis, name: &str) -> SymbolId {
        analysis
            .symbols
            .lookup(analysis.program, &NodeSymbolIndex::new(SymbolKind::Table, name))
            .unwrap()
    }

    #[test]
    fn test_ref_binds_both_endpoints() {
        let report = analyze_source(
            "Table users {\n  id int\n}\nTable posts {\n  user_id int\n}\nRef: posts.user_id > users.id\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let analysis = &report.value;
        let users = table_symbol(analysis, "users");
        let id = analysis
            .symbols
            .lookup(users, &NodeSymbolIndex::new(SymbolKind::Column, "id"))
            .unwrap();
        assert_eq!(analysis.symbols.get(users).references.len(), 1);
        let reference = analysis.symbols.get(id).references[0];
        assert_eq!(analysis.tree.node(reference).referee, Some(id));
    }

    #[test]
    fn test_forward_reference_resolves() {
        let report = analyze_source(
            "Ref: a.b_id > b.id\nTable a {\n  b_id int\n}\nTable b {\n  id int\n}\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
    }

    #[test]
    fn test_unknown_table_is_binding_error() {
        let report = analyze_source("Table a {\n  id int [ref: > ghost.id]\n}\n");
        assert_eq!(codes(&report), vec![CompileErrorCode::BindingError]);
        assert!(report.errors[0].diagnostic.contains("ghost"));
    }

    #[test]
    fn test_unknown_column_names_table() {
        let report = analyze_source(
            "Table a {\n  id int\n}\nTable b {\n  id int\n}\nRef: a.id > b.nope\n",
        );
        assert_eq!(codes(&report), vec![CompileErrorCode::BindingError]);
        assert_eq!(
            report.errors[0].diagnostic,
            "Column 'nope' does not exist in table 'b'"
        );
    }

    #[test]
    fn test_default_schema_prefix_is_skipped() {
        let report = analyze_source(
            "Table users {\n  id int\n}\nTable posts {\n  uid int [ref: > public.users.id]\n}\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
    }

    #[test]
    fn test_schema_qualified_lookup() {
        let report = analyze_source(
            "Table auth.users {\n  id int\n}\nTable posts {\n  uid int\n}\nRef: posts.uid > auth.users.id\nRef: posts.uid > users.id\n",
        );
        assert_eq!(codes(&report), vec![CompileErrorCode::BindingError]);
        assert_eq!(report.errors[0].diagnostic, "Table 'users' does not exist");
    }

    #[test]
    fn test_alias_resolves_to_table() {
        let report = analyze_source(
            "Table users as U {\n  id int\n}\nTable posts {\n  uid int [ref: > U.id]\n}\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let users = table_symbol(&report.value, "users");
        assert_eq!(table_symbol(&report.value, "U"), users);
    }

    #[test]
    fn test_same_endpoint() {
        let report = analyze_source("Table a {\n  id int\n}\nRef: a.id - a.id\n");
        assert_eq!(codes(&report), vec![CompileErrorCode::SameEndpoint]);

        let report = analyze_source("Table a {\n  id int [ref: - a.id]\n}\n");
        assert_eq!(codes(&report), vec![CompileErrorCode::SameEndpoint]);
    }

    #[test]
    fn test_partial_injection_later_partial_wins() {
        let report = analyze_source(
            "TablePartial p1 {\n  x int\n}\nTablePartial p2 {\n  x varchar\n}\nTable t {\n  ~p1\n  ~p2\n}\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let analysis = &report.value;
        let t = table_symbol(analysis, "t");
        let x = analysis
            .symbols
            .lookup(t, &NodeSymbolIndex::new(SymbolKind::Column, "x"))
            .unwrap();
        let injected = analysis.symbols.get(x);
        assert_eq!(injected.kind, SymbolKind::InjectedColumn);
        let p2 = analysis
            .symbols
            .lookup(analysis.program, &NodeSymbolIndex::new(SymbolKind::TablePartial, "p2"))
            .unwrap();
        let p2_x = analysis
            .symbols
            .lookup(p2, &NodeSymbolIndex::new(SymbolKind::Column, "x"))
            .unwrap();
        assert_eq!(injected.injected_from, Some(p2_x));
    }

    #[test]
    fn test_direct_column_beats_partial() {
        let report = analyze_source(
            "TablePartial p {\n  x int\n}\nTable t {\n  x varchar\n  ~p\n}\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let analysis = &report.value;
        let t = table_symbol(analysis, "t");
        let x = analysis
            .symbols
            .lookup(t, &NodeSymbolIndex::new(SymbolKind::Column, "x"))
            .unwrap();
        assert_eq!(analysis.symbols.get(x).kind, SymbolKind::Column);
    }

    #[test]
    fn test_injected_columns_visible_to_refs_before_declaration() {
        let report = analyze_source(
            "Ref: t.created_at > u.id\nTable t {\n  ~stamps\n}\nTable u {\n  id int\n}\nTablePartial stamps {\n  created_at int\n}\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
    }

    #[test]
    fn test_missing_partial() {
        let report = analyze_source("Table t {\n  ~nope\n}\n");
        assert_eq!(codes(&report), vec![CompileErrorCode::BindingError]);
    }

    #[test]
    fn test_enum_access_in_records() {
        let source = "Enum status {\n  active\n  inactive\n}\nTable t {\n  s status\n}\nrecords t(s) {\n  status.active\n  status.invalid_value\n}\n";
        let report = analyze_source(source);
        assert_eq!(codes(&report), vec![CompileErrorCode::BindingError]);
        assert_eq!(
            report.errors[0].diagnostic,
            "Enum field 'invalid_value' does not exist in enum 'status'"
        );
    }

    #[test]
    fn test_column_type_binds_enum_silently() {
        let report = analyze_source("Enum status {\n  a\n}\nTable t {\n  s status\n  n int\n}\n");
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let analysis = &report.value;
        let status = analysis
            .symbols
            .lookup(analysis.program, &NodeSymbolIndex::new(SymbolKind::Enum, "status"))
            .unwrap();
        assert_eq!(analysis.symbols.get(status).references.len(), 1);
    }

    #[test]
    fn test_index_and_group_bindings() {
        let report = analyze_source(
            "Table t {\n  a int\n  indexes {\n    (a, b)\n  }\n}\nTableGroup g {\n  t\n  missing\n}\n",
        );
        let messages: Vec<&str> = report.errors.iter().map(|e| e.diagnostic.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Column 'b' does not exist in table 't'", "Table 'missing' does not exist"]
        );
    }

    #[test]
    fn test_every_reference_is_paired() {
        let report = analyze_source(
            "Enum e {\n  x\n}\nTable a {\n  id int [ref: > b.id, default: e.x]\n  k e\n}\nTable b {\n  id int\n}\n",
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let analysis = &report.value;
        for (index, node) in analysis.tree.nodes.iter().enumerate() {
            if let Some(symbol) = node.referee {
                assert!(analysis
                    .symbols
                    .get(symbol)
                    .references
                    .iter()
                    .any(|r| r.0 as usize == index));
            }
        }
        for symbol in analysis.symbols.iter() {
            for reference in &symbol.references {
                assert_eq!(analysis.tree.node(*reference).referee, Some(symbol.id));
            }
        }
        assert!(matches!(
            analysis.tree.kind(analysis.tree.root),
            SyntaxNodeKind::Program { .. }
        ));
    }
}
