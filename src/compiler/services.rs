//! Editor services over the compiler's memoised state: go to definition,
//! find references, hover and completion. None of them mutate anything.

use serde::Serialize;

use super::Compiler;
use crate::analyzer::symbol::{NodeSymbolIndex, SymbolId, SymbolKind};
use crate::analyzer::validator::{
    COLUMN_SETTINGS, INDEX_SETTINGS, REF_ACTIONS, REF_SETTINGS, TABLE_SETTINGS,
};
use crate::analyzer::Analysis;
use crate::ast::{ElementKind, NodeId, SyntaxTree};
use crate::interpreter::TokenSpan;
use crate::lexer::token::{SyntaxToken, SyntaxTokenKind};

const TOP_LEVEL_KEYWORDS: [&str; 8] = [
    "Table",
    "TablePartial",
    "Enum",
    "Ref",
    "Note",
    "Project",
    "TableGroup",
    "Records",
];
const TABLE_BODY_KEYWORDS: [&str; 4] = ["indexes", "checks", "Note", "records"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hover {
    pub contents: String,
    pub range: TokenSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionKind {
    Keyword,
    Setting,
    Schema,
    Table,
    Column,
    Enum,
    EnumField,
    TableGroup,
    TablePartial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
}

impl CompletionItem {
    fn new(label: impl Into<String>, kind: CompletionKind) -> Self {
        Self {
            label: label.into(),
            kind,
            detail: None,
        }
    }
}

fn keywords(words: &[&str], kind: CompletionKind) -> Vec<CompletionItem> {
    words.iter().map(|w| CompletionItem::new(*w, kind)).collect()
}

fn completion_kind(kind: SymbolKind) -> Option<CompletionKind> {
    match kind {
        SymbolKind::Schema => Some(CompletionKind::Schema),
        SymbolKind::Table => Some(CompletionKind::Table),
        SymbolKind::Column | SymbolKind::InjectedColumn => Some(CompletionKind::Column),
        SymbolKind::Enum => Some(CompletionKind::Enum),
        SymbolKind::EnumField => Some(CompletionKind::EnumField),
        SymbolKind::TableGroup => Some(CompletionKind::TableGroup),
        SymbolKind::TablePartial => Some(CompletionKind::TablePartial),
        SymbolKind::TableGroupField | SymbolKind::PartialInjection => None,
    }
}

/// Node holding the name a declaration introduces.
fn name_node(tree: &SyntaxTree, declaration: NodeId) -> NodeId {
    match tree.element(declaration) {
        Some(decl) => decl.name.unwrap_or(declaration),
        None => tree.statement_parts(declaration).0,
    }
}

fn declared_name(tree: &SyntaxTree, declaration: NodeId) -> Option<String> {
    tree.complex_variable_names(name_node(tree, declaration))
        .map(|parts| parts.join("."))
}

/// `schema.table` for elements, `owner.member` for columns and fields.
fn qualified_name(tree: &SyntaxTree, declaration: NodeId) -> Option<String> {
    let own = declared_name(tree, declaration)?;
    if tree.element(declaration).is_some() {
        return Some(own);
    }
    match tree
        .enclosing_element(declaration)
        .and_then(|owner| declared_name(tree, owner))
    {
        Some(owner) => Some(format!("{}.{}", owner, own)),
        None => Some(own),
    }
}

fn title(kind: SymbolKind) -> String {
    let noun = kind.describe();
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

impl Compiler {
    /// Span of the name that declares the symbol under `offset`.
    pub fn definition(&self, offset: usize) -> Option<TokenSpan> {
        let (symbol, _) = self.symbol_site(offset)?;
        let analysis = self.editor_analysis();
        let declaration = analysis.symbols.get(symbol).declaration?;
        if declaration == analysis.tree.root {
            return None;
        }
        Some(TokenSpan::of(&analysis.tree, name_node(&analysis.tree, declaration)))
    }

    /// Every bound use of the symbol under `offset`, in source order. A
    /// partial's column and the copies injected into tables share one set
    /// of references.
    pub fn references(&self, offset: usize) -> Vec<TokenSpan> {
        let Some((symbol, _)) = self.symbol_site(offset) else {
            return Vec::new();
        };
        let analysis = self.editor_analysis();
        let origin = analysis.symbols.get(symbol).injected_from.unwrap_or(symbol);
        let mut nodes: Vec<NodeId> = analysis
            .symbols
            .iter()
            .filter(|s| s.id == origin || s.injected_from == Some(origin))
            .flat_map(|s| s.references.iter().copied())
            .collect();
        nodes.sort_by_key(|n| analysis.tree.node(*n).start.offset);
        nodes.dedup();
        nodes
            .into_iter()
            .map(|n| TokenSpan::of(&analysis.tree, n))
            .collect()
    }

    pub fn hover(&self, offset: usize) -> Option<Hover> {
        let (symbol, site) = self.symbol_site(offset)?;
        let analysis = self.editor_analysis();
        let tree = &analysis.tree;
        let entry = analysis.symbols.get(symbol);
        let declaration = entry.declaration.filter(|d| *d != tree.root)?;

        let mut contents = match entry.kind {
            SymbolKind::InjectedColumn => format!("Column {}", declared_name(tree, declaration)?),
            kind => format!("{} {}", title(kind), qualified_name(tree, declaration)?),
        };
        if let Some(column_type) = self.column_type_text(analysis, symbol) {
            contents.push_str(": ");
            contents.push_str(&column_type);
        }
        if entry.kind == SymbolKind::InjectedColumn {
            if let Some(partial) = qualified_name(tree, declaration)
                .and_then(|q| q.split_once('.').map(|(p, _)| p.to_string()))
            {
                contents.push_str(&format!("\nInjected from table partial {}", partial));
            }
        }

        let range_node = if tree.node(site).symbol == Some(symbol) {
            name_node(tree, site)
        } else {
            site
        };
        Some(Hover {
            contents,
            range: TokenSpan::of(tree, range_node),
        })
    }

    pub fn completions(&self, offset: usize) -> Vec<CompletionItem> {
        let mut before = self.tokens_before(offset);
        // A name the cursor is still typing does not change the context.
        if before.last().is_some_and(|t| {
            matches!(t.kind, SyntaxTokenKind::Identifier | SyntaxTokenKind::QuotedString)
                && t.end.offset == offset
        }) {
            before.pop();
        }
        if let Some(items) = self.member_completions(&before) {
            return items;
        }
        if let Some(items) = self.setting_completions(offset, &before) {
            return items;
        }
        self.scope_completions(offset, &before)
    }

    /// Significant tokens ending at or before `offset`.
    fn tokens_before(&self, offset: usize) -> Vec<&SyntaxToken> {
        self.syntax_tree()
            .tokens
            .iter()
            .take_while(|t| t.end.offset <= offset && t.kind != SyntaxTokenKind::Eof)
            .collect()
    }

    fn column_type_text(&self, analysis: &Analysis, symbol: SymbolId) -> Option<String> {
        let tree = &analysis.tree;
        let entry = analysis.symbols.get(symbol);
        if !matches!(entry.kind, SymbolKind::Column | SymbolKind::InjectedColumn) {
            return None;
        }
        let (_, args) = tree.statement_parts(entry.declaration?);
        args.first().map(|t| tree.node_text(*t, &self.source))
    }

    fn completion_item(&self, label: &str, symbol: SymbolId) -> Option<CompletionItem> {
        let analysis = self.editor_analysis();
        let entry = analysis.symbols.get(symbol);
        let kind = completion_kind(entry.kind)?;
        let detail = match entry.kind {
            SymbolKind::Table => entry
                .declaration
                .and_then(|d| qualified_name(&analysis.tree, d))
                .filter(|name| name != label),
            _ => self.column_type_text(analysis, symbol),
        };
        Some(CompletionItem {
            label: label.to_string(),
            kind,
            detail,
        })
    }

    fn members_of(&self, scope: SymbolId) -> Vec<CompletionItem> {
        let Some(table) = self.symbols().table(scope) else {
            return Vec::new();
        };
        table
            .iter()
            .filter_map(|(index, symbol)| self.completion_item(&index.name, symbol))
            .collect()
    }

    /// Members after `name.`, resolving a dotted chain such as
    /// `auth.users.` from the program scope.
    fn member_completions(&self, before: &[&SyntaxToken]) -> Option<Vec<CompletionItem>> {
        let dot = before.len().checked_sub(1)?;
        if !before[dot].is_op(".") {
            return None;
        }

        let mut chain = Vec::new();
        let mut i = dot;
        while i > 0 {
            let name = before[i - 1];
            if !matches!(name.kind, SyntaxTokenKind::Identifier | SyntaxTokenKind::QuotedString) {
                break;
            }
            chain.push(name.value.as_str());
            if i >= 2 && before[i - 2].is_op(".") {
                i -= 2;
            } else {
                break;
            }
        }
        chain.reverse();

        let symbols = self.symbols();
        let mut scope = self.editor_analysis().program;
        for (position, name) in chain.iter().enumerate() {
            let found = [SymbolKind::Schema, SymbolKind::Table, SymbolKind::Enum]
                .iter()
                .find_map(|kind| symbols.lookup(scope, &NodeSymbolIndex::new(*kind, *name)));
            match found {
                Some(symbol) => scope = symbol,
                None if position == 0 && *name == self.config.default_schema => {}
                None => return Some(Vec::new()),
            }
        }
        Some(self.members_of(scope))
    }

    /// Setting names inside `[...]`, or actions after `delete:`/`update:`.
    fn setting_completions(&self, offset: usize, before: &[&SyntaxToken]) -> Option<Vec<CompletionItem>> {
        let mut depth = 0usize;
        let mut open = None;
        for token in before.iter().rev() {
            match token.kind {
                SyntaxTokenKind::RightBracket => depth += 1,
                SyntaxTokenKind::LeftBracket if depth == 0 => {
                    open = Some(*token);
                    break;
                }
                SyntaxTokenKind::LeftBracket => depth -= 1,
                SyntaxTokenKind::LeftBrace | SyntaxTokenKind::RightBrace => return None,
                _ => {}
            }
        }
        let open = open?;

        let last = before.last()?;
        match last.kind {
            SyntaxTokenKind::LeftBracket | SyntaxTokenKind::Comma => {}
            SyntaxTokenKind::Colon => {
                let setting = before.len().checked_sub(2).map(|i| before[i].value.to_ascii_lowercase());
                return Some(match setting.as_deref() {
                    Some("delete") | Some("update") => keywords(&REF_ACTIONS, CompletionKind::Keyword),
                    _ => Vec::new(),
                });
            }
            _ => return Some(Vec::new()),
        }

        let tree = self.syntax_tree();
        let Some(element) = self.container_stack(offset).last().copied() else {
            return Some(Vec::new());
        };
        let in_header = tree
            .element(element)
            .and_then(|decl| decl.body)
            .map_or(true, |body| open.start.offset < tree.node(body).start.offset);
        let settings: &[&str] = match (tree.element_kind(element), in_header) {
            (Some(ElementKind::Table | ElementKind::TablePartial), true) => &TABLE_SETTINGS,
            (Some(ElementKind::Table | ElementKind::TablePartial), false) => &COLUMN_SETTINGS,
            (Some(ElementKind::TableGroup), true) => &["color", "note"],
            (Some(ElementKind::Note), true) => &["headercolor"],
            (Some(ElementKind::Enum), false) => &["note"],
            (Some(ElementKind::Indexes), false) => &INDEX_SETTINGS,
            (Some(ElementKind::Checks), false) => &["name"],
            (Some(ElementKind::Ref), _) => &REF_SETTINGS,
            _ => &[],
        };
        Some(keywords(settings, CompletionKind::Setting))
    }

    /// Names that fit the innermost element containing `offset`.
    fn scope_completions(&self, offset: usize, before: &[&SyntaxToken]) -> Vec<CompletionItem> {
        let analysis = self.editor_analysis();
        let program_items = |kind: SymbolKind| -> Vec<CompletionItem> {
            analysis
                .symbols
                .table(analysis.program)
                .map(|table| {
                    table
                        .iter()
                        .filter(|(index, _)| index.kind == kind)
                        .filter_map(|(index, symbol)| self.completion_item(&index.name, symbol))
                        .collect()
                })
                .unwrap_or_default()
        };

        if before.last().map(|t| t.kind) == Some(SyntaxTokenKind::Tilde) {
            return program_items(SymbolKind::TablePartial);
        }

        let stack = self.container_stack(offset);
        let Some(innermost) = stack.last().copied() else {
            return keywords(&TOP_LEVEL_KEYWORDS, CompletionKind::Keyword);
        };
        match analysis.tree.element_kind(innermost) {
            Some(ElementKind::Table) => keywords(&TABLE_BODY_KEYWORDS, CompletionKind::Keyword),
            Some(ElementKind::TablePartial) => {
                keywords(&TABLE_BODY_KEYWORDS[..3], CompletionKind::Keyword)
            }
            Some(ElementKind::Project) => keywords(&["Note"], CompletionKind::Keyword),
            Some(ElementKind::TableGroup | ElementKind::Ref) => {
                let mut items = program_items(SymbolKind::Table);
                items.extend(program_items(SymbolKind::Schema));
                items
            }
            Some(ElementKind::Records) if stack.len() == 1 => program_items(SymbolKind::Table),
            Some(ElementKind::Indexes | ElementKind::Checks | ElementKind::Records) => stack
                .len()
                .checked_sub(2)
                .and_then(|i| analysis.tree.node(stack[i]).symbol)
                .map(|table| {
                    self.members_of(table)
                        .into_iter()
                        .filter(|item| item.kind == CompletionKind::Column)
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::{CompletionKind, Compiler};
    use crate::config::CompilerConfig;

    const SOURCE: &str = "Enum status {\n  active\n  archived\n}\nTable users as U {\n  id int [pk]\n  state status\n}\nTable posts {\n  user_id int [ref: > users.id]\n}\nRef: posts.user_id > U.id\n";

    fn compiler(source: &str) -> Compiler {
        let mut compiler = Compiler::new(CompilerConfig::default());
        compiler.set_source(source);
        compiler
    }

    fn labels(c: &Compiler, offset: usize) -> Vec<String> {
        c.completions(offset).into_iter().map(|i| i.label).collect()
    }

    #[test]
    fn test_definition_of_table_and_column() {
        let c = compiler(SOURCE);
        let table_use = SOURCE.find("users.id").unwrap() + 1;
        let def = c.definition(table_use).unwrap();
        assert_eq!((def.start.line, def.start.column), (5, 7));

        let column_use = SOURCE.find("users.id").unwrap() + "users.".len();
        let def = c.definition(column_use).unwrap();
        assert_eq!((def.start.line, def.start.column), (6, 3));

        let alias_use = SOURCE.find("U.id").unwrap();
        assert_eq!(c.definition(alias_use).unwrap().start.line, 5);
    }

    #[test]
    fn test_references_in_source_order() {
        let c = compiler(SOURCE);
        let column = SOURCE.find("id int [pk]").unwrap();
        let lines: Vec<usize> = c.references(column).iter().map(|s| s.start.line).collect();
        assert_eq!(lines, vec![10, 12]);

        let table = SOURCE.find("users as").unwrap();
        let lines: Vec<usize> = c.references(table).iter().map(|s| s.start.line).collect();
        assert_eq!(lines, vec![10, 12]);

        assert!(c.references(SOURCE.len() + 10).is_empty());
    }

    #[test]
    fn test_references_include_injected_columns() {
        let source = "TablePartial stamps {\n  created_at int\n}\nTable a {\n  ~stamps\n}\nTable b {\n  ~stamps\n  id int\n}\nRef: a.created_at > b.id\nRef: b.created_at > b.id\n";
        let c = compiler(source);
        let declaration = source.find("created_at int").unwrap();
        assert_eq!(c.references(declaration).len(), 2);
    }

    #[test]
    fn test_hover() {
        let c = compiler(SOURCE);
        let column_use = SOURCE.find("U.id").unwrap() + 2;
        let hover = c.hover(column_use).unwrap();
        assert_eq!(hover.contents, "Column users.id: int");
        assert_eq!(hover.range.start.line, 12);

        let enum_use = SOURCE.find("state status").unwrap() + "state ".len();
        let hover = c.hover(enum_use).unwrap();
        assert_eq!(hover.contents, "Enum status");
        assert_eq!((hover.range.start.line, hover.range.start.column), (7, 9));

        let declaration = SOURCE.find("Table posts").unwrap() + 1;
        let hover = c.hover(declaration).unwrap();
        assert_eq!(hover.contents, "Table posts");
        assert_eq!(hover.range.start.column, 7);
    }

    #[test]
    fn test_member_completions() {
        let source = "Table users {\n  id int\n  state varchar\n}\nRef: users.id > users.st";
        let c = compiler(source);
        assert_eq!(labels(&c, source.len()), vec!["id", "state"]);
        let items = c.completions(source.len());
        assert_eq!(items[0].kind, CompletionKind::Column);
        assert_eq!(items[0].detail.as_deref(), Some("int"));

        let source = "Enum status {\n  a\n  b\n}\nTable t {\n  s status [default: status.]\n}\n";
        let c = compiler(source);
        let offset = source.find("status.]").unwrap() + "status.".len();
        assert_eq!(labels(&c, offset), vec!["a", "b"]);
    }

    #[test]
    fn test_schema_member_completions() {
        let source = "Table auth.users {\n  id int\n}\nRef: auth.users.id > auth.";
        let c = compiler(source);
        assert_eq!(labels(&c, source.len()), vec!["users"]);

        let source = "Table users {\n  id int\n}\nRef: users.id > public.users.";
        let c = compiler(source);
        assert_eq!(labels(&c, source.len()), vec!["id"]);
    }

    #[test]
    fn test_setting_completions() {
        let source = "Table t [note: 'x'] {\n  id int [pk, unique]\n}\nRef: t.id > t.id [delete: cascade]\n";
        let c = compiler(source);

        let header = c.completions(source.find("note").unwrap());
        assert!(header.iter().all(|i| i.kind == CompletionKind::Setting));
        assert_eq!(
            header.iter().map(|i| i.label.as_str()).collect::<Vec<_>>(),
            vec!["headercolor", "note"]
        );

        let column = labels(&c, source.find("unique").unwrap());
        assert!(column.contains(&"not null".to_string()));
        assert!(column.contains(&"ref".to_string()));

        let action = labels(&c, source.find("cascade").unwrap());
        assert!(action.contains(&"set null".to_string()));

        let source = "Table t {\n  id int [pk, uni]\n}\n";
        let c = compiler(source);
        let typing = labels(&c, source.find("uni").unwrap() + 3);
        assert!(typing.contains(&"unique".to_string()));
    }

    #[test]
    fn test_scope_completions() {
        let c = compiler("");
        assert!(labels(&c, 0).contains(&"TableGroup".to_string()));

        let source = "TablePartial p {\n  x int\n}\nTable t {\n  ~p\n}\n";
        let c = compiler(source);
        assert_eq!(labels(&c, source.find("~p").unwrap() + 1), vec!["p"]);

        let source = "Table a {\n  id int\n}\nTable b {\n  id int\n}\nTableGroup g {\n  a\n}\n";
        let c = compiler(source);
        let offset = source.find("g {\n").unwrap() + 4;
        assert_eq!(labels(&c, offset), vec!["a", "b"]);

        let source = "Table t {\n  a int\n  b int\n  indexes {\n    (a, b)\n  }\n}\n";
        let c = compiler(source);
        let offset = source.find("(a").unwrap() + 1;
        assert_eq!(labels(&c, offset), vec!["a", "b"]);
    }
}
