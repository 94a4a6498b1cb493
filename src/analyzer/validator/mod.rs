//! Structural validation and symbol registration.
//!
//! Each element kind has an `ElementValidator` that checks where the element
//! may appear and the shape of its name, alias, settings and body, then
//! registers the symbols it declares and recurses into sub-elements.

mod elements;
mod refs;
mod table;

pub(crate) use elements::{note_content, records_column_list, records_target};
pub(crate) use refs::{REF_ACTIONS, REF_SETTINGS};
pub(crate) use table::{injected_partial_name, COLUMN_SETTINGS, INDEX_SETTINGS, TABLE_SETTINGS};

use std::collections::HashSet;

use crate::analyzer::symbol::{NodeSymbolIndex, SymbolArena, SymbolId, SymbolKind};
use crate::analyzer::utils::{settings_of, Setting};
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileErrorCode, NodeOrToken};

pub(crate) trait ElementValidator: Sync {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>);
}

static VALIDATORS: [(ElementKind, &dyn ElementValidator); 12] = [
    (ElementKind::Table, &table::TableValidator),
    (ElementKind::TablePartial, &table::TablePartialValidator),
    (ElementKind::Indexes, &table::IndexesValidator),
    (ElementKind::Checks, &table::ChecksValidator),
    (ElementKind::Ref, &refs::RefValidator),
    (ElementKind::Enum, &elements::EnumValidator),
    (ElementKind::Note, &elements::NoteValidator),
    (ElementKind::Project, &elements::ProjectValidator),
    (ElementKind::TableGroup, &elements::TableGroupValidator),
    (ElementKind::Records, &elements::RecordsValidator),
    (ElementKind::Policy, &elements::PolicyValidator),
    (ElementKind::Custom, &elements::CustomValidator),
];

fn pick_validator(kind: ElementKind) -> &'static dyn ElementValidator {
    VALIDATORS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, v)| *v)
        .unwrap_or(&elements::CustomValidator)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameRule {
    Forbidden,
    Optional,
    Required,
    /// Checked by the element itself
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyRule {
    Block,
    Colon,
    Any,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderRules {
    pub name: NameRule,
    /// Whether the name may be dotted (`schema.name`)
    pub dotted: bool,
    pub alias: bool,
    pub settings: bool,
    pub body: BodyRule,
}

impl HeaderRules {
    pub const fn new(name: NameRule, body: BodyRule) -> Self {
        Self {
            name,
            dotted: false,
            alias: false,
            settings: false,
            body,
        }
    }

    pub const fn dotted(self) -> Self {
        Self {
            dotted: true,
            ..self
        }
    }

    pub const fn with_alias(self) -> Self {
        Self {
            alias: true,
            ..self
        }
    }

    pub const fn with_settings(self) -> Self {
        Self {
            settings: true,
            ..self
        }
    }
}

/// Top-level, or nested in a Project (which may hold any top-level element).
pub(crate) fn is_top_level(parent: Option<ElementKind>) -> bool {
    matches!(parent, None | Some(ElementKind::Project))
}

pub(crate) struct Validator<'a> {
    pub tree: &'a mut SyntaxTree,
    pub symbols: &'a mut SymbolArena,
    pub config: &'a CompilerConfig,
    pub program: SymbolId,
    pub errors: Vec<CompileError>,
    pub project_seen: bool,
    pub note_names: HashSet<String>,
}

impl<'a> Validator<'a> {
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
            project_seen: false,
            note_names: HashSet::new(),
        }
    }

    pub fn validate_program(&mut self) {
        let body = match self.tree.kind(self.tree.root) {
            SyntaxNodeKind::Program { body, .. } => body.clone(),
            _ => Vec::new(),
        };
        for element in body {
            self.validate_element(element, None);
        }
    }

    pub fn validate_element(&mut self, element: NodeId, parent: Option<ElementKind>) {
        let Some(kind) = self.tree.element_kind(element) else {
            return;
        };
        pick_validator(kind).validate(self, element, parent);
    }

    pub fn error(&mut self, code: CompileErrorCode, message: impl Into<String>, node: NodeId) {
        let n = self.tree.node(node);
        let (start, end) = (n.start, n.end);
        self.errors
            .push(CompileError::new(code, message, NodeOrToken::Node(node), start, end));
    }

    /// Report a context violation when `allowed` is false.
    pub fn check_context(
        &mut self,
        allowed: bool,
        code: CompileErrorCode,
        message: &str,
        element: NodeId,
    ) -> bool {
        if !allowed {
            self.error(code, message, element);
        }
        allowed
    }

    /// Generic header checks shared by every element kind.
    pub fn check_header(&mut self, element: NodeId, kind: ElementKind, rules: HeaderRules) {
        let Some(decl) = self.tree.element(element).cloned() else {
            return;
        };
        let label = kind.with_article();

        match (rules.name, decl.name) {
            (NameRule::Forbidden, Some(name)) => self.error(
                CompileErrorCode::UnexpectedName,
                format!("{} shouldn't have a name", label),
                name,
            ),
            (NameRule::Required, None) => self.error(
                CompileErrorCode::NameNotFound,
                format!("{} must have a name", label),
                element,
            ),
            (NameRule::Required | NameRule::Optional, Some(name)) => {
                let valid = if rules.dotted {
                    self.tree.complex_variable_names(name).is_some()
                } else {
                    self.tree.variable_name(name).is_some()
                };
                if !valid {
                    let expected = if rules.dotted {
                        "an identifier or a dotted name"
                    } else {
                        "an identifier"
                    };
                    self.error(
                        CompileErrorCode::InvalidName,
                        format!("{} name must be {}", label, expected),
                        name,
                    );
                }
            }
            _ => {}
        }

        if let Some(alias) = decl.alias {
            if !rules.alias {
                self.error(
                    CompileErrorCode::UnexpectedAlias,
                    format!("{} shouldn't have an alias", label),
                    alias,
                );
            } else if self.tree.variable_name(alias).is_none() {
                self.error(
                    CompileErrorCode::InvalidAlias,
                    "An alias must be an identifier",
                    alias,
                );
            }
        }

        if let Some(list) = decl.attribute_list {
            if !rules.settings {
                self.error(
                    CompileErrorCode::UnexpectedSettings,
                    format!("{} shouldn't have a setting list", label),
                    list,
                );
            }
        }

        if let Some(body) = decl.body {
            let is_block = matches!(self.tree.kind(body), SyntaxNodeKind::BlockExpression { .. });
            match rules.body {
                BodyRule::Block if !is_block => self.error(
                    CompileErrorCode::UnexpectedSimpleBody,
                    format!("{} must have a block body", label),
                    body,
                ),
                BodyRule::Colon if is_block => self.error(
                    CompileErrorCode::UnexpectedComplexBody,
                    format!("{} must have a simple body after ':'", label),
                    body,
                ),
                _ => {}
            }
        }
    }

    /// Check a settings list against known names. `check` validates each
    /// known setting's value and returns an error message when it is
    /// invalid. Repeatable settings may appear more than once.
    pub fn check_settings(
        &mut self,
        list: Option<NodeId>,
        owner: &str,
        known: &[&str],
        repeatable: &[&str],
        check: impl Fn(&SyntaxTree, &str, Option<NodeId>) -> Option<String>,
    ) -> Vec<Setting> {
        let settings = settings_of(self.tree, list);
        let mut seen = HashSet::new();
        for setting in &settings {
            let Some(name) = setting.name.as_deref() else {
                self.error(
                    CompileErrorCode::InvalidSettings,
                    format!("Invalid {} setting", owner),
                    setting.attribute,
                );
                continue;
            };
            let canonical = canonical_setting(name);
            if !known.contains(&canonical) {
                self.error(
                    CompileErrorCode::UnknownSetting,
                    format!("Unknown {} setting '{}'", owner, name),
                    setting.attribute,
                );
                continue;
            }
            if !repeatable.contains(&canonical) && !seen.insert(canonical.to_string()) {
                self.error(
                    CompileErrorCode::DuplicateSetting,
                    format!("'{}' can only appear once", name),
                    setting.attribute,
                );
                continue;
            }
            if let Some(message) = check(self.tree, canonical, setting.value) {
                self.error(
                    CompileErrorCode::InvalidSettings,
                    message,
                    setting.attribute,
                );
            }
        }
        settings
    }

    /// Register an element declared by a (possibly dotted) name. Schema
    /// segments are created on demand; a leading default schema segment
    /// maps to the program scope. The symbol is attached to the element
    /// even when its name is already taken.
    pub fn register_schema_element(
        &mut self,
        element: NodeId,
        kind: SymbolKind,
        duplicate_code: CompileErrorCode,
    ) -> SymbolId {
        let symbol = self.symbols.create(kind, Some(element));
        self.tree.node_mut(element).symbol = Some(symbol);

        let Some(name) = self.tree.element(element).and_then(|d| d.name) else {
            return symbol;
        };
        let Some(mut names) = self.tree.complex_variable_names(name) else {
            return symbol;
        };
        if names.len() > 1 && names[0] == self.config.default_schema {
            names.remove(0);
        }
        let Some(last) = names.pop() else {
            return symbol;
        };

        let mut scope = self.program;
        for schema in &names {
            scope = self.schema_scope(scope, schema);
        }

        let index = NodeSymbolIndex::new(kind, last.clone());
        if self
            .symbols
            .table_mut(scope)
            .map(|t| t.insert(index, symbol))
            .is_some_and(|r| r.is_err())
        {
            let schema = if names.is_empty() {
                self.config.default_schema.clone()
            } else {
                names.join(".")
            };
            self.error(
                duplicate_code,
                format!(
                    "{} name '{}' already exists in schema '{}'",
                    symbol_label(kind),
                    last,
                    schema
                ),
                name,
            );
        }
        symbol
    }

    fn schema_scope(&mut self, parent: SymbolId, name: &str) -> SymbolId {
        let index = NodeSymbolIndex::new(SymbolKind::Schema, name);
        if let Some(existing) = self.symbols.lookup(parent, &index) {
            return existing;
        }
        let schema = self.symbols.create(SymbolKind::Schema, None);
        if let Some(table) = self.symbols.table_mut(parent) {
            table.overwrite(index, schema);
        }
        schema
    }

    /// Register a member (column, enum field, group field, injection) in
    /// the scope of `owner`. Returns `None` on a duplicate.
    pub fn register_member(
        &mut self,
        owner: SymbolId,
        kind: SymbolKind,
        name: &str,
        declaration: NodeId,
        duplicate_code: CompileErrorCode,
        duplicate_message: String,
        report_on: NodeId,
    ) -> Option<SymbolId> {
        let symbol = self.symbols.create(kind, Some(declaration));
        let inserted = self
            .symbols
            .table_mut(owner)
            .map(|t| t.insert(NodeSymbolIndex::new(kind, name), symbol).is_ok())
            .unwrap_or(false);
        if inserted {
            self.tree.node_mut(declaration).symbol = Some(symbol);
            Some(symbol)
        } else {
            self.error(duplicate_code, duplicate_message, report_on);
            None
        }
    }
}

/// Settings with several spellings share one canonical name.
pub(crate) fn canonical_setting(name: &str) -> &str {
    match name {
        "primary key" => "pk",
        other => other,
    }
}

fn symbol_label(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Table => "Table",
        SymbolKind::Enum => "Enum",
        SymbolKind::TableGroup => "TableGroup",
        SymbolKind::TablePartial => "TablePartial",
        _ => "Element",
    }
}

/// Message for a setting that must hold a single-quoted string.
pub(crate) fn expect_string(tree: &SyntaxTree, name: &str, value: Option<NodeId>) -> Option<String> {
    match value {
        Some(v) if tree.string_literal(v).is_some() => None,
        _ => Some(format!("'{}' must be a string literal", name)),
    }
}

pub(crate) fn expect_color(tree: &SyntaxTree, name: &str, value: Option<NodeId>) -> Option<String> {
    match value {
        Some(v) if tree.color_literal(v).is_some() => None,
        _ => Some(format!("'{}' must be a color literal", name)),
    }
}

pub(crate) fn expect_no_value(name: &str, value: Option<NodeId>) -> Option<String> {
    value.map(|_| format!("'{}' must not have a value", name))
}

#[cfg(test)]
mod tests;
