//! The interpreted schema model.
//!
//! Field names follow the raw JSON consumed by the model-structure layer,
//! which mixes camelCase (`schemaName`) with a few snake_case keys
//! (`inline_refs`, `not_null`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ast::{NodeId, SyntaxTree};
use crate::lexer::token::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPosition {
    pub offset: usize,
    /// 1-based
    pub line: usize,
    /// 1-based
    pub column: usize,
}

impl From<Position> for TokenPosition {
    fn from(pos: Position) -> Self {
        Self {
            offset: pos.offset,
            line: pos.line + 1,
            column: pos.column + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub start: TokenPosition,
    pub end: TokenPosition,
}

impl TokenSpan {
    pub fn of(tree: &SyntaxTree, node: NodeId) -> Self {
        let n = tree.node(node);
        Self {
            start: n.start.into(),
            end: n.end.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub schemas: Vec<Schema>,
    pub tables: Vec<Table>,
    pub notes: Vec<StickyNote>,
    pub refs: Vec<Ref>,
    pub enums: Vec<Enum>,
    pub table_groups: Vec<TableGroup>,
    pub aliases: Vec<Alias>,
    pub project: Option<Project>,
    pub table_partials: Vec<TablePartial>,
    pub records: Vec<TableRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub value: String,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub schema_name: Option<String>,
    pub alias: Option<String>,
    /// Direct columns merged with the columns of injected partials
    pub fields: Vec<Column>,
    pub token: TokenSpan,
    pub indexes: Vec<Index>,
    pub checks: Vec<Check>,
    pub header_color: Option<String>,
    pub note: Option<Note>,
    pub partials: Vec<PartialRef>,
}

/// A `~name` injection and its position among the table's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRef {
    pub order: usize,
    pub name: String,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub token: TokenSpan,
    pub inline_refs: Vec<InlineRef>,
    pub pk: bool,
    pub unique: bool,
    pub not_null: Option<bool>,
    pub increment: bool,
    pub dbdefault: Option<DefaultValue>,
    pub note: Option<Note>,
    pub checks: Vec<Check>,
}

impl Column {
    /// NOT NULL, declared or implied by a primary key.
    pub fn is_required(&self) -> bool {
        self.pk || self.not_null == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnType {
    #[serde(rename = "schemaName")]
    pub schema_name: Option<String>,
    /// Full type text, e.g. `varchar(255)[]`
    pub type_name: String,
    /// Base name without arguments or array suffixes
    #[serde(skip)]
    pub base_name: String,
    pub args: Option<String>,
    #[serde(rename = "numericParams")]
    pub numeric_params: Option<NumericParams>,
    #[serde(rename = "lengthParam")]
    pub length_param: Option<LengthParam>,
    #[serde(rename = "isEnum")]
    pub is_enum: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericParams {
    pub precision: u32,
    pub scale: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthParam {
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultType {
    Number,
    String,
    Boolean,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultValue {
    #[serde(rename = "type")]
    pub kind: DefaultType,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineRef {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub field_names: Vec<String>,
    pub relation: String,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexColumnKind {
    Column,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    #[serde(rename = "type")]
    pub kind: IndexColumnKind,
    pub value: String,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub columns: Vec<IndexColumn>,
    pub token: TokenSpan,
    pub pk: bool,
    pub unique: bool,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub index_type: Option<String>,
    pub note: Option<Note>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub expression: String,
    pub name: Option<String>,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefEndpoint {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub field_names: Vec<String>,
    /// `1` or `*`
    pub relation: String,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    pub name: Option<String>,
    pub schema_name: Option<String>,
    pub endpoints: Vec<RefEndpoint>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
    pub color: Option<String>,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub token: TokenSpan,
    pub note: Option<Note>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    pub name: String,
    pub schema_name: Option<String>,
    pub token: TokenSpan,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableGroupMember {
    pub name: String,
    pub schema_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableGroup {
    pub name: String,
    pub schema_name: Option<String>,
    pub tables: Vec<TableGroupMember>,
    pub token: TokenSpan,
    pub color: Option<String>,
    pub note: Option<Note>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasTarget {
    pub table_name: String,
    pub schema_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub kind: String,
    pub value: AliasTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: Option<String>,
    pub note: Option<Note>,
    pub database_type: Option<String>,
    pub token: TokenSpan,
    /// Other `key: value` fields, in declaration order
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyNote {
    pub name: String,
    pub content: String,
    pub header_color: Option<String>,
    pub token: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePartial {
    pub name: String,
    pub fields: Vec<Column>,
    pub token: TokenSpan,
    pub indexes: Vec<Index>,
    pub checks: Vec<Check>,
    pub header_color: Option<String>,
    pub note: Option<Note>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordValueType {
    String,
    Bool,
    Integer,
    Real,
    Date,
    Time,
    Datetime,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordValue {
    #[serde(rename = "type")]
    pub kind: RecordValueType,
    pub value: Value,
}

impl RecordValue {
    pub fn new(kind: RecordValueType, value: impl Into<Value>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn null(kind: RecordValueType) -> Self {
        Self {
            kind,
            value: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<RecordValue>>,
}
