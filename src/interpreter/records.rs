//! Records blocks: positional mapping of cells to columns, coercion of
//! each cell into a typed value, and unique / primary key enforcement.
//!
//! Format mismatches are warnings and keep a best-effort value. Duplicate
//! unique or primary key values are errors.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::trace;

use super::table::number_value;
use super::types::*;
use super::{schema_scope, split_qualified, Interpreter};
use crate::analyzer::symbol::SymbolId;
use crate::analyzer::utils::{keyword_value, signed_number};
use crate::analyzer::validator::{records_column_list, records_target};
use crate::ast::{NodeId, SyntaxNodeKind, SyntaxTree};
use crate::error::CompileErrorCode;
use crate::lexer::token::SyntaxTokenKind;

pub(crate) struct RecordsSource {
    pub element: NodeId,
    /// Owning table for records nested in a table
    pub table: Option<SymbolId>,
}

/// What a records cell holds, before looking at the column type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    /// `null` or an unquoted empty field
    Null,
    Bool(bool),
    /// Numeric literal text, sign included
    Number(String),
    /// Quoted string
    Str(String),
    /// Bare identifier
    Text(String),
    Expression(String),
    /// Bound `[schema.]enum.member` access
    EnumMember {
        schema: Option<String>,
        enum_name: String,
        member: String,
    },
}

/// Column type families that records validate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Bool,
    Integer,
    Decimal,
    Real,
    Text,
    Date,
    Time,
    Datetime,
    Enum,
    Other,
}

const CHAR_TYPES: [&str; 9] = [
    "char",
    "varchar",
    "nvarchar",
    "nchar",
    "character",
    "character varying",
    "bpchar",
    "varchar2",
    "nvarchar2",
];

pub(crate) fn family(column_type: &ColumnType) -> Family {
    if column_type.is_enum {
        return Family::Enum;
    }
    let base = column_type.base_name.to_ascii_lowercase();
    match base.as_str() {
        "bool" | "boolean" => Family::Bool,
        "int" | "integer" | "smallint" | "bigint" | "tinyint" | "mediumint" | "int2" | "int4"
        | "int8" | "serial" | "smallserial" | "bigserial" => Family::Integer,
        "decimal" | "numeric" | "dec" | "number" => Family::Decimal,
        "float" | "float4" | "float8" | "double" | "double precision" | "real" | "money" => {
            Family::Real
        }
        "date" => Family::Date,
        "time" | "timetz" | "time with time zone" | "time without time zone" => Family::Time,
        "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "timestamp"
        | "timestamptz" | "timestamp with time zone" | "timestamp without time zone" => {
            Family::Datetime
        }
        "text" | "tinytext" | "mediumtext" | "longtext" | "string" | "citext" | "uuid" => {
            Family::Text
        }
        other if CHAR_TYPES.contains(&other) => Family::Text,
        _ => Family::Other,
    }
}

fn value_type(family: Family) -> RecordValueType {
    match family {
        Family::Bool => RecordValueType::Bool,
        Family::Integer => RecordValueType::Integer,
        Family::Decimal | Family::Real => RecordValueType::Real,
        Family::Date => RecordValueType::Date,
        Family::Time => RecordValueType::Time,
        Family::Datetime => RecordValueType::Datetime,
        Family::Text | Family::Enum | Family::Other => RecordValueType::String,
    }
}

pub(crate) fn classify(tree: &SyntaxTree, node: NodeId) -> Cell {
    if tree.is_dummy(node) {
        return Cell::Null;
    }
    if let Some(expression) = tree.function_expression(node) {
        return Cell::Expression(expression.to_string());
    }
    match keyword_value(tree, node) {
        Some("null") => return Cell::Null,
        Some("true") => return Cell::Bool(true),
        Some("false") => return Cell::Bool(false),
        _ => {}
    }
    if let Some(number) = signed_number(tree, node) {
        return Cell::Number(number);
    }
    if let Some(text) = tree.string_literal(node) {
        return Cell::Str(text.to_string());
    }
    if let SyntaxNodeKind::PrimaryExpression { expression } = tree.kind(node) {
        if let SyntaxNodeKind::Variable { variable } = tree.kind(*expression) {
            let token = tree.token(*variable);
            return match token.kind {
                SyntaxTokenKind::QuotedString => Cell::Str(token.value.clone()),
                _ => Cell::Text(token.value.clone()),
            };
        }
        if let Some(token) = tree.literal_token(node) {
            return Cell::Str(token.value.clone());
        }
    }
    match tree.complex_variable_names(node) {
        Some(mut names) if names.len() >= 2 => {
            let member = names.pop().unwrap_or_default();
            let (schema, enum_name) = split_qualified(names);
            Cell::EnumMember {
                schema,
                enum_name,
                member,
            }
        }
        _ => Cell::Null,
    }
}

/// Digits of a decimal literal with any exponent applied, without sign,
/// leading integer zeros or trailing fractional zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecimalDigits {
    pub integer: String,
    pub fraction: String,
}

impl DecimalDigits {
    pub fn parse(text: &str) -> Option<Self> {
        let unsigned = text.trim().trim_start_matches(['-', '+']);
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(i) => (&unsigned[..i], unsigned[i + 1..].parse::<i64>().ok()?),
            None => (unsigned, 0),
        };
        if exponent.abs() > 1000 {
            return None;
        }
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if integer.is_empty() && fraction.is_empty() {
            return None;
        }
        if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }

        let digits = format!("{}{}", integer, fraction);
        let point = integer.len() as i64 + exponent;
        let (integer, fraction) = if point <= 0 {
            (String::new(), format!("{}{}", "0".repeat((-point) as usize), digits))
        } else if point as usize >= digits.len() {
            (
                format!("{}{}", digits, "0".repeat(point as usize - digits.len())),
                String::new(),
            )
        } else {
            let (i, f) = digits.split_at(point as usize);
            (i.to_string(), f.to_string())
        };
        Some(Self {
            integer: integer.trim_start_matches('0').to_string(),
            fraction: fraction.trim_end_matches('0').to_string(),
        })
    }

    pub fn precision(&self) -> usize {
        self.integer.len() + self.fraction.len()
    }

    pub fn scale(&self) -> usize {
        self.fraction.len()
    }
}

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?)(?:Z|[+-]\d{2}(?::?\d{2})?)?$")
        .expect("valid time pattern")
});

pub(crate) fn parse_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

pub(crate) fn parse_time(text: &str) -> bool {
    let Some(captures) = TIME_PATTERN.captures(text.trim()) else {
        return false;
    };
    let time = captures.get(1).map_or("", |m| m.as_str());
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .any(|f| NaiveTime::parse_from_str(time, f).is_ok())
}

pub(crate) fn parse_datetime(text: &str) -> bool {
    let text = text.trim();
    if DateTime::parse_from_rfc3339(text).is_ok() {
        return true;
    }
    let with_offset = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];
    if with_offset
        .iter()
        .any(|f| DateTime::parse_from_str(text, f).is_ok())
    {
        return true;
    }
    let naive = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    naive
        .iter()
        .any(|f| NaiveDateTime::parse_from_str(text, f).is_ok())
        || parse_date(text)
}

/// Columns whose values must not repeat, with the code to report.
fn unique_columns(table: &Table) -> HashMap<String, CompileErrorCode> {
    let mut columns = HashMap::new();
    for column in &table.fields {
        if column.pk {
            columns.insert(column.name.clone(), CompileErrorCode::DuplicatePrimaryKeyValue);
        } else if column.unique {
            columns.insert(column.name.clone(), CompileErrorCode::DuplicateUniqueValue);
        }
    }
    for index in &table.indexes {
        if !(index.pk || index.unique) || index.columns.len() != 1 {
            continue;
        }
        let column = &index.columns[0];
        if column.kind != IndexColumnKind::Column {
            continue;
        }
        let code = if index.pk {
            CompileErrorCode::DuplicatePrimaryKeyValue
        } else {
            CompileErrorCode::DuplicateUniqueValue
        };
        columns.entry(column.value.clone()).or_insert(code);
    }
    columns
}

impl<'a> Interpreter<'a> {
    pub(super) fn interpret_records(&mut self) {
        let sources = std::mem::take(&mut self.records);
        let mut seen: HashMap<(SymbolId, String), HashSet<String>> = HashMap::new();
        for source in sources {
            if let Some(record) = self.interpret_records_block(&source, &mut seen) {
                self.db.records.push(record);
            }
        }
    }

    fn interpret_records_block(
        &mut self,
        source: &RecordsSource,
        seen: &mut HashMap<(SymbolId, String), HashSet<String>>,
    ) -> Option<TableRecord> {
        let tree = self.tree;
        let name = tree.element(source.element).and_then(|d| d.name);
        let (table_symbol, column_nodes) = match (source.table, name) {
            (Some(table), Some(name)) => (table, records_column_list(tree, name)?),
            (Some(table), None) => (table, Vec::new()),
            (None, Some(name)) => {
                let (callee, columns) = records_target(tree, name)?;
                let segments = tree.member_access_segments(callee)?;
                let table = tree.node(*segments.last()?).referee?;
                (table, columns)
            }
            (None, None) => return None,
        };
        let table = self.tables.get(&table_symbol)?.table.clone();

        let columns: Vec<String> = if column_nodes.is_empty() {
            table.fields.iter().map(|c| c.name.clone()).collect()
        } else {
            column_nodes
                .iter()
                .filter_map(|c| tree.variable_name(*c).map(str::to_string))
                .collect()
        };
        let definitions: Vec<Option<Column>> = columns
            .iter()
            .map(|name| table.fields.iter().find(|c| &c.name == name).cloned())
            .collect();
        let unique = unique_columns(&table);

        let mut values = Vec::new();
        for row in tree.block_body(source.element) {
            if tree.element(*row).is_some() {
                continue;
            }
            let cells = tree.row_values(*row);
            if cells.len() != columns.len() {
                self.warn(
                    CompileErrorCode::RecordsRowLengthMismatch,
                    format!(
                        "Expected {} values but got {}",
                        columns.len(),
                        cells.len()
                    ),
                    *row,
                );
            }

            let mut row_values = Vec::with_capacity(columns.len());
            for (i, definition) in definitions.iter().enumerate() {
                let node = cells.get(i).copied().unwrap_or(*row);
                let cell = match cells.get(i) {
                    Some(cell) => classify(tree, *cell),
                    None => Cell::Null,
                };
                let value = self.record_value(definition.as_ref(), cell, node);

                if self.config.records.check_unique && !value.value.is_null() {
                    if let Some(code) = unique.get(&columns[i]) {
                        let key = value.value.to_string();
                        let fresh = seen
                            .entry((table_symbol, columns[i].clone()))
                            .or_default()
                            .insert(key);
                        if !fresh {
                            let label = match code {
                                CompileErrorCode::DuplicatePrimaryKeyValue => "primary key",
                                _ => "unique",
                            };
                            self.error(
                                *code,
                                format!("Duplicate {} value for column '{}'", label, columns[i]),
                                node,
                            );
                        }
                    }
                }
                row_values.push(value);
            }
            values.push(row_values);
        }

        Some(TableRecord {
            schema_name: table.schema_name.clone(),
            table_name: table.name.clone(),
            columns,
            values,
        })
    }

    /// Coerce one cell for `column`, warning on format mismatches.
    pub(crate) fn record_value(&mut self, column: Option<&Column>, cell: Cell, node: NodeId) -> RecordValue {
        if let Cell::Expression(expression) = cell {
            return RecordValue::new(RecordValueType::Expression, expression);
        }
        let Some(column) = column else {
            return raw_value(cell);
        };
        if !self.config.records.validate {
            return raw_value(cell);
        }

        let family = family(&column.column_type);
        let kind = value_type(family);
        let is_null = match &cell {
            Cell::Null => true,
            Cell::Str(s) => s.is_empty() && family != Family::Text,
            _ => false,
        };
        if is_null {
            if column.is_required() && column.dbdefault.is_none() && !column.increment {
                self.warn(
                    CompileErrorCode::NullInNotNullColumn,
                    format!("NULL value is not allowed for NOT NULL column '{}'", column.name),
                    node,
                );
            }
            return RecordValue::null(kind);
        }

        let name = column.name.as_str();
        trace!(column = name, ?family, ?cell, "coercing record value");
        match family {
            Family::Bool => {
                let parsed = match &cell {
                    Cell::Bool(b) => Some(*b),
                    Cell::Number(n) | Cell::Str(n) | Cell::Text(n) => parse_bool(n),
                    _ => None,
                };
                match parsed {
                    Some(b) => RecordValue::new(kind, b),
                    None => {
                        self.warn(
                            CompileErrorCode::InvalidRecordsValue,
                            format!("Invalid boolean value for column '{}'", name),
                            node,
                        );
                        RecordValue::null(kind)
                    }
                }
            }
            Family::Integer | Family::Decimal | Family::Real => {
                let text = match &cell {
                    Cell::Number(n) => Some(n.clone()),
                    Cell::Str(s) => Some(s.trim().to_string()),
                    _ => None,
                };
                let Some((text, digits)) = text.and_then(|t| DecimalDigits::parse(&t).map(|d| (t, d))) else {
                    self.warn(
                        CompileErrorCode::InvalidRecordsValue,
                        format!("Invalid numeric value for column '{}'", name),
                        node,
                    );
                    return RecordValue::null(kind);
                };
                self.check_number(column, family, &text, &digits, node);
                let value = match family {
                    Family::Integer if digits.scale() == 0 => integer_value(&text, &digits),
                    _ => number_value(&text),
                };
                RecordValue::new(kind, value)
            }
            Family::Text => {
                let text = match cell {
                    Cell::Str(s)
                    | Cell::Text(s)
                    | Cell::Number(s)
                    | Cell::EnumMember { member: s, .. } => s,
                    Cell::Bool(b) => b.to_string(),
                    Cell::Null | Cell::Expression(_) => String::new(),
                };
                let limited = CHAR_TYPES.contains(&column.column_type.base_name.to_ascii_lowercase().as_str());
                if let (true, Some(limit)) = (limited, column.column_type.length_param) {
                    let bytes = text.len();
                    if bytes > limit.length as usize {
                        self.warn(
                            CompileErrorCode::InvalidRecordsValue,
                            format!(
                                "String value for column '{}' exceeds maximum length: expected at most {} bytes (UTF-8), got {} bytes",
                                name, limit.length, bytes
                            ),
                            node,
                        );
                    }
                }
                RecordValue::new(kind, text)
            }
            Family::Date | Family::Time | Family::Datetime => {
                let (label, parse): (&str, fn(&str) -> bool) = match family {
                    Family::Date => ("date", parse_date),
                    Family::Time => ("time", parse_time),
                    _ => ("datetime", parse_datetime),
                };
                match cell {
                    Cell::Str(s) | Cell::Text(s) if parse(&s) => RecordValue::new(kind, s),
                    other => {
                        self.warn(
                            CompileErrorCode::InvalidRecordsValue,
                            format!("Invalid {} value for column '{}'", label, name),
                            node,
                        );
                        match other {
                            Cell::Str(s) | Cell::Text(s) | Cell::Number(s) => RecordValue::new(kind, s),
                            _ => RecordValue::null(kind),
                        }
                    }
                }
            }
            Family::Enum => match cell {
                Cell::EnumMember {
                    schema,
                    enum_name,
                    member,
                } => {
                    if !self.same_enum(&column.column_type, schema.as_deref(), &enum_name) {
                        self.warn(
                            CompileErrorCode::InvalidRecordsValue,
                            format!("Invalid enum value for column '{}'", name),
                            node,
                        );
                    }
                    RecordValue::new(kind, member)
                }
                Cell::Str(s) | Cell::Text(s) => {
                    if !self.enum_has_member(&column.column_type, &s) {
                        self.warn(
                            CompileErrorCode::InvalidRecordsValue,
                            format!("Invalid enum value for column '{}'", name),
                            node,
                        );
                    }
                    RecordValue::new(kind, s)
                }
                other => {
                    self.warn(
                        CompileErrorCode::InvalidRecordsValue,
                        format!("Invalid enum value for column '{}'", name),
                        node,
                    );
                    raw_value(other)
                }
            },
            Family::Other => raw_value(cell),
        }
    }

    fn check_number(&mut self, column: &Column, family: Family, text: &str, digits: &DecimalDigits, node: NodeId) {
        let name = column.name.as_str();
        match family {
            Family::Integer if digits.scale() > 0 => self.warn(
                CompileErrorCode::InvalidRecordsValue,
                format!(
                    "Invalid integer value {} for column '{}': expected integer, got decimal",
                    text, name
                ),
                node,
            ),
            Family::Decimal => {
                let Some(params) = column.column_type.numeric_params else {
                    return;
                };
                if digits.precision() > params.precision as usize {
                    self.warn(
                        CompileErrorCode::InvalidRecordsValue,
                        format!(
                            "Numeric value {} for column '{}' exceeds precision: expected at most {} total digits, got {}",
                            text,
                            name,
                            params.precision,
                            digits.precision()
                        ),
                        node,
                    );
                } else if digits.scale() > params.scale as usize {
                    self.warn(
                        CompileErrorCode::InvalidRecordsValue,
                        format!(
                            "Numeric value {} for column '{}' exceeds scale: expected at most {} decimal digits, got {}",
                            text,
                            name,
                            params.scale,
                            digits.scale()
                        ),
                        node,
                    );
                }
            }
            _ => {}
        }
    }

    /// Whether `[schema.]name` is the enum a column is typed with.
    fn same_enum(&self, column_type: &ColumnType, schema: Option<&str>, name: &str) -> bool {
        let default_schema = self.config.default_schema.as_str();
        column_type.base_name == name
            && schema_scope(column_type.schema_name.as_deref(), default_schema)
                == schema_scope(schema, default_schema)
    }

    fn enum_has_member(&self, column_type: &ColumnType, member: &str) -> bool {
        self.db
            .enums
            .iter()
            .filter(|e| self.same_enum(column_type, e.schema_name.as_deref(), &e.name))
            .any(|e| e.values.iter().any(|v| v.name == member))
    }
}

/// The accepted spellings of a boolean.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "y" | "yes" | "1" => Some(true),
        "false" | "f" | "n" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// An integral value written with a fraction or exponent, e.g. `1.0`,
/// `2e3`.
fn integer_value(text: &str, digits: &DecimalDigits) -> Value {
    let negative = text.trim_start().starts_with('-');
    let magnitude = if digits.integer.is_empty() {
        "0"
    } else {
        digits.integer.as_str()
    };
    let signed = if negative {
        format!("-{}", magnitude)
    } else {
        magnitude.to_string()
    };
    signed
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| number_value(text))
}

/// Value for a cell without a known column type.
fn raw_value(cell: Cell) -> RecordValue {
    match cell {
        Cell::Null => RecordValue::null(RecordValueType::String),
        Cell::Bool(b) => RecordValue::new(RecordValueType::Bool, b),
        Cell::Number(n) => {
            let kind = if n.contains(['.', 'e', 'E']) {
                RecordValueType::Real
            } else {
                RecordValueType::Integer
            };
            RecordValue::new(kind, number_value(&n))
        }
        Cell::Str(s) | Cell::Text(s) | Cell::EnumMember { member: s, .. } => {
            RecordValue::new(RecordValueType::String, s)
        }
        Cell::Expression(e) => RecordValue::new(RecordValueType::Expression, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_digits() {
        let d = DecimalDigits::parse("999.99").unwrap();
        assert_eq!((d.precision(), d.scale()), (5, 2));
        let d = DecimalDigits::parse("-0.050").unwrap();
        assert_eq!((d.integer.as_str(), d.fraction.as_str()), ("", "05"));
        let d = DecimalDigits::parse("1.5e2").unwrap();
        assert_eq!((d.integer.as_str(), d.scale()), ("150", 0));
        let d = DecimalDigits::parse("12e-3").unwrap();
        assert_eq!(d.fraction, "012");
        assert_eq!(DecimalDigits::parse("abc"), None);
        assert_eq!(DecimalDigits::parse("."), None);
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["true", "T", "y", "Yes", "1"] {
            assert_eq!(parse_bool(yes), Some(true), "{}", yes);
        }
        for no in ["false", "f", "N", "no", "0"] {
            assert_eq!(parse_bool(no), Some(false), "{}", no);
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_temporal_parsers() {
        assert!(parse_date("2024-02-29"));
        assert!(!parse_date("2023-02-29"));
        assert!(parse_time("13:45"));
        assert!(parse_time("13:45:10.5+07:00"));
        assert!(!parse_time("25:00"));
        assert!(parse_datetime("2024-01-01T10:00:00Z"));
        assert!(parse_datetime("2024-01-01 10:00:00"));
        assert!(parse_datetime("2024-01-01"));
        assert!(!parse_datetime("yesterday"));
    }
}
