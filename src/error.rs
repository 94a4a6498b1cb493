//! Error types for dbml-parse.
//!
//! Two families live here: `DbmlError` for library-level failures (config,
//! I/O, unsupported input formats) and `CompileError` for diagnostics produced
//! while compiling DBML source. Diagnostics are plain values collected into a
//! `Report`; they never abort a pass.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::NodeId;
use crate::lexer::token::{Position, TokenId};

#[derive(Error, Debug)]
pub enum DbmlError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Import error: {0}")]
    ImportError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type DbmlResult<T> = Result<T, DbmlError>;

impl Serialize for DbmlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Numeric diagnostic codes, grouped by the pass that reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CompileErrorCode {
    // Lexer
    UnknownSymbol = 1000,
    UnexpectedEof = 1001,
    UnexpectedNewline = 1002,
    InvalidEscapeSequence = 1003,

    // Parser
    UnexpectedToken = 1100,
    MissingExpression = 1101,
    MissingClosingToken = 1102,
    InvalidElementDeclaration = 1103,
    MissingBody = 1104,

    // Validator
    InvalidName = 3000,
    UnexpectedName = 3001,
    NameNotFound = 3002,
    UnexpectedAlias = 3003,
    InvalidAlias = 3004,
    UnexpectedSettings = 3005,
    InvalidSettings = 3006,
    UnknownSetting = 3007,
    DuplicateSetting = 3008,
    UnexpectedSimpleBody = 3009,
    UnexpectedComplexBody = 3010,
    ConflictingSetting = 3011,

    InvalidTableContext = 3020,
    InvalidTablePartialContext = 3021,
    InvalidEnumContext = 3022,
    InvalidRefContext = 3023,
    InvalidNoteContext = 3024,
    InvalidProjectContext = 3025,
    InvalidIndexesContext = 3026,
    InvalidChecksContext = 3027,
    InvalidTableGroupContext = 3028,
    InvalidRecordsContext = 3029,
    InvalidPolicyContext = 3030,
    InvalidCustomContext = 3031,

    DuplicateTableName = 3040,
    DuplicateColumnName = 3041,
    DuplicateEnumName = 3042,
    DuplicateEnumFieldName = 3043,
    DuplicateTableGroupName = 3044,
    DuplicateTableGroupFieldName = 3045,
    DuplicateTablePartialName = 3046,
    DuplicatePartialInjection = 3047,
    DuplicateProject = 3048,
    DuplicateNoteName = 3049,

    InvalidColumn = 3060,
    InvalidColumnName = 3061,
    InvalidColumnType = 3062,
    InvalidEnumElement = 3063,
    EmptyEnum = 3064,
    InvalidRefField = 3065,
    SameEndpoint = 3066,
    UnequalFieldsBinaryRef = 3067,
    InvalidIndex = 3068,
    InvalidCheck = 3069,
    InvalidTableGroupField = 3070,
    InvalidRecordsField = 3071,
    InvalidProjectField = 3072,
    InvalidNoteContent = 3073,

    // Binder
    BindingError = 4000,

    // Interpreter
    InvalidRecordsValue = 5000,
    RecordsRowLengthMismatch = 5001,
    NullInNotNullColumn = 5002,
    DuplicateUniqueValue = 5003,
    DuplicatePrimaryKeyValue = 5004,
    CircularRef = 5005,
    DuplicateRef = 5006,
}

impl CompileErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl Serialize for CompileErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.as_u16())
    }
}

/// What a diagnostic points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrToken {
    Node(NodeId),
    Token(TokenId),
    /// Trivia or invalid tokens that never made it into the main stream.
    Detached,
}

/// A diagnostic emitted by any compilation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub code: CompileErrorCode,
    pub diagnostic: String,
    pub node_or_token: NodeOrToken,
    pub start: Position,
    pub end: Position,
}

impl CompileError {
    pub fn new(
        code: CompileErrorCode,
        diagnostic: impl Into<String>,
        node_or_token: NodeOrToken,
        start: Position,
        end: Position,
    ) -> Self {
        Self {
            code,
            diagnostic: diagnostic.into(),
            node_or_token,
            start,
            end,
        }
    }

    /// Convert to the `{code, diagnostic, location}` shape consumed by editors
    /// and diagram tools. Lines and columns are 1-based.
    pub fn to_wire(&self) -> WireError {
        WireError {
            code: self.code.as_u16(),
            diagnostic: self.diagnostic.clone(),
            location: WireLocation {
                start: WirePoint::from(self.start),
                end: WirePoint::from(self.end),
            },
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}:{})",
            self.diagnostic,
            self.start.line + 1,
            self.start.column + 1
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: u16,
    pub diagnostic: String,
    pub location: WireLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLocation {
    pub start: WirePoint,
    pub end: WirePoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePoint {
    pub line: usize,
    pub column: usize,
}

impl From<Position> for WirePoint {
    fn from(pos: Position) -> Self {
        Self {
            line: pos.line + 1,
            column: pos.column + 1,
        }
    }
}

/// The value of a pass together with the diagnostics it produced.
#[derive(Debug, Clone)]
pub struct Report<T> {
    pub value: T,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompileError>,
}

impl<T> Report<T> {
    pub fn new(value: T, errors: Vec<CompileError>, warnings: Vec<CompileError>) -> Self {
        Self {
            value,
            errors,
            warnings,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Report<U> {
        Report {
            value: f(self.value),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(offset: usize, line: usize, column: usize) -> Position {
        Position {
            offset,
            line,
            column,
        }
    }

    #[test]
    fn test_error_messages() {
        let err = DbmlError::ParseError("unexpected token".to_string());
        assert_eq!(err.to_string(), "Parse error: unexpected token");

        let err = DbmlError::UnsupportedFormat("mssql".to_string());
        assert_eq!(err.to_string(), "Unsupported format: mssql");

        let err = DbmlError::ConfigError("bad key".to_string());
        assert_eq!(err.to_string(), "Config error: bad key");
    }

    #[test]
    fn test_wire_shape_is_one_based() {
        let err = CompileError::new(
            CompileErrorCode::BindingError,
            "Table 'users' does not exist",
            NodeOrToken::Detached,
            pos(10, 0, 4),
            pos(15, 2, 0),
        );
        let wire = serde_json::to_value(err.to_wire()).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "code": 4000,
                "diagnostic": "Table 'users' does not exist",
                "location": {
                    "start": { "line": 1, "column": 5 },
                    "end": { "line": 3, "column": 1 }
                }
            })
        );
    }

    #[test]
    fn test_code_serializes_as_number() {
        let value = serde_json::to_value(CompileErrorCode::DuplicateUniqueValue).unwrap();
        assert_eq!(value, serde_json::json!(5003));
    }

    #[test]
    fn test_report_map_keeps_diagnostics() {
        let warning = CompileError::new(
            CompileErrorCode::InvalidRecordsValue,
            "Invalid boolean value for column 'active'",
            NodeOrToken::Detached,
            pos(0, 0, 0),
            pos(1, 0, 1),
        );
        let report = Report::new(1, vec![], vec![warning]).map(|v| v + 1);
        assert_eq!(report.value, 2);
        assert!(!report.has_errors());
        assert_eq!(report.warnings.len(), 1);
    }
}
