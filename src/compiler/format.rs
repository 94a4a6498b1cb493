//! Input formats other than DBML.
//!
//! JSON input is the raw database model itself. SQL dialects are handled by
//! importers registered from outside this crate; without one the format is
//! reported as unsupported.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::compile;
use crate::error::{DbmlError, DbmlResult};
use crate::interpreter::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Dbml,
    Json,
    Mysql,
    Postgres,
    Snowflake,
}

impl InputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            InputFormat::Dbml => "dbml",
            InputFormat::Json => "json",
            InputFormat::Mysql => "mysql",
            InputFormat::Postgres => "postgres",
            InputFormat::Snowflake => "snowflake",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = DbmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dbml" => Ok(InputFormat::Dbml),
            "json" => Ok(InputFormat::Json),
            "mysql" => Ok(InputFormat::Mysql),
            "postgres" | "postgresql" => Ok(InputFormat::Postgres),
            "snowflake" => Ok(InputFormat::Snowflake),
            other => Err(DbmlError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Translates a foreign schema language into the database model.
pub trait DialectImporter: Send + Sync {
    fn format(&self) -> InputFormat;

    fn import(&self, source: &str) -> DbmlResult<Database>;
}

/// Importers keyed by the format they accept. Registering a second
/// importer for a format replaces the first.
#[derive(Default)]
pub struct ImporterRegistry {
    importers: HashMap<InputFormat, Box<dyn DialectImporter>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, importer: Box<dyn DialectImporter>) {
        let format = importer.format();
        if self.importers.insert(format, importer).is_some() {
            warn!(%format, "replacing registered importer");
        }
    }

    pub fn get(&self, format: InputFormat) -> Option<&dyn DialectImporter> {
        self.importers.get(&format).map(|b| b.as_ref())
    }
}

/// Parse `source` written in `format` into the database model. DBML
/// sources that fail to compile report their first error.
pub fn parse_with_format(
    source: &str,
    format: InputFormat,
    importers: &ImporterRegistry,
) -> DbmlResult<Database> {
    debug!(%format, bytes = source.len(), "parsing");
    match format {
        InputFormat::Dbml => {
            let result = compile(source);
            if let Some(first) = result.errors.first() {
                return Err(DbmlError::ParseError(first.to_string()));
            }
            result
                .database
                .ok_or_else(|| DbmlError::ParseError("no database produced".to_string()))
        }
        InputFormat::Json => Ok(serde_json::from_str(source)?),
        dialect => {
            let importer = importers
                .get(dialect)
                .ok_or_else(|| DbmlError::UnsupportedFormat(dialect.to_string()))?;
            importer.import(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Schema;

    struct FixedImporter;

    impl DialectImporter for FixedImporter {
        fn format(&self) -> InputFormat {
            InputFormat::Postgres
        }

        fn import(&self, source: &str) -> DbmlResult<Database> {
            if source.trim().is_empty() {
                return Err(DbmlError::ImportError("empty input".to_string()));
            }
            Ok(Database {
                schemas: vec![Schema {
                    name: "imported".to_string(),
                }],
                ..Database::default()
            })
        }
    }

    #[test]
    fn test_format_names() {
        assert_eq!("PostgreSQL".parse::<InputFormat>().unwrap(), InputFormat::Postgres);
        assert_eq!("dbml".parse::<InputFormat>().unwrap(), InputFormat::Dbml);
        assert!(matches!(
            "oracle".parse::<InputFormat>(),
            Err(DbmlError::UnsupportedFormat(name)) if name == "oracle"
        ));
        assert_eq!(InputFormat::Snowflake.to_string(), "snowflake");
    }

    #[test]
    fn test_dbml_dispatch() {
        let registry = ImporterRegistry::new();
        let db = parse_with_format("Table t {\n  id int\n}\n", InputFormat::Dbml, &registry).unwrap();
        assert_eq!(db.tables[0].name, "t");

        let err = parse_with_format("Table t {\n  id int [ref: > x.id]\n}\n", InputFormat::Dbml, &registry)
            .unwrap_err();
        assert!(matches!(err, DbmlError::ParseError(ref m) if m.contains("'x'")));
    }

    #[test]
    fn test_json_round_trip() {
        let registry = ImporterRegistry::new();
        let db = parse_with_format(
            "Table users {\n  id int [pk]\n  name varchar(20)\n}\n",
            InputFormat::Dbml,
            &registry,
        )
        .unwrap();
        let json = serde_json::to_string(&db).unwrap();
        let back = parse_with_format(&json, InputFormat::Json, &registry).unwrap();
        assert_eq!(serde_json::to_value(&back).unwrap(), serde_json::to_value(&db).unwrap());

        assert!(matches!(
            parse_with_format("{", InputFormat::Json, &registry),
            Err(DbmlError::JsonError(_))
        ));
    }

    #[test]
    fn test_dialect_needs_importer() {
        let mut registry = ImporterRegistry::new();
        assert!(matches!(
            parse_with_format("CREATE TABLE t (id int);", InputFormat::Postgres, &registry),
            Err(DbmlError::UnsupportedFormat(name)) if name == "postgres"
        ));

        registry.register(Box::new(FixedImporter));
        let db = parse_with_format("CREATE TABLE t (id int);", InputFormat::Postgres, &registry).unwrap();
        assert_eq!(db.schemas[0].name, "imported");
        assert!(matches!(
            parse_with_format("  ", InputFormat::Postgres, &registry),
            Err(DbmlError::ImportError(_))
        ));
        assert!(matches!(
            parse_with_format("x", InputFormat::Mysql, &registry),
            Err(DbmlError::UnsupportedFormat(_))
        ));
    }
}
