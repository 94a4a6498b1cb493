//! Compiler configuration
//!
//! Settings can come from a `dbml.toml` file next to the sources and are
//! then overridden by environment variables:
//!
//! - `DBML_DEFAULT_SCHEMA` - schema name treated as the program scope
//! - `DBML_VALIDATE_RECORDS` - `true`/`false`, run per-cell type checks
//! - `DBML_CHECK_UNIQUE` - `true`/`false`, enforce unique and primary key values

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DbmlError, DbmlResult};

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "dbml.toml";

/// Environment variable names
pub const ENV_DEFAULT_SCHEMA: &str = "DBML_DEFAULT_SCHEMA";
pub const ENV_VALIDATE_RECORDS: &str = "DBML_VALIDATE_RECORDS";
pub const ENV_CHECK_UNIQUE: &str = "DBML_CHECK_UNIQUE";

pub const DEFAULT_SCHEMA_NAME: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// A leading name segment equal to this schema resolves against the
    /// program scope unless the schema is declared explicitly.
    #[serde(default = "default_schema")]
    pub default_schema: String,
    #[serde(default)]
    pub records: RecordsConfig,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA_NAME.to_string()
}

fn default_true() -> bool {
    true
}

/// Record validation switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default = "default_true")]
    pub validate: bool,
    #[serde(default = "default_true")]
    pub check_unique: bool,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            validate: true,
            check_unique: true,
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_schema: default_schema(),
            records: RecordsConfig::default(),
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(content: &str) -> DbmlResult<Self> {
        let config: CompilerConfig = toml::from_str(content)?;
        config.validated()
    }

    /// Load configuration from a directory
    ///
    /// A missing `dbml.toml` yields the defaults. Environment variable
    /// overrides are applied either way.
    pub fn load(dir: &Path) -> DbmlResult<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(schema) = std::env::var(ENV_DEFAULT_SCHEMA) {
            if !schema.is_empty() {
                self.default_schema = schema;
            }
        }

        if let Ok(flag) = std::env::var(ENV_VALIDATE_RECORDS) {
            if let Some(value) = parse_flag(&flag) {
                self.records.validate = value;
            }
        }

        if let Ok(flag) = std::env::var(ENV_CHECK_UNIQUE) {
            if let Some(value) = parse_flag(&flag) {
                self.records.check_unique = value;
            }
        }
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> DbmlResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DbmlError::ConfigError(e.to_string()))?;
        std::fs::write(dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    fn validated(self) -> DbmlResult<Self> {
        if self.default_schema.trim().is_empty() {
            return Err(DbmlError::ConfigError(
                "default_schema must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.default_schema, "public");
        assert!(config.records.validate);
        assert!(config.records.check_unique);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CompilerConfig::from_toml_str("[records]\ncheck_unique = false\n").unwrap();
        assert_eq!(config.default_schema, "public");
        assert!(config.records.validate);
        assert!(!config.records.check_unique);
    }

    #[test]
    fn test_empty_default_schema_rejected() {
        let err = CompilerConfig::from_toml_str("default_schema = \"  \"").unwrap_err();
        assert!(matches!(err, DbmlError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_toml_is_toml_error() {
        let err = CompilerConfig::from_toml_str("default_schema = ").unwrap_err();
        assert!(matches!(err, DbmlError::TomlError(_)));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CompilerConfig::default();
        config.default_schema = "core".to_string();
        config.records.validate = false;
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(content.contains("default_schema = \"core\""));

        let loaded = CompilerConfig::from_toml_str(&content).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
