//! Database configuration files and open options

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::connection::Connection;
use crate::query::QueryResult;
use crate::store::{DatabaseSchema, TableSchema};

use super::errors::{ConfigError, ConfigResult};

/// What `Registry::open` needs to open one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    pub name: String,
    pub version: u64,
    pub schema: DatabaseSchema,
}

impl OpenOptions {
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
            schema: DatabaseSchema::new(),
        }
    }

    /// Declares a table to create on upgrade
    pub fn table(mut self, table: TableSchema) -> Self {
        self.schema = self.schema.table(table);
        self
    }

    pub fn schema(mut self, schema: DatabaseSchema) -> Self {
        self.schema = schema;
        self
    }
}

/// A database described by a JSON file
///
/// ```json
/// {
///   "name": "app",
///   "version": 1,
///   "schema": {"tables": [{"name": "people", "key_path": "id"}]},
///   "seed": {"people": [{"id": 1, "name": "A"}]}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name
    pub name: String,

    /// Schema version; must be at least 1
    pub version: u64,

    /// Tables and indexes to create
    #[serde(default)]
    pub schema: DatabaseSchema,

    /// Records written after opening, per table
    #[serde(default)]
    pub seed: BTreeMap<String, Vec<Value>>,
}

impl DatabaseConfig {
    /// Loads and validates a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: DatabaseConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for inconsistencies
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name must not be empty"));
        }
        if self.version == 0 {
            return Err(ConfigError::invalid("version must be at least 1"));
        }
        self.schema
            .validate_structure()
            .map_err(ConfigError::Invalid)?;

        if let Some(table) = self.seed.keys().find(|t| self.schema.get(t).is_none()) {
            return Err(ConfigError::invalid(format!(
                "seed names unknown table '{}'",
                table
            )));
        }
        Ok(())
    }

    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::new(self.name.clone(), self.version).schema(self.schema.clone())
    }

    /// Upserts the seed records, one transaction per table.
    ///
    /// Returns the number of records written.
    pub async fn seed_into(&self, connection: &Connection) -> QueryResult<usize> {
        let mut written = 0;
        for (table, records) in &self.seed {
            let stored = connection.update(table, records.iter().cloned())?.await?;
            written += stored.len();
        }
        if written > 0 {
            info!(db = %self.name, records = written, "seed applied");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Registry;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(value: &Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    fn sample() -> Value {
        json!({
            "name": "app",
            "version": 1,
            "schema": {
                "tables": [{
                    "name": "people",
                    "key_path": "id",
                    "indexes": [{"name": "name", "key_path": "name"}]
                }]
            },
            "seed": {"people": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]}
        })
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(&sample());
        let config = DatabaseConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "app");
        assert_eq!(config.schema.tables[0].indexes[0].name, "name");
        assert_eq!(config.seed["people"].len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = DatabaseConfig::load(Path::new("/nonexistent/cursordb.json")).unwrap_err();
        assert_eq!(err.code(), "CURSORDB_CONFIG_READ");
    }

    #[test]
    fn test_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = DatabaseConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_version_rejected() {
        let mut value = sample();
        value["version"] = json!(0);
        let err = DatabaseConfig::load(write_config(&value).path()).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_unknown_seed_table_rejected() {
        let mut value = sample();
        value["seed"] = json!({"ghosts": [{"id": 1}]});
        let err = DatabaseConfig::load(write_config(&value).path()).unwrap_err();
        assert!(err.to_string().contains("ghosts"));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut value = sample();
        value["schema"]["tables"] = json!([{"name": "t"}, {"name": "t"}]);
        value["seed"] = json!({});
        let err = DatabaseConfig::load(write_config(&value).path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_seed_into_connection() {
        let file = write_config(&sample());
        let config = DatabaseConfig::load(file.path()).unwrap();
        let registry = Registry::new();
        let conn = registry.open(config.open_options()).unwrap().await.unwrap();

        assert_eq!(config.seed_into(&conn).await.unwrap(), 2);
        assert_eq!(conn.count("people").unwrap().await.unwrap(), 2);
    }
}
