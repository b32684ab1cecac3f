//! Declarative table and index definitions
//!
//! A database schema is applied during a version upgrade: every table and
//! index it names is created if missing. Existing tables are never dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::key::KeyPath;

/// Secondary index definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name, unique within its table
    pub name: String,
    /// Path of the indexed value inside each record
    pub key_path: KeyPath,
    /// Reject two records sharing an index key
    #[serde(default)]
    pub unique: bool,
    /// Index each element of an array value separately
    #[serde(default)]
    pub multi_entry: bool,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, key_path: impl Into<KeyPath>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
            multi_entry: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn multi_entry(mut self) -> Self {
        self.multi_entry = true;
        self
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Inline primary key location; absent means keys are supplied
    /// out-of-band or generated
    #[serde(default)]
    pub key_path: Option<KeyPath>,
    /// Generate numeric keys for records that lack one
    #[serde(default)]
    pub auto_increment: bool,
    /// Secondary indexes
    #[serde(default)]
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: None,
            auto_increment: false,
            indexes: Vec::new(),
        }
    }

    pub fn key_path(mut self, key_path: impl Into<KeyPath>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    /// Validates internal consistency of the definition
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("table name must not be empty".to_string());
        }
        if self.auto_increment && matches!(self.key_path, Some(KeyPath::Compound(_))) {
            return Err(format!(
                "table '{}': auto_increment requires a single key path",
                self.name
            ));
        }

        let mut seen = HashSet::new();
        for index in &self.indexes {
            if !seen.insert(index.name.as_str()) {
                return Err(format!(
                    "table '{}': duplicate index '{}'",
                    self.name, index.name
                ));
            }
            if index.multi_entry && matches!(index.key_path, KeyPath::Compound(_)) {
                return Err(format!(
                    "table '{}': multi_entry index '{}' requires a single key path",
                    self.name, index.name
                ));
            }
        }
        Ok(())
    }
}

/// Full database definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// Finds a table definition by name
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Validates every table and rejects duplicate table names
    pub fn validate_structure(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(format!("duplicate table '{}'", table.name));
            }
            table.validate_structure()?;
        }
        Ok(())
    }
}
