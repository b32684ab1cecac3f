//! Database factory: open, upgrade and delete databases by name
//!
//! The factory is the backing store's entry point. Databases outlive the
//! connections opened on them, so reopening a name sees earlier data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use super::database::Database;
use super::errors::{StoreError, StoreResult};
use super::schema::DatabaseSchema;

/// Holds every database of one backing store
#[derive(Debug, Clone, Default)]
pub struct Factory {
    databases: Arc<Mutex<HashMap<String, Arc<Database>>>>,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a database, creating and upgrading it as needed.
    ///
    /// Versions start at 1. Asking for a version above the stored one
    /// applies `schema`; asking for a lower one fails.
    pub fn open(&self, name: &str, version: u64, schema: &DatabaseSchema) -> StoreResult<Arc<Database>> {
        if version == 0 {
            return Err(StoreError::Data("database version must be at least 1".to_string()));
        }
        schema.validate_structure().map_err(StoreError::Data)?;

        let database = {
            let mut databases = self.databases.lock().map_err(|_| StoreError::Poisoned)?;
            Arc::clone(
                databases
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(Database::new(name))),
            )
        };

        database.upgrade(version, schema)?;
        Ok(database)
    }

    /// Deletes a database. Returns true if it existed.
    pub fn delete(&self, name: &str) -> StoreResult<bool> {
        let mut databases = self.databases.lock().map_err(|_| StoreError::Poisoned)?;
        let existed = databases.remove(name).is_some();
        if existed {
            info!(db = %name, "database deleted");
        }
        Ok(existed)
    }

    /// Returns true if a database with this name exists
    pub fn exists(&self, name: &str) -> StoreResult<bool> {
        let databases = self.databases.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(databases.contains_key(name))
    }
}
