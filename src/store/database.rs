//! A named database: its version and its tables
//!
//! All access goes through transactions. Version upgrades apply a
//! declarative schema atomically: either every missing table and index is
//! created or nothing changes.
//!
//! A writer that panics poisons the lock, but its transaction has already
//! rolled back while unwinding. The state is consistent, so the next caller
//! clears the poison and carries on.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};

use super::errors::{StoreError, StoreResult};
use super::schema::DatabaseSchema;
use super::table::TableStore;
use super::transaction::{Transaction, TransactionMode};

#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseState {
    pub(crate) version: u64,
    pub(crate) tables: BTreeMap<String, TableStore>,
}

/// One database held by the backing store
#[derive(Debug)]
pub struct Database {
    name: String,
    state: RwLock<DatabaseState>,
}

impl Database {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(DatabaseState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current schema version; zero before the first upgrade
    pub fn version(&self) -> StoreResult<u64> {
        Ok(self.read_state().version)
    }

    /// Names of every table, in order
    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.read_state().tables.keys().cloned().collect())
    }

    /// Opens a transaction over the given tables
    pub fn transaction(&self, tables: &[&str], mode: TransactionMode) -> StoreResult<Transaction<'_>> {
        let scope = tables.iter().map(|t| t.to_string()).collect();
        match mode {
            TransactionMode::ReadOnly => Transaction::read(self.read_state(), scope),
            TransactionMode::ReadWrite => Transaction::write(self.write_state(), scope),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, DatabaseState> {
        self.state.read().unwrap_or_else(|poisoned| {
            self.recover();
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DatabaseState> {
        self.state.write().unwrap_or_else(|poisoned| {
            self.recover();
            poisoned.into_inner()
        })
    }

    fn recover(&self) {
        warn!(db = %self.name, "recovering database after a panicked writer");
        self.state.clear_poison();
    }

    /// Moves the database to `version`, creating whatever `schema` declares
    /// that does not exist yet.
    ///
    /// Requesting the current version is a no-op; requesting a lower one is
    /// a version error.
    pub(crate) fn upgrade(&self, version: u64, schema: &DatabaseSchema) -> StoreResult<()> {
        let mut state = self.write_state();

        if version < state.version {
            return Err(StoreError::Version {
                requested: version,
                stored: state.version,
            });
        }
        if version == state.version {
            return Ok(());
        }

        let mut staged = state.clone();
        for table_schema in &schema.tables {
            match staged.tables.get_mut(&table_schema.name) {
                Some(table) => {
                    for index in &table_schema.indexes {
                        if !table.has_index(&index.name) {
                            info!(db = %self.name, table = %table_schema.name, index = %index.name, "creating index");
                            table.create_index(index.clone())?;
                        }
                    }
                }
                None => {
                    info!(db = %self.name, table = %table_schema.name, "creating table");
                    staged
                        .tables
                        .insert(table_schema.name.clone(), TableStore::new(table_schema.clone()));
                }
            }
        }

        info!(db = %self.name, from = state.version, to = version, "database upgraded");
        staged.version = version;
        *state = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::key::Key;
    use crate::store::schema::{IndexSchema, TableSchema};
    use serde_json::json;

    fn schema() -> DatabaseSchema {
        DatabaseSchema::new()
            .table(
                TableSchema::new("people")
                    .key_path("id")
                    .index(IndexSchema::new("name", "name")),
            )
            .table(TableSchema::new("log").auto_increment())
    }

    fn database() -> Database {
        let db = Database::new("test");
        db.upgrade(1, &schema()).unwrap();
        db
    }

    #[test]
    fn test_upgrade_creates_tables() {
        let db = database();
        assert_eq!(db.version().unwrap(), 1);
        assert_eq!(db.table_names().unwrap(), vec!["log".to_string(), "people".to_string()]);
    }

    #[test]
    fn test_downgrade_rejected() {
        let db = database();
        let err = db.upgrade(0, &schema()).unwrap_err();
        assert_eq!(err, StoreError::Version { requested: 0, stored: 1 });
    }

    #[test]
    fn test_committed_writes_visible() {
        let db = database();
        let mut txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        txn.table_mut("people").unwrap().add(json!({"id": 1}), None).unwrap();
        txn.commit().unwrap();

        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();
        assert!(txn.table("people").unwrap().get(&Key::from(1)).is_some());
    }

    #[test]
    fn test_dropped_transaction_discards_writes() {
        let db = database();
        {
            let mut txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
            txn.table_mut("people").unwrap().add(json!({"id": 1}), None).unwrap();
            txn.abort();
        }
        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();
        assert!(txn.table("people").unwrap().is_empty());
    }

    #[test]
    fn test_readonly_rejects_writes() {
        let db = database();
        let mut txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();
        assert!(matches!(txn.table_mut("people"), Err(StoreError::ReadOnly(_))));
    }

    #[test]
    fn test_scope_enforced() {
        let db = database();
        assert!(matches!(
            db.transaction(&["missing"], TransactionMode::ReadOnly),
            Err(StoreError::NotFound(_))
        ));
        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();
        assert!(matches!(txn.table("log"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_panicked_writer_rolls_back_and_releases_lock() {
        let db = std::sync::Arc::new(database());
        {
            let mut txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
            txn.table_mut("people").unwrap().add(json!({"id": 1}), None).unwrap();
            txn.commit().unwrap();
        }

        let writer = std::sync::Arc::clone(&db);
        let outcome = std::thread::spawn(move || {
            let mut txn = writer.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
            let people = txn.table_mut("people").unwrap();
            people.add(json!({"id": 2}), None).unwrap();
            people.delete(&Key::from(1));
            panic!("writer died");
        })
        .join();
        assert!(outcome.is_err());

        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();
        let people = txn.table("people").unwrap();
        assert!(people.get(&Key::from(1)).is_some());
        assert!(people.get(&Key::from(2)).is_none());
        drop(txn);

        let mut txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        txn.table_mut("people").unwrap().add(json!({"id": 3}), None).unwrap();
        txn.commit().unwrap();
        assert_eq!(db.version().unwrap(), 1);
    }

    #[test]
    fn test_failed_upgrade_leaves_database_untouched() {
        let db = database();
        {
            let mut txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
            let people = txn.table_mut("people").unwrap();
            people.add(json!({"id": 1, "email": "a"}), None).unwrap();
            people.add(json!({"id": 2, "email": "a"}), None).unwrap();
            txn.commit().unwrap();
        }

        let upgraded = DatabaseSchema::new()
            .table(
                TableSchema::new("people")
                    .key_path("id")
                    .index(IndexSchema::new("email", "email").unique()),
            )
            .table(TableSchema::new("extra"));
        assert!(db.upgrade(2, &upgraded).unwrap_err().is_constraint());
        assert_eq!(db.version().unwrap(), 1);
        assert!(!db.table_names().unwrap().contains(&"extra".to_string()));
    }
}
