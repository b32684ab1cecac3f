//! Per-table CRUD façade
//!
//! Each call opens its own transaction: read-write for add, update, remove
//! and clear, read-only for get and count.

use serde_json::Value;
use tracing::{debug, warn};

use crate::query::{QueryResult, ResultHandle};
use crate::store::{Database, Key, StoreResult, StoredRecord, TransactionMode};

use super::{Connection, Entry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Add,
    Put,
}

impl Connection {
    /// Inserts records; fails if any key already exists
    pub fn add<I, E>(&self, table: &str, entries: I) -> QueryResult<ResultHandle<Vec<StoredRecord>>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        self.write(table, entries, WriteKind::Add)
    }

    /// Inserts or replaces records
    pub fn update<I, E>(&self, table: &str, entries: I) -> QueryResult<ResultHandle<Vec<StoredRecord>>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        self.write(table, entries, WriteKind::Put)
    }

    /// Deletes one record; resolves true if it existed
    pub fn remove(&self, table: &str, key: impl Into<Value>) -> QueryResult<ResultHandle<bool>> {
        let database = self.database()?;
        let table = table.to_string();
        let key = key.into();
        ResultHandle::spawn(move || {
            let removed = logged(&database, &table, "remove", || {
                let key = Key::try_from_json(&key)?;
                let mut txn = database.transaction(&[table.as_str()], TransactionMode::ReadWrite)?;
                let removed = txn.table_mut(&table)?.delete(&key);
                txn.commit()?;
                Ok(removed)
            })?;
            Ok(removed)
        })
    }

    /// Deletes every record of a table
    pub fn clear(&self, table: &str) -> QueryResult<ResultHandle<()>> {
        let database = self.database()?;
        let table = table.to_string();
        ResultHandle::spawn(move || {
            logged(&database, &table, "clear", || {
                let mut txn = database.transaction(&[table.as_str()], TransactionMode::ReadWrite)?;
                txn.table_mut(&table)?.clear();
                txn.commit()
            })?;
            Ok(())
        })
    }

    /// Reads one record by primary key
    pub fn get(&self, table: &str, key: impl Into<Value>) -> QueryResult<ResultHandle<Option<Value>>> {
        let database = self.database()?;
        let table = table.to_string();
        let key = key.into();
        ResultHandle::spawn(move || {
            let value = logged(&database, &table, "get", || {
                let key = Key::try_from_json(&key)?;
                let txn = database.transaction(&[table.as_str()], TransactionMode::ReadOnly)?;
                let value = txn.table(&table)?.get(&key).cloned();
                txn.commit()?;
                Ok(value)
            })?;
            Ok(value)
        })
    }

    /// Number of records in a table
    pub fn count(&self, table: &str) -> QueryResult<ResultHandle<u64>> {
        let database = self.database()?;
        let table = table.to_string();
        ResultHandle::spawn(move || {
            let n = logged(&database, &table, "count", || {
                let txn = database.transaction(&[table.as_str()], TransactionMode::ReadOnly)?;
                let n = txn.table(&table)?.len();
                txn.commit()?;
                Ok(n as u64)
            })?;
            Ok(n)
        })
    }

    fn write<I, E>(&self, table: &str, entries: I, kind: WriteKind) -> QueryResult<ResultHandle<Vec<StoredRecord>>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        let database = self.database()?;
        let table = table.to_string();
        let entries: Vec<Entry> = entries.into_iter().map(Into::into).collect();
        let op = match kind {
            WriteKind::Add => "add",
            WriteKind::Put => "update",
        };
        ResultHandle::spawn(move || {
            let stored = logged(&database, &table, op, || write_entries(&database, &table, entries, kind))?;
            Ok(stored)
        })
    }
}

/// Writes every entry in one transaction; the first failure discards all
fn write_entries(database: &Database, table: &str, entries: Vec<Entry>, kind: WriteKind) -> StoreResult<Vec<StoredRecord>> {
    let mut txn = database.transaction(&[table], TransactionMode::ReadWrite)?;
    let store = txn.table_mut(table)?;

    let mut stored = Vec::with_capacity(entries.len());
    for entry in entries {
        let key = entry.key.as_ref().map(Key::try_from_json).transpose()?;
        let record = match kind {
            WriteKind::Add => store.add(entry.value, key)?,
            WriteKind::Put => store.put(entry.value, key)?,
        };
        stored.push(record);
    }

    txn.commit()?;
    Ok(stored)
}

/// Runs one façade operation, logging its outcome
fn logged<T>(database: &Database, table: &str, op: &str, work: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
    match work() {
        Ok(value) => {
            debug!(db = %database.name(), table = %table, op = op, "store call completed");
            Ok(value)
        }
        Err(err) => {
            warn!(
                db = %database.name(),
                table = %table,
                op = op,
                code = err.code(),
                error = %err,
                "store call failed"
            );
            Err(err)
        }
    }
}
