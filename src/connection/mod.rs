//! Connections, table proxies and the connection registry
//!
//! A `Connection` is a handle on one opened database. It is the entry point
//! for queries and for the per-table CRUD façade. Closing it is final: every
//! later call fails synchronously with `ConnectionClosed`.
//!
//! # Design Principles
//!
//! - Explicit ownership: connections are cached by an owned `Registry`,
//!   never by process-wide state
//! - Fail fast: a closed connection never opens a transaction
//! - One call, one transaction

mod facade;
mod registry;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::query::{QueryError, QueryResult, QuerySource, ResultHandle};
use crate::store::{Database, StoredRecord};

pub use registry::Registry;

/// Table names that would shadow a connection operation
pub const RESERVED_NAMES: [&str; 10] = [
    "add", "update", "remove", "clear", "get", "query", "count", "close", "table", "tables",
];

/// One record submitted to `add` or `update`, with an optional out-of-line key
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Option<Value>,
    pub value: Value,
}

impl Entry {
    /// Pairs a record with an explicit key
    pub fn with_key(key: impl Into<Value>, value: Value) -> Self {
        Self {
            key: Some(key.into()),
            value,
        }
    }
}

impl From<Value> for Entry {
    fn from(value: Value) -> Self {
        Self { key: None, value }
    }
}

struct ConnectionInner {
    name: String,
    version: u64,
    database: Arc<Database>,
    closed: AtomicBool,
}

/// Handle on an opened database
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub(crate) fn new(name: impl Into<String>, version: u64, database: Arc<Database>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                name: name.into(),
                version,
                database,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Version requested when this connection was opened
    pub fn version(&self) -> u64 {
        self.inner.version
    }

    /// Closes the connection. Idempotent.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!(db = %self.inner.name, "connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Names of every table
    pub fn tables(&self) -> QueryResult<Vec<String>> {
        Ok(self.database()?.table_names()?)
    }

    /// Named handle on one table
    pub fn table(&self, name: impl Into<String>) -> TableProxy {
        TableProxy {
            connection: self.clone(),
            name: name.into(),
        }
    }

    /// Starts a query over a table, or over one of its indexes
    pub fn query(&self, table: &str, index: Option<&str>) -> QueryResult<QuerySource> {
        self.ensure_open()?;
        Ok(QuerySource::new(self.clone(), table, index.map(str::to_string)))
    }

    /// The underlying database, unless the connection is closed
    pub(crate) fn database(&self) -> QueryResult<Arc<Database>> {
        self.ensure_open()?;
        Ok(Arc::clone(&self.inner.database))
    }

    /// True when both handles share one underlying connection
    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_open(&self) -> QueryResult<()> {
        if self.is_closed() {
            return Err(QueryError::ConnectionClosed(self.inner.name.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A connection bound to one table name
#[derive(Debug, Clone)]
pub struct TableProxy {
    connection: Connection,
    name: String,
}

impl TableProxy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn add<I, E>(&self, entries: I) -> QueryResult<ResultHandle<Vec<StoredRecord>>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        self.connection.add(&self.name, entries)
    }

    pub fn update<I, E>(&self, entries: I) -> QueryResult<ResultHandle<Vec<StoredRecord>>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        self.connection.update(&self.name, entries)
    }

    pub fn remove(&self, key: impl Into<Value>) -> QueryResult<ResultHandle<bool>> {
        self.connection.remove(&self.name, key)
    }

    pub fn clear(&self) -> QueryResult<ResultHandle<()>> {
        self.connection.clear(&self.name)
    }

    pub fn get(&self, key: impl Into<Value>) -> QueryResult<ResultHandle<Option<Value>>> {
        self.connection.get(&self.name, key)
    }

    pub fn count(&self) -> QueryResult<ResultHandle<u64>> {
        self.connection.count(&self.name)
    }

    /// Starts a query over this table or one of its indexes
    pub fn query(&self, index: Option<&str>) -> QueryResult<QuerySource> {
        self.connection.query(&self.name, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DatabaseSchema, Factory, TableSchema};
    use serde_json::json;

    fn connection() -> Connection {
        let schema = DatabaseSchema::new().table(TableSchema::new("people").key_path("id"));
        let database = Factory::new().open("conn", 1, &schema).unwrap();
        Connection::new("conn", 1, database)
    }

    #[test]
    fn test_close_is_final_and_synchronous() {
        let conn = connection();
        assert!(conn.query("people", None).is_ok());

        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert!(matches!(
            conn.query("people", None),
            Err(QueryError::ConnectionClosed(_))
        ));
        assert!(matches!(conn.tables(), Err(QueryError::ConnectionClosed(_))));
    }

    #[test]
    fn test_clones_share_closed_flag() {
        let conn = connection();
        let other = conn.clone();
        other.close();
        assert!(conn.is_closed());
        assert!(conn.same_as(&other));
    }

    #[test]
    fn test_entry_conversions() {
        let plain: Entry = json!({"a": 1}).into();
        assert_eq!(plain.key, None);
        let keyed = Entry::with_key("k", json!({"a": 1}));
        assert_eq!(keyed.key, Some(json!("k")));
    }

    #[test]
    fn test_tables_and_proxy() {
        let conn = connection();
        assert_eq!(conn.tables().unwrap(), vec!["people".to_string()]);
        let proxy = conn.table("people");
        assert_eq!(proxy.name(), "people");
        assert!(proxy.connection().same_as(&conn));
    }
}
