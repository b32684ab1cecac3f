//! Connection registry
//!
//! Deduplicates opens by database name. Each registry owns its own backing
//! store and cache, so two registries never see each other's databases.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::config::OpenOptions;
use crate::query::{QueryError, QueryResult, ResultHandle};
use crate::store::{Factory, StoreError};

use super::{Connection, RESERVED_NAMES};

/// Owned cache of open connections
#[derive(Debug, Clone, Default)]
pub struct Registry {
    factory: Factory,
    connections: Arc<Mutex<HashMap<String, Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry over an existing backing store
    pub fn with_factory(factory: Factory) -> Self {
        Self {
            factory,
            connections: Arc::default(),
        }
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Opens a database, or returns the cached open connection for it.
    ///
    /// Reserved table names fail synchronously. A cached connection is
    /// reused only while it is open and was opened at the same version;
    /// otherwise the database is reopened and the cache entry replaced.
    pub fn open(&self, options: OpenOptions) -> QueryResult<ResultHandle<Connection>> {
        check_table_names(&options)?;

        if let Some(conn) = self.cached(&options.name)? {
            if conn.version() == options.version {
                return ResultHandle::spawn(move || Ok(conn));
            }
        }

        let registry = self.clone();
        ResultHandle::spawn(move || {
            // Overlapping opens race to here; the cache lock decides
            let mut connections = registry.lock()?;
            if let Some(cached) = connections.get(&options.name) {
                if !cached.is_closed() && cached.version() == options.version {
                    return Ok(cached.clone());
                }
            }

            let database = registry
                .factory
                .open(&options.name, options.version, &options.schema)?;
            let conn = Connection::new(options.name.clone(), options.version, database);

            if let Some(previous) = connections.insert(options.name.clone(), conn.clone()) {
                if !previous.is_closed() {
                    info!(
                        db = %options.name,
                        from = previous.version(),
                        to = options.version,
                        "closing connection replaced by version change"
                    );
                    previous.close();
                }
            }
            info!(db = %options.name, version = options.version, "connection opened");
            Ok(conn)
        })
    }

    /// Closes and evicts the cached connection. Returns true if one was cached.
    pub fn close(&self, name: &str) -> QueryResult<bool> {
        let evicted = self.lock()?.remove(name);
        Ok(match evicted {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        })
    }

    /// Deletes a database; rejects with a blocked error while it is open
    pub fn delete_database(&self, name: &str) -> QueryResult<ResultHandle<bool>> {
        let registry = self.clone();
        let name = name.to_string();
        ResultHandle::spawn(move || {
            let mut connections = registry.lock()?;
            if let Some(conn) = connections.get(&name) {
                if !conn.is_closed() {
                    return Err(StoreError::Blocked(format!(
                        "database '{}' has an open connection",
                        name
                    ))
                    .into());
                }
                connections.remove(&name);
            }
            Ok(registry.factory.delete(&name)?)
        })
    }

    /// The cached connection for `name`, if it is still open
    pub fn cached(&self, name: &str) -> QueryResult<Option<Connection>> {
        Ok(self
            .lock()?
            .get(name)
            .filter(|conn| !conn.is_closed())
            .cloned())
    }

    /// Closes every cached connection and empties the cache
    pub fn shutdown(&self) -> QueryResult<()> {
        let drained: Vec<Connection> = self.lock()?.drain().map(|(_, conn)| conn).collect();
        for conn in &drained {
            conn.close();
        }
        if !drained.is_empty() {
            info!(connections = drained.len(), "registry shut down");
        }
        Ok(())
    }

    fn lock(&self) -> QueryResult<std::sync::MutexGuard<'_, HashMap<String, Connection>>> {
        self.connections
            .lock()
            .map_err(|_| QueryError::Store(StoreError::Poisoned))
    }
}

fn check_table_names(options: &OpenOptions) -> QueryResult<()> {
    match options
        .schema
        .tables
        .iter()
        .find(|table| RESERVED_NAMES.contains(&table.name.as_str()))
    {
        Some(table) => Err(QueryError::invalid_argument(format!(
            "table name '{}' is reserved",
            table.name
        ))),
        None => Ok(()),
    }
}
