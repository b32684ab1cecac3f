//! Atomic units of work
//!
//! A transaction is scoped to a fixed set of tables and opened either
//! read-only or read-write. Read-write transactions write in place and
//! journal the prior state of every key they touch; `commit` keeps the
//! writes, and dropping the transaction without committing rolls them back.
//! The rollback also runs while unwinding from a panic, so a writer that
//! dies never leaves half its writes behind.
//!
//! One writer holds the database at a time. Readers share it.

use std::fmt;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use super::database::DatabaseState;
use super::errors::{StoreError, StoreResult};
use super::table::TableStore;

/// Access mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::ReadOnly => write!(f, "readonly"),
            TransactionMode::ReadWrite => write!(f, "readwrite"),
        }
    }
}

enum Access<'db> {
    Read(RwLockReadGuard<'db, DatabaseState>),
    Write(RwLockWriteGuard<'db, DatabaseState>),
}

/// An open unit of work
pub struct Transaction<'db> {
    id: Uuid,
    mode: TransactionMode,
    scope: Vec<String>,
    access: Access<'db>,
    finished: bool,
}

impl<'db> Transaction<'db> {
    pub(crate) fn read(
        guard: RwLockReadGuard<'db, DatabaseState>,
        scope: Vec<String>,
    ) -> StoreResult<Self> {
        check_scope(&guard, &scope)?;
        let txn = Self {
            id: Uuid::new_v4(),
            mode: TransactionMode::ReadOnly,
            scope,
            access: Access::Read(guard),
            finished: false,
        };
        debug!(txn = %txn.id, mode = %txn.mode, tables = ?txn.scope, "transaction opened");
        Ok(txn)
    }

    pub(crate) fn write(
        mut guard: RwLockWriteGuard<'db, DatabaseState>,
        scope: Vec<String>,
    ) -> StoreResult<Self> {
        check_scope(&guard, &scope)?;
        for name in &scope {
            if let Some(table) = guard.tables.get_mut(name) {
                table.begin_journal();
            }
        }
        let txn = Self {
            id: Uuid::new_v4(),
            mode: TransactionMode::ReadWrite,
            scope,
            access: Access::Write(guard),
            finished: false,
        };
        debug!(txn = %txn.id, mode = %txn.mode, tables = ?txn.scope, "transaction opened");
        Ok(txn)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Reads a scoped table, including this transaction's own writes
    pub fn table(&self, name: &str) -> StoreResult<&TableStore> {
        self.ensure_scoped(name)?;
        let table = match &self.access {
            Access::Read(guard) => guard.tables.get(name),
            Access::Write(guard) => guard.tables.get(name),
        };
        table.ok_or_else(|| StoreError::table_not_found(name))
    }

    /// Borrows a scoped table for writing
    pub fn table_mut(&mut self, name: &str) -> StoreResult<&mut TableStore> {
        self.ensure_scoped(name)?;
        match &mut self.access {
            Access::Read(_) => Err(StoreError::ReadOnly(format!(
                "cannot write to '{}' in a readonly transaction",
                name
            ))),
            Access::Write(guard) => guard
                .tables
                .get_mut(name)
                .ok_or_else(|| StoreError::table_not_found(name)),
        }
    }

    /// Keeps every write and releases the database
    pub fn commit(mut self) -> StoreResult<()> {
        if let Access::Write(guard) = &mut self.access {
            for name in &self.scope {
                if let Some(table) = guard.tables.get_mut(name) {
                    table.commit_journal();
                }
            }
        }
        self.finished = true;
        debug!(txn = %self.id, "transaction committed");
        Ok(())
    }

    /// Rolls back every write
    pub fn abort(self) {
        drop(self);
    }

    fn ensure_scoped(&self, name: &str) -> StoreResult<()> {
        if self.scope.iter().any(|t| t == name) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!(
                "table '{}' is not in the transaction scope",
                name
            )))
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Access::Write(guard) = &mut self.access else {
            return;
        };
        let mut restored = 0;
        for name in &self.scope {
            if let Some(table) = guard.tables.get_mut(name) {
                restored += table.rollback();
            }
        }
        if std::thread::panicking() {
            warn!(txn = %self.id, restored, "transaction rolled back after panic");
        } else {
            debug!(txn = %self.id, restored, "transaction aborted");
        }
    }
}

fn check_scope(state: &DatabaseState, scope: &[String]) -> StoreResult<()> {
    if scope.is_empty() {
        return Err(StoreError::Data(
            "a transaction needs at least one table".to_string(),
        ));
    }
    match scope.iter().find(|name| !state.tables.contains_key(*name)) {
        Some(missing) => Err(StoreError::table_not_found(missing)),
        None => Ok(()),
    }
}
