//! Ordered iteration cursors
//!
//! A cursor captures the ordered positions of a table or index walk when it
//! is opened and then steps through them. Values are read from, and written
//! back to, the table the cursor was opened on.

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::key::Key;
use super::table::{StoredRecord, TableStore};

/// Iteration direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending key order
    #[default]
    Next,
    /// Ascending, one entry per distinct key
    NextUnique,
    /// Descending key order
    Prev,
    /// Descending, one entry per distinct key
    PrevUnique,
}

impl Direction {
    pub fn from_flags(descending: bool, unique: bool) -> Self {
        match (descending, unique) {
            (false, false) => Direction::Next,
            (false, true) => Direction::NextUnique,
            (true, false) => Direction::Prev,
            (true, true) => Direction::PrevUnique,
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Direction::Prev | Direction::PrevUnique)
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, Direction::NextUnique | Direction::PrevUnique)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::NextUnique => "nextunique",
            Direction::Prev => "prev",
            Direction::PrevUnique => "prevunique",
        }
    }
}

/// One cursor position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorEntry {
    /// Index key, or the primary key when walking primary storage
    pub key: Key,
    /// Primary key of the record at this position
    pub primary_key: Key,
}

/// A cursor over a table or one of its indexes
#[derive(Debug)]
pub struct Cursor {
    table: String,
    index: Option<String>,
    direction: Direction,
    entries: Vec<CursorEntry>,
    position: usize,
}

impl Cursor {
    pub(crate) fn new(
        table: &str,
        index: Option<&str>,
        direction: Direction,
        entries: Vec<CursorEntry>,
    ) -> Self {
        Self {
            table: table.to_string(),
            index: index.map(str::to_string),
            direction,
            entries,
            position: 0,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Entry at the current position, or None once exhausted
    pub fn current(&self) -> Option<&CursorEntry> {
        self.entries.get(self.position)
    }

    /// Moves forward by `count` positions
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count).min(self.entries.len());
    }

    /// Returns true once every position has been visited
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.entries.len()
    }

    /// Positions not yet visited, including the current one
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.position
    }

    /// Reads the record at the current position
    pub fn value<'t>(&self, table: &'t TableStore) -> StoreResult<Option<&'t Value>> {
        self.check_table(table)?;
        Ok(self.current().and_then(|entry| table.get(&entry.primary_key)))
    }

    /// Replaces the record at the current position
    pub fn update(&self, table: &mut TableStore, value: Value) -> StoreResult<StoredRecord> {
        self.check_table(table)?;
        let entry = self
            .current()
            .ok_or_else(|| StoreError::Data("cursor is exhausted".to_string()))?;
        table.replace_at(&entry.primary_key, value)
    }

    /// Deletes the record at the current position
    pub fn delete(&self, table: &mut TableStore) -> StoreResult<bool> {
        self.check_table(table)?;
        let entry = self
            .current()
            .ok_or_else(|| StoreError::Data("cursor is exhausted".to_string()))?;
        Ok(table.delete(&entry.primary_key))
    }

    fn check_table(&self, table: &TableStore) -> StoreResult<()> {
        if table.name() != self.table {
            return Err(StoreError::Data(format!(
                "cursor opened on '{}' used with table '{}'",
                self.table,
                table.name()
            )));
        }
        Ok(())
    }
}
