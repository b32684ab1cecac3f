//! Per-table primary storage and index maintenance
//!
//! Records live in a BTreeMap ordered by primary key. Every write keeps the
//! secondary indexes in step with primary storage, and every constraint is
//! checked before anything is mutated so a failed write leaves the table
//! untouched.
//!
//! Inside a read-write transaction the table keeps an undo log: the prior
//! value of every key the transaction touched and the generator position it
//! started from. Rolling back replays the log, so aborting costs as much as
//! the writes made, not the size of the table.

use std::collections::BTreeMap;

use serde_json::Value;

use super::cursor::{Cursor, CursorEntry, Direction};
use super::errors::{StoreError, StoreResult};
use super::index::IndexTree;
use super::key::Key;
use super::range::KeyRange;
use super::schema::{IndexSchema, TableSchema};

/// Largest key the generator hands out (2^53)
const MAX_GENERATED_KEY: u64 = 9_007_199_254_740_992;

/// A record as stored, with its primary key made explicit
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: Key,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Fail if the key already exists
    Add,
    /// Insert or replace
    Put,
}

/// Prior state of everything a transaction wrote
#[derive(Debug, Clone)]
struct UndoLog {
    records: BTreeMap<Key, Option<Value>>,
    next_key: u64,
}

/// One table of the backing store
#[derive(Debug, Clone)]
pub struct TableStore {
    schema: TableSchema,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, IndexTree>,
    next_key: u64,
    journal: Option<UndoLog>,
}

impl TableStore {
    /// Creates an empty table with the indexes its schema declares
    pub fn new(schema: TableSchema) -> Self {
        let indexes = schema
            .indexes
            .iter()
            .map(|index| (index.name.clone(), IndexTree::new(index.clone())))
            .collect();

        Self {
            schema,
            records: BTreeMap::new(),
            indexes,
            next_key: 1,
            journal: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    /// Looks up a secondary index
    pub fn index(&self, name: &str) -> StoreResult<&IndexTree> {
        self.indexes
            .get(name)
            .ok_or_else(|| StoreError::index_not_found(self.name(), name))
    }

    /// Adds an index and back-fills it from existing records.
    ///
    /// Fails without modifying the table if back-filling violates uniqueness.
    pub fn create_index(&mut self, schema: IndexSchema) -> StoreResult<()> {
        if self.indexes.contains_key(&schema.name) {
            return Err(StoreError::Constraint(format!(
                "index '{}' already exists on table '{}'",
                schema.name,
                self.name()
            )));
        }

        let mut tree = IndexTree::new(schema.clone());
        for (primary_key, record) in &self.records {
            for key in tree.keys_for(record) {
                if tree.is_unique() && tree.conflicting_owner(&key, primary_key).is_some() {
                    return Err(StoreError::Constraint(format!(
                        "unique index '{}' on table '{}' has duplicate key {}",
                        schema.name,
                        self.name(),
                        key
                    )));
                }
                tree.insert(key, primary_key.clone());
            }
        }

        self.schema.indexes.push(schema.clone());
        self.indexes.insert(schema.name, tree);
        Ok(())
    }

    /// Reads a record by primary key
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.records.get(key)
    }

    /// Inserts a new record; fails if its key already exists
    pub fn add(&mut self, value: Value, key: Option<Key>) -> StoreResult<StoredRecord> {
        self.write(value, key, WriteMode::Add)
    }

    /// Inserts or replaces a record
    pub fn put(&mut self, value: Value, key: Option<Key>) -> StoreResult<StoredRecord> {
        self.write(value, key, WriteMode::Put)
    }

    /// Deletes a record by primary key. Returns true if it existed.
    pub fn delete(&mut self, key: &Key) -> bool {
        self.remember(key);
        self.remove_entry(key).is_some()
    }

    /// Removes every record. The key generator is not reset.
    pub fn clear(&mut self) {
        if let Some(journal) = &mut self.journal {
            for (key, value) in &self.records {
                journal
                    .records
                    .entry(key.clone())
                    .or_insert_with(|| Some(value.clone()));
            }
        }
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    /// Number of records, or index entries, inside an optional range
    pub fn count(&self, index: Option<&str>, range: Option<&KeyRange>) -> StoreResult<usize> {
        match index {
            Some(name) => Ok(self.index(name)?.count(range)),
            None => Ok(match range {
                Some(range) => self.records.range::<Key, _>(range.bounds()).count(),
                None => self.records.len(),
            }),
        }
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Opens a cursor over primary storage or a named index
    pub fn open_cursor(
        &self,
        index: Option<&str>,
        range: Option<&KeyRange>,
        direction: Direction,
    ) -> StoreResult<Cursor> {
        let mut entries: Vec<CursorEntry> = match index {
            Some(name) => {
                let tree = self.index(name)?;
                let pairs = if direction.is_unique() {
                    tree.unique_entries(range)
                } else {
                    tree.entries(range)
                };
                pairs
                    .into_iter()
                    .map(|(key, primary_key)| CursorEntry { key, primary_key })
                    .collect()
            }
            None => {
                let keys: Vec<&Key> = match range {
                    Some(range) => self.records.range::<Key, _>(range.bounds()).map(|(k, _)| k).collect(),
                    None => self.records.keys().collect(),
                };
                keys.into_iter()
                    .map(|k| CursorEntry {
                        key: k.clone(),
                        primary_key: k.clone(),
                    })
                    .collect()
            }
        };

        if direction.is_reverse() {
            entries.reverse();
        }

        Ok(Cursor::new(self.name(), index, direction, entries))
    }

    /// Replaces the record stored under an existing primary key.
    ///
    /// Inline-keyed tables must not see their key change.
    pub(crate) fn replace_at(&mut self, primary_key: &Key, value: Value) -> StoreResult<StoredRecord> {
        if !self.records.contains_key(primary_key) {
            return Err(StoreError::NotFound(format!(
                "record {} in table '{}'",
                primary_key,
                self.name()
            )));
        }
        if let Some(path) = &self.schema.key_path {
            if path.extract_key(&value).as_ref() != Some(primary_key) {
                return Err(StoreError::Data(format!(
                    "update would change primary key {} at '{}'",
                    primary_key, path
                )));
            }
            return self.write(value, None, WriteMode::Put);
        }
        self.write(value, Some(primary_key.clone()), WriteMode::Put)
    }

    fn write(&mut self, mut value: Value, key: Option<Key>, mode: WriteMode) -> StoreResult<StoredRecord> {
        let (key, generated) = self.resolve_key(&value, key)?;

        if mode == WriteMode::Add && self.records.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "key {} already exists in table '{}'",
                key,
                self.name()
            )));
        }

        if generated {
            if let Some(path) = &self.schema.key_path {
                path.inject(&mut value, &key)?;
            }
        }

        // Check every unique index before mutating anything
        let mut staged = Vec::with_capacity(self.indexes.len());
        for (name, index) in &self.indexes {
            let keys = index.keys_for(&value);
            if index.is_unique() {
                if let Some(owner) = keys.iter().find_map(|k| index.conflicting_owner(k, &key)) {
                    return Err(StoreError::Constraint(format!(
                        "unique index '{}' on table '{}' already maps to {}",
                        name,
                        self.name(),
                        owner
                    )));
                }
            }
            staged.push((name.clone(), keys));
        }

        if generated {
            self.next_key += 1;
        } else {
            self.observe_key(&key);
        }

        self.remember(&key);
        self.remove_entry(&key);
        for (name, keys) in staged {
            if let Some(index) = self.indexes.get_mut(&name) {
                for index_key in keys {
                    index.insert(index_key, key.clone());
                }
            }
        }
        self.records.insert(key.clone(), value.clone());

        Ok(StoredRecord { key, value })
    }

    /// Starts recording prior state for a rollback
    pub(crate) fn begin_journal(&mut self) {
        self.journal = Some(UndoLog {
            records: BTreeMap::new(),
            next_key: self.next_key,
        });
    }

    /// Keeps every write made since `begin_journal`
    pub(crate) fn commit_journal(&mut self) {
        self.journal = None;
    }

    /// Undoes every write made since `begin_journal`. Returns the number of
    /// keys restored.
    pub(crate) fn rollback(&mut self) -> usize {
        let Some(journal) = self.journal.take() else {
            return 0;
        };
        let restored = journal.records.len();
        for (key, prior) in journal.records {
            self.remove_entry(&key);
            if let Some(value) = prior {
                self.insert_entry(key, value);
            }
        }
        self.next_key = journal.next_key;
        restored
    }

    /// Records the value under `key` before its first change
    fn remember(&mut self, key: &Key) {
        if let Some(journal) = &mut self.journal {
            if !journal.records.contains_key(key) {
                journal.records.insert(key.clone(), self.records.get(key).cloned());
            }
        }
    }

    fn remove_entry(&mut self, key: &Key) -> Option<Value> {
        let old = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            for index_key in index.keys_for(&old) {
                index.remove(&index_key, key);
            }
        }
        Some(old)
    }

    fn insert_entry(&mut self, key: Key, value: Value) {
        for index in self.indexes.values_mut() {
            for index_key in index.keys_for(&value) {
                index.insert(index_key, key.clone());
            }
        }
        self.records.insert(key, value);
    }

    /// Determines the primary key for a write. The flag is true when the
    /// key came from the generator.
    fn resolve_key(&self, value: &Value, explicit: Option<Key>) -> StoreResult<(Key, bool)> {
        match (&self.schema.key_path, explicit) {
            (Some(path), Some(_)) => Err(StoreError::Data(format!(
                "table '{}' uses inline keys at '{}'; an explicit key is not allowed",
                self.name(),
                path
            ))),
            (Some(path), None) => match path.evaluate(value) {
                Some(raw) => Key::from_json(&raw).map(|k| (k, false)).ok_or_else(|| {
                    StoreError::Data(format!("{} at '{}' is not a valid key", raw, path))
                }),
                None if self.schema.auto_increment => self.generate_key().map(|k| (k, true)),
                None => Err(StoreError::Data(format!(
                    "record has no key at '{}' and table '{}' does not generate keys",
                    path,
                    self.name()
                ))),
            },
            (None, Some(key)) => Ok((key, false)),
            (None, None) if self.schema.auto_increment => self.generate_key().map(|k| (k, true)),
            (None, None) => Err(StoreError::Data(format!(
                "table '{}' requires an explicit key",
                self.name()
            ))),
        }
    }

    fn generate_key(&self) -> StoreResult<Key> {
        if self.next_key > MAX_GENERATED_KEY {
            return Err(StoreError::Constraint(format!(
                "key generator exhausted for table '{}'",
                self.name()
            )));
        }
        // Generated keys stay below 2^53 and convert to f64 exactly
        Key::from_f64(self.next_key as f64)
            .ok_or_else(|| StoreError::Data("generated key is not a number".to_string()))
    }

    /// Moves the generator past an explicitly supplied numeric key
    fn observe_key(&mut self, key: &Key) {
        if !self.schema.auto_increment {
            return;
        }
        if let Some(n) = key.as_f64() {
            if n >= self.next_key as f64 {
                let next = n.floor() + 1.0;
                self.next_key = if next > MAX_GENERATED_KEY as f64 {
                    MAX_GENERATED_KEY + 1
                } else {
                    next as u64
                };
            }
        }
    }
}
