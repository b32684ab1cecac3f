//! BTreeMap-based secondary index structures
//!
//! An index maps each index key to the ordered set of primary keys of the
//! records carrying it. Iteration is in (index key, primary key) order.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::key::Key;
use super::range::KeyRange;
use super::schema::IndexSchema;

/// A single secondary index
#[derive(Debug, Clone)]
pub struct IndexTree {
    schema: IndexSchema,
    tree: BTreeMap<Key, BTreeSet<Key>>,
}

impl IndexTree {
    /// Creates a new empty index
    pub fn new(schema: IndexSchema) -> Self {
        Self {
            schema,
            tree: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn is_unique(&self) -> bool {
        self.schema.unique
    }

    /// Index keys a record contributes.
    ///
    /// Missing or invalid values contribute nothing. Multi-entry indexes
    /// contribute each valid, distinct array element.
    pub fn keys_for(&self, record: &Value) -> Vec<Key> {
        let value = match self.schema.key_path.evaluate(record) {
            Some(v) => v,
            None => return Vec::new(),
        };

        match (&value, self.schema.multi_entry) {
            (Value::Array(items), true) => {
                let distinct: BTreeSet<Key> = items.iter().filter_map(Key::from_json).collect();
                distinct.into_iter().collect()
            }
            _ => Key::from_json(&value).into_iter().collect(),
        }
    }

    /// Returns the primary key already holding `key`, other than `primary_key`
    pub fn conflicting_owner(&self, key: &Key, primary_key: &Key) -> Option<&Key> {
        self.tree
            .get(key)
            .and_then(|owners| owners.iter().find(|owner| *owner != primary_key))
    }

    /// Insert a primary key under an index key
    pub fn insert(&mut self, key: Key, primary_key: Key) {
        self.tree.entry(key).or_default().insert(primary_key);
    }

    /// Remove a primary key from under an index key.
    ///
    /// If the key has no more entries, removes the key entirely.
    pub fn remove(&mut self, key: &Key, primary_key: &Key) {
        if let Some(owners) = self.tree.get_mut(key) {
            owners.remove(primary_key);
            if owners.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// All (index key, primary key) pairs inside the range, ascending
    pub fn entries(&self, range: Option<&KeyRange>) -> Vec<(Key, Key)> {
        self.span(range)
            .flat_map(|(key, owners)| owners.iter().map(move |pk| (key.clone(), pk.clone())))
            .collect()
    }

    /// One pair per distinct index key inside the range, ascending.
    ///
    /// Each index key is paired with its lowest primary key.
    pub fn unique_entries(&self, range: Option<&KeyRange>) -> Vec<(Key, Key)> {
        self.span(range)
            .filter_map(|(key, owners)| owners.iter().next().map(|pk| (key.clone(), pk.clone())))
            .collect()
    }

    /// Number of entries inside the range
    pub fn count(&self, range: Option<&KeyRange>) -> usize {
        self.span(range).map(|(_, owners)| owners.len()).sum()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the number of distinct keys
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    fn span<'a>(
        &'a self,
        range: Option<&KeyRange>,
    ) -> Box<dyn Iterator<Item = (&'a Key, &'a BTreeSet<Key>)> + 'a> {
        match range {
            Some(range) => Box::new(self.tree.range::<Key, _>(range.bounds())),
            None => Box::new(self.tree.iter()),
        }
    }
}
