//! Contiguous key ranges
//!
//! A range restricts a cursor or a count to the keys between two optional
//! endpoints, each of which may be open (excluded) or closed (included).

use std::ops::Bound;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::key::Key;

/// One endpoint of a range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub key: Key,
    pub open: bool,
}

/// A validated key range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Option<Endpoint>,
    upper: Option<Endpoint>,
}

impl KeyRange {
    /// Range containing exactly one key
    pub fn only(value: &Value) -> StoreResult<Self> {
        let key = Key::try_from_json(value)?;
        Ok(Self {
            lower: Some(Endpoint {
                key: key.clone(),
                open: false,
            }),
            upper: Some(Endpoint { key, open: false }),
        })
    }

    /// Range between two keys
    pub fn bound(
        lower: &Value,
        upper: &Value,
        lower_open: bool,
        upper_open: bool,
    ) -> StoreResult<Self> {
        let lower = Key::try_from_json(lower)?;
        let upper = Key::try_from_json(upper)?;

        if lower > upper {
            return Err(StoreError::Data(format!(
                "lower bound {} is greater than upper bound {}",
                lower, upper
            )));
        }
        if lower == upper && (lower_open || upper_open) {
            return Err(StoreError::Data(format!(
                "empty range: equal bounds {} with an open endpoint",
                lower
            )));
        }

        Ok(Self {
            lower: Some(Endpoint {
                key: lower,
                open: lower_open,
            }),
            upper: Some(Endpoint {
                key: upper,
                open: upper_open,
            }),
        })
    }

    /// Range of all keys above (or at) a value
    pub fn lower_bound(value: &Value, open: bool) -> StoreResult<Self> {
        Ok(Self {
            lower: Some(Endpoint {
                key: Key::try_from_json(value)?,
                open,
            }),
            upper: None,
        })
    }

    /// Range of all keys below (or at) a value
    pub fn upper_bound(value: &Value, open: bool) -> StoreResult<Self> {
        Ok(Self {
            lower: None,
            upper: Some(Endpoint {
                key: Key::try_from_json(value)?,
                open,
            }),
        })
    }

    pub fn lower(&self) -> Option<&Endpoint> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Endpoint> {
        self.upper.as_ref()
    }

    /// Returns true if the key lies inside the range
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Some(e) if e.open => key > &e.key,
            Some(e) => key >= &e.key,
            None => true,
        };
        let below = match &self.upper {
            Some(e) if e.open => key < &e.key,
            Some(e) => key <= &e.key,
            None => true,
        };
        above && below
    }

    /// Bounds suitable for `BTreeMap::range`.
    ///
    /// Construction guarantees these never describe an inverted range.
    pub fn bounds(&self) -> (Bound<&Key>, Bound<&Key>) {
        (to_bound(self.lower.as_ref()), to_bound(self.upper.as_ref()))
    }
}

fn to_bound(endpoint: Option<&Endpoint>) -> Bound<&Key> {
    match endpoint {
        Some(e) if e.open => Bound::Excluded(&e.key),
        Some(e) => Bound::Included(&e.key),
        None => Bound::Unbounded,
    }
}
