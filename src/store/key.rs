//! Keys and key paths
//!
//! A key is the ordered identity of a record in primary storage or of an
//! entry in a secondary index. Only numbers, strings and arrays of keys are
//! valid keys. Ordering is total and deterministic:
//! Number < String < Array, arrays compared element-wise then by length.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{StoreError, StoreResult};

/// An ordered key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// Finite number, stored as order-preserving bits
    Number(u64),
    /// String value
    String(String),
    /// Array of keys
    Array(Vec<Key>),
}

impl Key {
    /// Create a key from a number.
    ///
    /// Returns None for NaN, which has no place in a total order.
    pub fn from_f64(v: f64) -> Option<Self> {
        if v.is_nan() {
            return None;
        }
        // Normalise -0.0 so it equals 0.0
        let v = if v == 0.0 { 0.0 } else { v };
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        Some(Key::Number(ordered))
    }

    /// Create a key from a string
    pub fn from_string(v: impl Into<String>) -> Self {
        Key::String(v.into())
    }

    /// Create a key from a JSON value.
    ///
    /// Booleans, nulls and objects are not valid keys.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().and_then(Key::from_f64),
            Value::String(s) => Some(Key::from_string(s.as_str())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            _ => None,
        }
    }

    /// Like `from_json`, but reports invalid keys as data errors
    pub fn try_from_json(value: &Value) -> StoreResult<Self> {
        Key::from_json(value)
            .ok_or_else(|| StoreError::Data(format!("{} is not a valid key", value)))
    }

    /// Returns the number this key holds, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Key::Number(ordered) => {
                let bits = if (ordered >> 63) == 1 {
                    ordered ^ (1 << 63)
                } else {
                    !ordered
                };
                Some(f64::from_bits(bits))
            }
            _ => None,
        }
    }

    /// Converts the key back to JSON.
    ///
    /// Integral numbers come back as JSON integers.
    pub fn to_json(&self) -> Value {
        match self {
            Key::Number(_) => {
                let v = self.as_f64().unwrap_or_default();
                if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                    Value::from(v as i64)
                } else {
                    serde_json::Number::from_f64(v)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            Key::String(s) => Value::String(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_json).collect()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        // Every i64 maps to a finite f64
        Key::from_f64(v as f64).unwrap_or(Key::Number(0))
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::from(i64::from(v))
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::from_string(v)
    }
}

/// Compares two JSON values as keys.
///
/// Fails with a data error if either side is not a valid key.
pub fn compare(a: &Value, b: &Value) -> StoreResult<Ordering> {
    let a = Key::try_from_json(a)?;
    let b = Key::try_from_json(b)?;
    Ok(a.cmp(&b))
}

/// Location of a key inside a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    /// Dotted field path, e.g. `"address.city"`
    Single(String),
    /// Several paths whose values form an array key
    Compound(Vec<String>),
}

impl KeyPath {
    /// Evaluates the path against a record, returning the raw value
    pub fn evaluate(&self, record: &Value) -> Option<Value> {
        match self {
            KeyPath::Single(path) => lookup(record, path).cloned(),
            KeyPath::Compound(paths) => paths
                .iter()
                .map(|p| lookup(record, p).cloned())
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }

    /// Evaluates the path and converts the result to a key
    pub fn extract_key(&self, record: &Value) -> Option<Key> {
        self.evaluate(record).as_ref().and_then(Key::from_json)
    }

    /// Writes a generated key into a record at this path.
    ///
    /// Only single paths can receive a key; intermediate objects are created.
    pub fn inject(&self, record: &mut Value, key: &Key) -> StoreResult<()> {
        let path = match self {
            KeyPath::Single(path) => path,
            KeyPath::Compound(_) => {
                return Err(StoreError::Data(
                    "cannot inject a generated key into a compound key path".to_string(),
                ))
            }
        };

        let mut current = record;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let object = current.as_object_mut().ok_or_else(|| {
                StoreError::Data(format!("cannot inject key at '{}': not an object", path))
            })?;
            if segments.peek().is_none() {
                object.insert(segment.to_string(), key.to_json());
                return Ok(());
            }
            current = object
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
        }
        Ok(())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Single(path) => write!(f, "{}", path),
            KeyPath::Compound(paths) => write!(f, "[{}]", paths.join(", ")),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        KeyPath::Single(path.to_string())
    }
}

fn lookup<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}
