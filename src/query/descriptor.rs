//! Declarative range descriptors
//!
//! Translates `{eq}`, `{gt}`, `{gte}`, `{lt}`, `{lte}` and the lower/upper
//! pairings `{gt|gte, lt|lte}` into a primitive `RangeSpec`.
//!
//! | descriptor        | range                         |
//! |-------------------|-------------------------------|
//! | `{eq: v}`         | only(v)                       |
//! | `{gt: v}`         | lowerBound(v, open)           |
//! | `{gte: v}`        | lowerBound(v, closed)         |
//! | `{lt: v}`         | upperBound(v, open)           |
//! | `{lte: v}`        | upperBound(v, closed)         |
//! | `{gt|gte, lt|lte}`| bound(lo, hi, per-side flags) |

use serde_json::{Map, Value};

use super::config::RangeSpec;
use super::errors::{QueryError, QueryResult};

/// Recognised descriptor keys, in translation order
const LOWER_KEYS: [&str; 2] = ["gt", "gte"];
const UPPER_KEYS: [&str; 2] = ["lt", "lte"];

/// Translates a descriptor object into a range.
///
/// Fails with an invalid-argument error naming the offending key or pair.
pub fn translate(descriptor: &Value) -> QueryResult<RangeSpec> {
    let object = descriptor.as_object().ok_or_else(|| {
        QueryError::invalid_argument(format!("range descriptor must be an object, got {}", descriptor))
    })?;

    match object.len() {
        1 => translate_single(object),
        2 => translate_pair(object),
        0 => Err(QueryError::invalid_argument("range descriptor is empty")),
        _ => {
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            Err(QueryError::invalid_argument(format!(
                "range descriptor has too many keys: {}",
                keys.join(", ")
            )))
        }
    }
}

fn translate_single(object: &Map<String, Value>) -> QueryResult<RangeSpec> {
    let (key, value) = object
        .iter()
        .next()
        .ok_or_else(|| QueryError::invalid_argument("range descriptor is empty"))?;
    let value = value.clone();

    match key.as_str() {
        "eq" => Ok(RangeSpec::Only(value)),
        "gt" => Ok(RangeSpec::LowerBound { value, open: true }),
        "gte" => Ok(RangeSpec::LowerBound { value, open: false }),
        "lt" => Ok(RangeSpec::UpperBound { value, open: true }),
        "lte" => Ok(RangeSpec::UpperBound { value, open: false }),
        other => Err(QueryError::invalid_argument(format!(
            "unknown range descriptor key '{}'",
            other
        ))),
    }
}

fn translate_pair(object: &Map<String, Value>) -> QueryResult<RangeSpec> {
    let lower = LOWER_KEYS
        .iter()
        .filter(|k| object.contains_key(**k))
        .collect::<Vec<_>>();
    let upper = UPPER_KEYS
        .iter()
        .filter(|k| object.contains_key(**k))
        .collect::<Vec<_>>();

    match (lower.as_slice(), upper.as_slice()) {
        ([lower_key], [upper_key]) => Ok(RangeSpec::Bound {
            lower: object[**lower_key].clone(),
            upper: object[**upper_key].clone(),
            lower_open: **lower_key == "gt",
            upper_open: **upper_key == "lt",
        }),
        _ => {
            let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
            keys.sort_unstable();
            Err(QueryError::invalid_argument(format!(
                "invalid range descriptor pair '{}'",
                keys.join("/")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_key_mapping() {
        assert_eq!(translate(&json!({"eq": 1})).unwrap(), RangeSpec::Only(json!(1)));
        assert_eq!(
            translate(&json!({"gt": 1})).unwrap(),
            RangeSpec::LowerBound { value: json!(1), open: true }
        );
        assert_eq!(
            translate(&json!({"gte": 1})).unwrap(),
            RangeSpec::LowerBound { value: json!(1), open: false }
        );
        assert_eq!(
            translate(&json!({"lt": 1})).unwrap(),
            RangeSpec::UpperBound { value: json!(1), open: true }
        );
        assert_eq!(
            translate(&json!({"lte": 1})).unwrap(),
            RangeSpec::UpperBound { value: json!(1), open: false }
        );
    }

    #[test]
    fn test_pair_mapping_any_order() {
        let spec = translate(&json!({"lte": 9, "gt": 1})).unwrap();
        assert_eq!(
            spec,
            RangeSpec::Bound {
                lower: json!(1),
                upper: json!(9),
                lower_open: true,
                upper_open: false,
            }
        );
    }

    #[test]
    fn test_unknown_key_named() {
        let err = translate(&json!({"between": 1})).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("between"));
    }

    #[test]
    fn test_invalid_pairs_named() {
        for (descriptor, pair) in [
            (json!({"gt": 1, "gte": 2}), "gt/gte"),
            (json!({"lt": 1, "lte": 2}), "lt/lte"),
            (json!({"eq": 1, "lt": 2}), "eq/lt"),
        ] {
            let err = translate(&descriptor).unwrap_err();
            assert!(err.to_string().contains(pair), "{} should name {}", err, pair);
        }
    }

    #[test]
    fn test_non_object_and_empty_rejected() {
        assert!(translate(&json!(5)).is_err());
        assert!(translate(&json!({})).is_err());
        assert!(translate(&json!({"gt": 1, "lt": 2, "eq": 3})).is_err());
    }
}
