//! Query requests accepted by the CLI
//!
//! A request is the JSON form of one builder chain:
//!
//! ```json
//! {"table": "people", "index": "name", "range": {"eq": "A"},
//!  "filters": [["age", 30]], "desc": true, "limit": [0, 10]}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::connection::Connection;
use crate::query::{ChainState, ModifySpec, QueryBuilder, ResultHandle, Values};

use super::errors::{CliError, CliResult};

/// `limit` accepts a take count or a `[skip, take]` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LimitSpec {
    Take(usize),
    Window(usize, usize),
}

impl LimitSpec {
    /// (skip, take)
    pub fn window(self) -> (usize, usize) {
        match self {
            LimitSpec::Take(take) => (0, take),
            LimitSpec::Window(skip, take) => (skip, take),
        }
    }
}

/// One query chain in JSON form
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryRequest {
    pub table: String,
    #[serde(default)]
    pub index: Option<String>,
    /// Range descriptor; absent means the whole table or index
    #[serde(default)]
    pub range: Option<Value>,
    /// `[field, value]` pairs
    #[serde(default)]
    pub filters: Vec<Value>,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub keys: bool,
    #[serde(default)]
    pub limit: Option<LimitSpec>,
    #[serde(default)]
    pub count: bool,
    /// Literal field assignments
    #[serde(default)]
    pub modify: Option<Map<String, Value>>,
}

/// Handle of a started request
#[derive(Debug)]
pub enum Pending {
    Values(ResultHandle<Vec<Value>>),
    Count(ResultHandle<u64>),
}

impl Pending {
    /// Waits for the result and renders it as JSON
    pub async fn resolve(self) -> CliResult<Value> {
        Ok(match self {
            Pending::Values(handle) => Value::Array(handle.await?),
            Pending::Count(handle) => Value::from(handle.await?),
        })
    }
}

impl QueryRequest {
    /// Rejects combinations no builder chain can express
    pub fn validate(&self) -> CliResult<()> {
        let terminals = [self.count, self.modify.is_some(), self.limit.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if terminals > 1 {
            return Err(CliError::request("count, modify and limit are mutually exclusive"));
        }
        if self.keys && terminals > 0 {
            return Err(CliError::request("keys cannot be combined with count, modify or limit"));
        }
        if self.count && self.desc {
            return Err(CliError::request("count cannot follow desc"));
        }
        Ok(())
    }

    /// Builds the chain on `connection` and starts it
    pub fn start(&self, connection: &Connection) -> CliResult<Pending> {
        self.validate()?;

        let source = connection.query(&self.table, self.index.as_deref())?;
        let base = match &self.range {
            Some(descriptor) => source.range(descriptor)?,
            None => source.all(),
        };
        let base = self
            .filters
            .iter()
            .cloned()
            .fold(base, |builder, filter| builder.filter_spec(filter));

        if self.count {
            let query = if self.distinct {
                base.distinct().count()
            } else {
                base.count()
            };
            return Ok(Pending::Count(query.execute()?));
        }

        match (self.desc, self.distinct) {
            (false, false) => self.finish(base),
            (true, false) => self.finish(base.desc()),
            (false, true) => self.finish(base.distinct()),
            (true, true) => self.finish(base.desc().distinct()),
        }
    }

    fn finish<S: ChainState>(&self, builder: QueryBuilder<S, Values>) -> CliResult<Pending> {
        let handle = if self.keys {
            builder.keys().execute()?
        } else if let Some(fields) = &self.modify {
            builder.modify(ModifySpec::from_object(fields)).execute()?
        } else if let Some(limit) = self.limit {
            let (skip, take) = limit.window();
            builder.window(skip, take).execute()?
        } else {
            builder.execute()?
        };
        Ok(Pending::Values(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> QueryRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_limit_forms() {
        assert_eq!(parse(json!({"table": "t", "limit": 3})).limit, Some(LimitSpec::Take(3)));
        assert_eq!(
            parse(json!({"table": "t", "limit": [2, 3]})).limit.map(LimitSpec::window),
            Some((2, 3))
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<QueryRequest, _> = serde_json::from_value(json!({"table": "t", "sort": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_conflicting_terminals_rejected() {
        assert!(parse(json!({"table": "t", "count": true, "limit": 1})).validate().is_err());
        assert!(parse(json!({"table": "t", "keys": true, "modify": {"a": 1}})).validate().is_err());
        assert!(parse(json!({"table": "t", "count": true, "desc": true})).validate().is_err());
        assert!(parse(json!({"table": "t", "count": true, "distinct": true})).validate().is_ok());
    }
}
