//! Fluent query builder
//!
//! The builder is a typestate machine. `QueryBuilder<S, C>` carries the
//! accumulated `QueryConfig`; the state `S` and cursor kind `C` decide which
//! calls exist:
//!
//! | state                | filter/map | desc | distinct | keys | modify/limit | count |
//! |----------------------|------------|------|----------|------|--------------|-------|
//! | `Ready, Values`      | yes        | yes  | yes      | yes  | yes          | yes   |
//! | `Descending, Values` | yes        |      | yes      | yes  | yes          |       |
//! | `Distinct, Values`   | yes        | yes  |          | yes  | yes          | yes   |
//! | `_, Keys`            | yes        | as S | as S     |      |              |       |
//!
//! `limit`, `window`, `modify` and `count` end the chain: their builders
//! only offer `execute`.

use std::marker::PhantomData;

use serde_json::Value;
use tracing::debug;

use crate::connection::Connection;

use super::config::{CursorMode, Filter, ModifySpec, QueryConfig, RangeSpec, Window};
use super::descriptor;
use super::errors::QueryResult;
use super::executor;
use super::handle::ResultHandle;

/// Range chosen, nothing else configured yet
#[derive(Debug)]
pub struct Ready;

/// Direction switched to descending
#[derive(Debug)]
pub struct Descending;

/// Duplicate index keys collapsed
#[derive(Debug)]
pub struct Distinct;

/// Cursor yields records
#[derive(Debug)]
pub struct Values;

/// Cursor yields keys
#[derive(Debug)]
pub struct Keys;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Ready {}
    impl Sealed for super::Descending {}
    impl Sealed for super::Distinct {}
    impl Sealed for super::Values {}
    impl Sealed for super::Keys {}
}

/// Non-terminal builder states
pub trait ChainState: sealed::Sealed {}
impl ChainState for Ready {}
impl ChainState for Descending {}
impl ChainState for Distinct {}

/// States that still offer `desc`
pub trait CanDescend: ChainState {}
impl CanDescend for Ready {}
impl CanDescend for Distinct {}

/// States that still offer `distinct`
pub trait CanDistinct: ChainState {}
impl CanDistinct for Ready {}
impl CanDistinct for Descending {}

/// States that offer `count`
pub trait CanCount: ChainState {}
impl CanCount for Ready {}
impl CanCount for Distinct {}

/// What the cursor yields
pub trait CursorKind: sealed::Sealed {}
impl CursorKind for Values {}
impl CursorKind for Keys {}

/// Entry point of a query: pick a range
#[derive(Debug)]
pub struct QuerySource {
    connection: Connection,
    table: String,
    index: Option<String>,
}

impl QuerySource {
    pub(crate) fn new(connection: Connection, table: impl Into<String>, index: Option<String>) -> Self {
        Self {
            connection,
            table: table.into(),
            index,
        }
    }

    /// Whole table or index
    pub fn all(self) -> QueryBuilder<Ready> {
        self.with_range(RangeSpec::All)
    }

    /// Exactly one key
    pub fn only(self, value: impl Into<Value>) -> QueryBuilder<Ready> {
        self.with_range(RangeSpec::Only(value.into()))
    }

    /// Keys between `lower` and `upper`; an open side excludes its endpoint
    pub fn bound(
        self,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        lower_open: bool,
        upper_open: bool,
    ) -> QueryBuilder<Ready> {
        self.with_range(RangeSpec::Bound {
            lower: lower.into(),
            upper: upper.into(),
            lower_open,
            upper_open,
        })
    }

    /// Keys above `value` (or at it, unless `open`)
    pub fn lower_bound(self, value: impl Into<Value>, open: bool) -> QueryBuilder<Ready> {
        self.with_range(RangeSpec::LowerBound {
            value: value.into(),
            open,
        })
    }

    /// Keys below `value` (or at it, unless `open`)
    pub fn upper_bound(self, value: impl Into<Value>, open: bool) -> QueryBuilder<Ready> {
        self.with_range(RangeSpec::UpperBound {
            value: value.into(),
            open,
        })
    }

    /// Range from a declarative descriptor such as `{"gte": 1, "lt": 5}`
    pub fn range(self, descriptor: &Value) -> QueryResult<QueryBuilder<Ready>> {
        let spec = descriptor::translate(descriptor)?;
        Ok(self.with_range(spec))
    }

    /// Full scan with an equality filter
    pub fn filter(self, field: impl Into<String>, value: impl Into<Value>) -> QueryBuilder<Ready> {
        self.all().filter(field, value)
    }

    /// Full scan with a predicate filter
    pub fn filter_fn<F>(self, predicate: F) -> QueryBuilder<Ready>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.all().filter_fn(predicate)
    }

    fn with_range(self, range: RangeSpec) -> QueryBuilder<Ready> {
        QueryBuilder {
            connection: self.connection,
            config: QueryConfig::new(self.table, self.index, range),
            _state: PhantomData,
        }
    }
}

/// A query under construction
///
/// Calls that do not apply in the current state do not exist on it, so an
/// illegal chain is rejected at compile time. The longest legal chains:
///
/// ```no_run
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = || conn.query("people", Some("name")).unwrap();
/// let _ = source().only("A").filter("age", 30).distinct().desc().keys().map(|v| v).execute();
/// let _ = source().all().desc().distinct().window(1, 2).execute();
/// let _ = source().all().distinct().modify(ModifySpec::new().set("seen", true)).execute();
/// let _ = source().filter("age", 30).distinct().count().execute();
/// # }
/// ```
///
/// `desc` applies once:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().desc().desc();
/// # }
/// ```
///
/// So does `distinct`:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().distinct().distinct();
/// # }
/// ```
///
/// `count` is not offered after `desc`:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().desc().count();
/// # }
/// ```
///
/// Key cursors cannot be counted:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().keys().count();
/// # }
/// ```
///
/// Key cursors cannot be modified:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().keys().modify(ModifySpec::new().set("seen", true));
/// # }
/// ```
///
/// Key cursors cannot be limited:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().keys().limit(1);
/// # }
/// ```
///
/// Nothing can follow `limit` except `execute`:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().limit(1).filter("age", 30);
/// # }
/// ```
///
/// Nothing can follow `modify` except `execute`:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().modify(ModifySpec::new().set("seen", true)).map(|v| v);
/// # }
/// ```
///
/// Nothing can follow `count` except `execute`:
///
/// ```compile_fail
/// # use cursordb::{Connection, ModifySpec};
/// # fn chain(conn: &Connection) {
/// let source = conn.query("people", Some("name")).unwrap();
/// let _ = source.all().count().desc();
/// # }
/// ```
#[derive(Debug)]
pub struct QueryBuilder<S = Ready, C = Values> {
    connection: Connection,
    config: QueryConfig,
    _state: PhantomData<(S, C)>,
}

impl<S: ChainState, C: CursorKind> QueryBuilder<S, C> {
    /// Keeps candidates whose `field` equals `value`
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.filters.push(Filter::Equals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Keeps candidates for which `predicate` returns true
    pub fn filter_fn<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.config.filters.push(Filter::Predicate(std::sync::Arc::new(predicate)));
        self
    }

    /// Adds a filter from a JSON `[field, value]` pair.
    ///
    /// Entries of any other shape are kept but ignored at execution.
    pub fn filter_spec(mut self, spec: Value) -> Self {
        self.config.filters.push(Filter::from_spec(spec));
        self
    }

    /// Projects each result; the last call wins
    pub fn map<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.config.mapper = Some(std::sync::Arc::new(mapper));
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Runs the query
    pub fn execute(self) -> QueryResult<ResultHandle<Vec<Value>>> {
        executor::execute(&self.connection, self.config)
    }

    fn transition<T, D>(self) -> QueryBuilder<T, D> {
        QueryBuilder {
            connection: self.connection,
            config: self.config,
            _state: PhantomData,
        }
    }
}

impl<S: CanDescend, C: CursorKind> QueryBuilder<S, C> {
    /// Iterates in descending key order
    pub fn desc(mut self) -> QueryBuilder<Descending, C> {
        self.config.descending = true;
        self.transition()
    }
}

impl<S: CanDistinct, C: CursorKind> QueryBuilder<S, C> {
    /// Visits only the first record of each distinct index key
    pub fn distinct(mut self) -> QueryBuilder<Distinct, C> {
        self.config.unique = true;
        self.transition()
    }
}

impl<S: ChainState> QueryBuilder<S, Values> {
    /// Yields keys instead of records
    pub fn keys(mut self) -> QueryBuilder<S, Keys> {
        self.config.cursor_mode = CursorMode::Keys;
        self.transition()
    }

    /// Keeps at most `take` matches
    pub fn limit(self, take: usize) -> LimitQuery {
        self.window(0, take)
    }

    /// Drops the first `skip` matches, then keeps at most `take`
    pub fn window(mut self, skip: usize, take: usize) -> LimitQuery {
        self.config.window = Some(Window { skip, take });
        LimitQuery {
            connection: self.connection,
            config: self.config,
        }
    }

    /// Rewrites every match in place
    pub fn modify(mut self, spec: ModifySpec) -> ModifyQuery {
        self.config.modify = Some(spec);
        ModifyQuery {
            connection: self.connection,
            config: self.config,
        }
    }
}

impl<S: CanCount> QueryBuilder<S, Values> {
    /// Counts the records in range.
    ///
    /// Filters, direction and mapping staged earlier are discarded.
    pub fn count(mut self) -> CountQuery {
        if !self.config.filters.is_empty() || self.config.mapper.is_some() {
            debug!(
                table = %self.config.table,
                filters = self.config.filters.len(),
                "count discards staged filters and mapper"
            );
        }
        self.config.cursor_mode = CursorMode::Count;
        self.config.descending = false;
        self.config.filters.clear();
        self.config.mapper = None;
        CountQuery {
            connection: self.connection,
            config: self.config,
        }
    }
}

/// Query ended by `limit` or `window`
#[derive(Debug)]
pub struct LimitQuery {
    connection: Connection,
    config: QueryConfig,
}

impl LimitQuery {
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn execute(self) -> QueryResult<ResultHandle<Vec<Value>>> {
        executor::execute(&self.connection, self.config)
    }
}

/// Query ended by `modify`; runs in a read-write unit of work
#[derive(Debug)]
pub struct ModifyQuery {
    connection: Connection,
    config: QueryConfig,
}

impl ModifyQuery {
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Runs the query and resolves with the modified (and mapped) records
    /// once the writes are committed
    pub fn execute(self) -> QueryResult<ResultHandle<Vec<Value>>> {
        executor::execute(&self.connection, self.config)
    }
}

/// Query ended by `count`
#[derive(Debug)]
pub struct CountQuery {
    connection: Connection,
    config: QueryConfig,
}

impl CountQuery {
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn execute(self) -> QueryResult<ResultHandle<u64>> {
        executor::count(&self.connection, self.config)
    }
}
