//! Query builder and cursor execution engine
//!
//! A query starts from `Connection::query`, picks a range, accumulates
//! filters, direction, distinctness, cursor mode, window, modification and
//! mapping, and finally runs as one cursor pass inside one transaction.
//!
//! # Design Principles
//!
//! - Compile-time chain: each builder state only has its legal next calls
//! - Deferred: nothing touches the store until `execute`
//! - One pass, one transaction, one resolution
//! - Configuration errors are synchronous; store errors reject the handle
//!
//! # Example
//!
//! ```no_run
//! # async fn demo(conn: cursordb::Connection) -> cursordb::QueryResult<()> {
//! use serde_json::json;
//!
//! let adults = conn
//!     .query("people", Some("age"))?
//!     .range(&json!({"gte": 18}))?
//!     .filter("active", true)
//!     .desc()
//!     .limit(10)
//!     .execute()?
//!     .await?;
//! # let _ = adults;
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod descriptor;
mod errors;
mod executor;
mod handle;

pub use builder::{
    CanCount, CanDescend, CanDistinct, ChainState, CountQuery, CursorKind, Descending, Distinct,
    Keys, LimitQuery, ModifyQuery, QueryBuilder, QuerySource, Ready, Values,
};
pub use config::{
    CursorMode, FieldFn, FieldUpdate, Filter, Mapper, ModifySpec, Predicate, QueryConfig,
    RangeSpec, Window,
};
pub use descriptor::translate;
pub use errors::{QueryError, QueryResult};
pub use executor::ExecutionStats;
pub use handle::ResultHandle;
