//! cursordb - fluent, cursor-driven queries over a transactional ordered
//! key-value store
//!
//! - `store`: the in-process backing store (tables, indexes, transactions,
//!   cursors)
//! - `query`: the typestate query builder and the cursor execution engine
//! - `connection`: connections, table proxies, the CRUD façade and the
//!   connection registry
//! - `config`: JSON database configuration
//! - `cli`: the `cursordb` command line

pub mod cli;
pub mod config;
pub mod connection;
pub mod query;
pub mod store;

pub use config::{DatabaseConfig, OpenOptions};
pub use connection::{Connection, Entry, Registry, TableProxy};
pub use query::{ModifySpec, QueryError, QueryResult, ResultHandle};
pub use store::{StoreError, StoreResult, StoredRecord};
