//! In-process backing store
//!
//! A transactional, ordered key-value store with secondary indexes and
//! cursors. The query layer treats it as an external collaborator and only
//! uses the surface re-exported here.
//!
//! # Design Principles
//!
//! - Deterministic: BTreeMap ordering for records and index entries
//! - Atomic: read-write transactions stage writes and publish on commit
//! - Fail before mutate: constraints are checked before any write lands

mod cursor;
mod database;
mod errors;
mod factory;
mod index;
mod key;
mod range;
mod schema;
mod table;
mod transaction;

pub use cursor::{Cursor, CursorEntry, Direction};
pub use database::Database;
pub use errors::{StoreError, StoreResult};
pub use factory::Factory;
pub use index::IndexTree;
pub use key::{compare, Key, KeyPath};
pub use range::{Endpoint, KeyRange};
pub use schema::{DatabaseSchema, IndexSchema, TableSchema};
pub use table::{StoredRecord, TableStore};
pub use transaction::{Transaction, TransactionMode};
