//! Database configuration
//!
//! A database can be described in a JSON file (name, version, schema and
//! optional seed records) or programmatically through `OpenOptions`.
//!
//! # Design Principles
//!
//! - Validate on load: a config that loads is one the store accepts
//! - Config errors are reported before any database is opened

mod database;
mod errors;

pub use database::{DatabaseConfig, OpenOptions};
pub use errors::{ConfigError, ConfigResult};
