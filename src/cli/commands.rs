//! CLI command implementations
//!
//! Each command opens the configured database in a fresh registry, applies
//! the seed records, runs its request and closes everything again.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::connection::{Connection, Registry};

use super::args::Command;
use super::errors::CliResult;
use super::io::{read_request, write_error, write_response};
use super::request::QueryRequest;

/// Run a parsed command on the current-thread runtime
pub fn run_command(command: Command) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let outcome = runtime.block_on(async {
        match command {
            Command::Query { config, request } => {
                let request = read_request(request.as_deref())?;
                query(&config, request).await
            }
            Command::Count { config, table } => count(&config, &table).await,
        }
    });

    match outcome {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code(), &e.to_string())?;
            Err(e)
        }
    }
}

/// Runs one JSON query request against the configured database
pub async fn query(config_path: &Path, request: Value) -> CliResult<Value> {
    let request: QueryRequest = serde_json::from_value(request)?;
    request.validate()?;

    with_database(config_path, |conn| async move {
        let pending = request.start(&conn)?;
        pending.resolve().await
    })
    .await
}

/// Counts the records of one table
pub async fn count(config_path: &Path, table: &str) -> CliResult<Value> {
    let table = table.to_string();
    with_database(config_path, |conn| async move {
        let n = conn.count(&table)?.await?;
        Ok(Value::from(n))
    })
    .await
}

async fn with_database<F, Fut>(config_path: &Path, work: F) -> CliResult<Value>
where
    F: FnOnce(Connection) -> Fut,
    Fut: std::future::Future<Output = CliResult<Value>>,
{
    let config = DatabaseConfig::load(config_path)?;
    let registry = Registry::new();
    let conn = registry.open(config.open_options())?.await?;
    let seeded = config.seed_into(&conn).await?;
    debug!(db = %config.name, seeded, "database ready");

    let result = work(conn).await;
    registry.shutdown()?;
    result
}
