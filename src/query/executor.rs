//! Cursor execution engine
//!
//! Runs one finished `QueryConfig` as a single cursor pass inside a single
//! transaction.
//!
//! Per-record order:
//! 1. Extract the candidate (record, or key for key cursors)
//! 2. Apply every filter (AND)
//! 3. Consume the skip count
//! 4. Apply the modification and write it back at the cursor
//! 5. Apply the mapper and collect
//!
//! The handle resolves only after the transaction commits. Any failure drops
//! the transaction, which rolls back its writes, and rejects the handle
//! with no partial result.

use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::store::{Database, Direction, StoreError, StoreResult, TransactionMode};

use super::config::{CursorMode, Filter, QueryConfig};
use super::errors::QueryResult;
use super::handle::ResultHandle;

/// Counters reported once per execution
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Cursor positions read
    pub visited: usize,
    /// Positions passed over by a bulk skip
    pub bulk_skipped: usize,
    /// Records written back
    pub modified: usize,
    /// Values collected
    pub returned: usize,
}

/// Schedules a cursor query on the connection's database
pub(crate) fn execute(connection: &Connection, config: QueryConfig) -> QueryResult<ResultHandle<Vec<Value>>> {
    let database = connection.database()?;
    ResultHandle::spawn(move || match run_cursor(&database, &config) {
        Ok((values, _)) => Ok(values),
        Err(err) => {
            warn!(
                db = %database.name(),
                table = %config.table,
                code = err.code(),
                error = %err,
                "query failed"
            );
            Err(err.into())
        }
    })
}

/// Schedules a count query on the connection's database
pub(crate) fn count(connection: &Connection, config: QueryConfig) -> QueryResult<ResultHandle<u64>> {
    let database = connection.database()?;
    ResultHandle::spawn(move || match run_count(&database, &config) {
        Ok(n) => Ok(n),
        Err(err) => {
            warn!(
                db = %database.name(),
                table = %config.table,
                code = err.code(),
                error = %err,
                "count failed"
            );
            Err(err.into())
        }
    })
}

/// Performs the single cursor pass described by `config`
pub(crate) fn run_cursor(database: &Database, config: &QueryConfig) -> StoreResult<(Vec<Value>, ExecutionStats)> {
    if config.cursor_mode == CursorMode::Count {
        let n = run_count(database, config)?;
        return Ok((vec![Value::from(n)], ExecutionStats::default()));
    }
    if config.modify.is_some() && config.cursor_mode == CursorMode::Keys {
        return Err(StoreError::Data("modify requires a value cursor".to_string()));
    }

    let mode = if config.modify.is_some() {
        TransactionMode::ReadWrite
    } else {
        TransactionMode::ReadOnly
    };
    let mut txn = database.transaction(&[config.table.as_str()], mode)?;

    let range = config.range.to_key_range()?;
    let direction = Direction::from_flags(config.descending, config.unique);
    let mut cursor = txn
        .table(&config.table)?
        .open_cursor(config.index.as_deref(), range.as_ref(), direction)?;

    let filters = active_filters(config);
    let (mut skip, take) = match config.window {
        Some(window) => (window.skip, window.take),
        None => (0, usize::MAX),
    };

    let mut stats = ExecutionStats::default();

    // Without filters every position is a match, so the skip can jump
    if skip > 0 && filters.is_empty() {
        let before = cursor.remaining();
        cursor.advance(skip);
        stats.bulk_skipped = before - cursor.remaining();
        skip = 0;
    }

    let mut results = Vec::new();
    while results.len() < take {
        let Some(entry) = cursor.current() else {
            break;
        };
        stats.visited += 1;

        let candidate = match config.cursor_mode {
            CursorMode::Keys => Some(entry.key.to_json()),
            _ => cursor.value(txn.table(&config.table)?)?.cloned(),
        };
        let Some(mut candidate) = candidate else {
            cursor.advance(1);
            continue;
        };

        if !filters.iter().all(|filter| filter.matches(&candidate)) {
            cursor.advance(1);
            continue;
        }

        if skip > 0 {
            skip -= 1;
            cursor.advance(1);
            continue;
        }

        if let Some(spec) = &config.modify {
            let updated = spec.apply(&candidate)?;
            candidate = cursor.update(txn.table_mut(&config.table)?, updated)?.value;
            stats.modified += 1;
        }

        results.push(match &config.mapper {
            Some(mapper) => mapper(candidate),
            None => candidate,
        });
        cursor.advance(1);
    }
    stats.returned = results.len();

    txn.commit()?;

    debug!(
        db = %database.name(),
        table = %config.table,
        index = config.index.as_deref().unwrap_or("<primary>"),
        range = config.range.kind(),
        direction = direction.as_str(),
        visited = stats.visited,
        bulk_skipped = stats.bulk_skipped,
        modified = stats.modified,
        returned = stats.returned,
        "query executed"
    );

    Ok((results, stats))
}

/// Counts the records or index entries in range
pub(crate) fn run_count(database: &Database, config: &QueryConfig) -> StoreResult<u64> {
    let txn = database.transaction(&[config.table.as_str()], TransactionMode::ReadOnly)?;
    let range = config.range.to_key_range()?;
    let n = txn
        .table(&config.table)?
        .count(config.index.as_deref(), range.as_ref())?;
    txn.commit()?;

    debug!(
        db = %database.name(),
        table = %config.table,
        index = config.index.as_deref().unwrap_or("<primary>"),
        range = config.range.kind(),
        count = n,
        "count executed"
    );
    Ok(n as u64)
}

/// Filters that take part in matching; malformed entries are dropped here
fn active_filters(config: &QueryConfig) -> Vec<&Filter> {
    let (malformed, active): (Vec<&Filter>, Vec<&Filter>) =
        config.filters.iter().partition(|filter| filter.is_malformed());
    for filter in malformed {
        debug!(table = %config.table, filter = ?filter, "ignoring malformed filter");
    }
    active
}
