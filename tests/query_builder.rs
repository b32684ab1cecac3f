//! Query Builder Tests
//!
//! Tests for chain construction:
//! - Each call records exactly its setting
//! - Nothing executes before execute()
//! - count() clears what it cannot honour
//! - Closed connections refuse to start a chain

use cursordb::query::{CursorMode, ModifySpec, QueryError, RangeSpec, Window};
use cursordb::store::TableSchema;
use cursordb::{Connection, OpenOptions, Registry};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

async fn open() -> Connection {
    Registry::new()
        .open(OpenOptions::new("builder", 1).table(TableSchema::new("people").key_path("id")))
        .unwrap()
        .await
        .unwrap()
}

// =============================================================================
// Configuration
// =============================================================================

/// Range entry points record their range.
#[tokio::test]
async fn test_range_entry_points() {
    let conn = open().await;
    let source = || conn.query("people", None).unwrap();

    assert_eq!(source().all().config().range(), &RangeSpec::All);
    assert_eq!(source().only(1).config().range(), &RangeSpec::Only(json!(1)));
    assert_eq!(
        source().lower_bound(1, true).config().range(),
        &RangeSpec::LowerBound { value: json!(1), open: true }
    );
    assert_eq!(
        source().upper_bound("m", false).config().range(),
        &RangeSpec::UpperBound { value: json!("m"), open: false }
    );
    assert_eq!(source().filter("name", "A").config().range(), &RangeSpec::All);
}

/// A full chain records every setting.
#[tokio::test]
async fn test_chain_settings() {
    let conn = open().await;
    let query = conn
        .query("people", Some("name"))
        .unwrap()
        .only("A")
        .filter("age", 30)
        .desc()
        .distinct()
        .map(|v| v)
        .window(2, 5);

    let config = query.config();
    assert_eq!(config.table(), "people");
    assert_eq!(config.index(), Some("name"));
    assert!(config.is_descending());
    assert!(config.is_unique());
    assert_eq!(config.filters().len(), 1);
    assert!(config.has_mapper());
    assert_eq!(config.window(), Some(Window { skip: 2, take: 5 }));
    assert_eq!(config.cursor_mode(), CursorMode::Values);
}

/// limit(n) is a window with no skip.
#[tokio::test]
async fn test_limit_is_take_only() {
    let conn = open().await;
    let query = conn.query("people", None).unwrap().all().limit(3);
    assert_eq!(query.config().window(), Some(Window { skip: 0, take: 3 }));
}

/// keys() switches the cursor mode and keeps the state.
#[tokio::test]
async fn test_keys_mode() {
    let conn = open().await;
    let query = conn.query("people", None).unwrap().all().distinct().keys().desc();
    assert_eq!(query.config().cursor_mode(), CursorMode::Keys);
    assert!(query.config().is_descending());
}

/// modify() records its fields.
#[tokio::test]
async fn test_modify_recorded() {
    let conn = open().await;
    let query = conn
        .query("people", None)
        .unwrap()
        .all()
        .modify(ModifySpec::new().set("a", 1).compute("b", |_| json!(2)));
    assert_eq!(query.config().modify().unwrap().fields(), vec!["a", "b"]);
}

/// count() discards filters and the mapper and forces ascending order.
#[tokio::test]
async fn test_count_clears_settings() {
    let conn = open().await;
    let query = conn
        .query("people", None)
        .unwrap()
        .filter("name", "A")
        .map(|v| v)
        .distinct()
        .count();
    let config = query.config();
    assert_eq!(config.cursor_mode(), CursorMode::Count);
    assert!(config.filters().is_empty());
    assert!(!config.has_mapper());
    assert!(!config.is_descending());
}

// =============================================================================
// Deferred Execution
// =============================================================================

/// Predicates and mappers run only when the query executes.
#[tokio::test]
async fn test_nothing_runs_before_execute() {
    let conn = open().await;
    conn.add("people", [json!({"id": 1}), json!({"id": 2})])
        .unwrap()
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let query = conn.query("people", None).unwrap().filter_fn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let result = query.execute().unwrap().await.unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// The handle's two-callback continuation sees exactly one outcome.
#[tokio::test]
async fn test_then_continuation() {
    let conn = open().await;
    conn.add("people", [json!({"id": 1})]).unwrap().await.unwrap();

    let len = conn
        .query("people", None)
        .unwrap()
        .all()
        .execute()
        .unwrap()
        .then(|values| values.len(), |_| usize::MAX)
        .await;
    assert_eq!(len, 1);

    let code = conn
        .query("missing", None)
        .unwrap()
        .all()
        .execute()
        .unwrap()
        .then(|_| "ok", |err| err.code())
        .await;
    assert_eq!(code, "CURSORDB_NOT_FOUND");
}

/// A closed connection refuses query() itself.
#[tokio::test]
async fn test_closed_connection_refuses_query() {
    let conn = open().await;
    conn.close();
    let err = conn.query("people", None).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, QueryError::ConnectionClosed(_)));
}
