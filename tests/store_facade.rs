//! Store Façade Tests
//!
//! Tests for per-table CRUD:
//! - Each call is its own transaction
//! - Generated keys are returned, never written into caller data
//! - A failed batch writes nothing
//! - Closed connections fail before any work is scheduled

use cursordb::store::{IndexSchema, Key, TableSchema};
use cursordb::{Connection, Entry, OpenOptions, QueryError, Registry, StoreError};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

async fn open() -> Connection {
    Registry::new()
        .open(
            OpenOptions::new("facade", 1)
                .table(
                    TableSchema::new("users")
                        .key_path("id")
                        .index(IndexSchema::new("email", "email").unique()),
                )
                .table(TableSchema::new("events").auto_increment())
                .table(TableSchema::new("items").key_path("sku.code").auto_increment())
                .table(TableSchema::new("pairs")),
        )
        .unwrap()
        .await
        .unwrap()
}

// =============================================================================
// Keys
// =============================================================================

/// Out-of-line generated keys come back alongside the untouched record.
#[tokio::test]
async fn test_generated_key_returned_not_injected() {
    let conn = open().await;
    let record = json!({"kind": "login"});
    let stored = conn.add("events", [record.clone()]).unwrap().await.unwrap();

    assert_eq!(stored[0].key, Key::from(1));
    assert_eq!(stored[0].value, record);
    assert_eq!(conn.get("events", 1).unwrap().await.unwrap(), Some(record));
}

/// Inline generated keys are written at the key path, creating objects.
#[tokio::test]
async fn test_generated_inline_key_at_nested_path() {
    let conn = open().await;
    let stored = conn.add("items", [json!({"name": "bolt"})]).unwrap().await.unwrap();
    assert_eq!(stored[0].value, json!({"name": "bolt", "sku": {"code": 1}}));
}

/// Tables without key path or generator need explicit keys.
#[tokio::test]
async fn test_explicit_keys() {
    let conn = open().await;
    conn.add("pairs", [Entry::with_key("left", json!({"v": 1}))])
        .unwrap()
        .await
        .unwrap();
    assert_eq!(
        conn.get("pairs", "left").unwrap().await.unwrap(),
        Some(json!({"v": 1}))
    );

    let err = conn.add("pairs", [json!({"v": 2})]).unwrap().await.unwrap_err();
    assert!(matches!(err, QueryError::Store(StoreError::Data(_))));
}

// =============================================================================
// Constraints
// =============================================================================

/// A duplicate unique value rejects the whole batch.
#[tokio::test]
async fn test_constraint_rejects_batch() {
    let conn = open().await;
    conn.add("users", [json!({"id": 1, "email": "a@x"})])
        .unwrap()
        .await
        .unwrap();

    let err = conn
        .add(
            "users",
            [
                json!({"id": 2, "email": "b@x"}),
                json!({"id": 3, "email": "a@x"}),
            ],
        )
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CURSORDB_CONSTRAINT");
    assert_eq!(conn.count("users").unwrap().await.unwrap(), 1);
    assert_eq!(conn.get("users", 2).unwrap().await.unwrap(), None);
}

/// add refuses an existing key; update replaces it.
#[tokio::test]
async fn test_add_versus_update() {
    let conn = open().await;
    conn.add("users", [json!({"id": 1, "email": "a@x"})]).unwrap().await.unwrap();

    let err = conn.add("users", [json!({"id": 1})]).unwrap().await.unwrap_err();
    assert!(err.store_error().unwrap().is_constraint());

    conn.update("users", [json!({"id": 1, "email": "new@x"})]).unwrap().await.unwrap();
    let stored = conn.get("users", 1).unwrap().await.unwrap().unwrap();
    assert_eq!(stored["email"], json!("new@x"));
}

// =============================================================================
// Table Proxies and Closing
// =============================================================================

/// A table proxy forwards every operation.
#[tokio::test]
async fn test_table_proxy() {
    let conn = open().await;
    let users = conn.table("users");
    users.add([json!({"id": 7, "email": "p@x"})]).unwrap().await.unwrap();
    assert_eq!(users.count().unwrap().await.unwrap(), 1);

    let via_query = users.query(None).unwrap().only(7).execute().unwrap().await.unwrap();
    assert_eq!(via_query.len(), 1);

    assert!(users.remove(7).unwrap().await.unwrap());
    users.clear().unwrap().await.unwrap();
    assert_eq!(users.get(7).unwrap().await.unwrap(), None);
}

/// Every call on a closed connection fails synchronously.
#[tokio::test]
async fn test_closed_connection_fails_synchronously() {
    let conn = open().await;
    let users = conn.table("users");
    conn.close();

    assert!(matches!(
        conn.add("users", [json!({"id": 1})]),
        Err(QueryError::ConnectionClosed(_))
    ));
    assert!(matches!(users.get(1), Err(QueryError::ConnectionClosed(_))));
    assert!(matches!(users.count(), Err(QueryError::ConnectionClosed(_))));
    assert!(matches!(conn.query("users", None), Err(QueryError::ConnectionClosed(_))));
}
