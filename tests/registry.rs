//! Registry Tests
//!
//! Tests for connection ownership:
//! - Registries are isolated from each other
//! - Opens are deduplicated by name while the connection is open
//! - Reserved table names are rejected synchronously
//! - Upgrades keep data and add tables and indexes

use cursordb::store::{Factory, IndexSchema, TableSchema};
use cursordb::{OpenOptions, QueryError, Registry, StoreError};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn v1(name: &str) -> OpenOptions {
    OpenOptions::new(name, 1).table(TableSchema::new("people").key_path("id"))
}

// =============================================================================
// Isolation and Caching
// =============================================================================

/// Two registries never share databases.
#[tokio::test]
async fn test_registries_are_isolated() {
    let first = Registry::new();
    let second = Registry::new();

    let a = first.open(v1("shared")).unwrap().await.unwrap();
    a.add("people", [json!({"id": 1})]).unwrap().await.unwrap();

    let b = second.open(v1("shared")).unwrap().await.unwrap();
    assert_eq!(b.count("people").unwrap().await.unwrap(), 0);
    assert!(second.cached("other").unwrap().is_none());
}

/// Reopening by name returns the cached connection.
#[tokio::test]
async fn test_open_deduplicates() {
    let registry = Registry::new();
    let a = registry.open(v1("db")).unwrap().await.unwrap();
    a.add("people", [json!({"id": 1})]).unwrap().await.unwrap();

    let b = registry.open(v1("db")).unwrap().await.unwrap();
    b.close();
    assert!(a.is_closed());
}

/// Two opens in flight at once resolve to the same open connection.
#[tokio::test]
async fn test_overlapping_opens_deduplicate() {
    let registry = Registry::new();
    let first = registry.open(v1("db")).unwrap();
    let second = registry.open(v1("db")).unwrap();
    let (a, b) = (first.await.unwrap(), second.await.unwrap());

    assert!(a.same_as(&b));
    assert!(!a.is_closed());
    a.add("people", [json!({"id": 1})]).unwrap().await.unwrap();
    assert_eq!(b.count("people").unwrap().await.unwrap(), 1);
}

/// Data survives closing a connection within the same registry.
#[tokio::test]
async fn test_data_survives_reopen() {
    let registry = Registry::new();
    let a = registry.open(v1("db")).unwrap().await.unwrap();
    a.add("people", [json!({"id": 1})]).unwrap().await.unwrap();
    assert!(registry.close("db").unwrap());
    assert!(!registry.close("db").unwrap());

    let b = registry.open(v1("db")).unwrap().await.unwrap();
    assert_eq!(b.count("people").unwrap().await.unwrap(), 1);
}

/// A shared backing store is visible through another registry.
#[tokio::test]
async fn test_shared_factory() {
    let factory = Factory::new();
    let a = Registry::with_factory(factory.clone());
    let b = Registry::with_factory(factory);

    let conn = a.open(v1("db")).unwrap().await.unwrap();
    conn.add("people", [json!({"id": 1})]).unwrap().await.unwrap();

    let other = b.open(v1("db")).unwrap().await.unwrap();
    assert_eq!(other.count("people").unwrap().await.unwrap(), 1);
}

// =============================================================================
// Validation and Upgrades
// =============================================================================

/// Reserved operation names cannot be table names.
#[test]
fn test_reserved_names() {
    let registry = Registry::new();
    for name in ["add", "query", "tables"] {
        let err = registry
            .open(OpenOptions::new("db", 1).table(TableSchema::new(name)))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)), "{}", name);
    }
}

/// An upgrade keeps records and back-fills new indexes.
#[tokio::test]
async fn test_upgrade_backfills_index() {
    let registry = Registry::new();
    let conn = registry.open(v1("db")).unwrap().await.unwrap();
    conn.add("people", [json!({"id": 1, "name": "A"}), json!({"id": 2, "name": "B"})])
        .unwrap()
        .await
        .unwrap();

    let v2 = OpenOptions::new("db", 2)
        .table(TableSchema::new("people").key_path("id").index(IndexSchema::new("name", "name")));
    let upgraded = registry.open(v2).unwrap().await.unwrap();
    assert!(conn.is_closed());

    let named = upgraded
        .query("people", Some("name"))
        .unwrap()
        .only("B")
        .execute()
        .unwrap()
        .await
        .unwrap();
    assert_eq!(named, vec![json!({"id": 2, "name": "B"})]);
}

/// Opening below the stored version rejects with a version error.
#[tokio::test]
async fn test_downgrade_rejected() {
    let registry = Registry::new();
    let v2 = OpenOptions::new("db", 2).table(TableSchema::new("people").key_path("id"));
    registry.open(v2).unwrap().await.unwrap();
    registry.close("db").unwrap();

    let err = registry.open(v1("db")).unwrap().await.unwrap_err();
    assert!(matches!(err, QueryError::Store(StoreError::Version { requested: 1, stored: 2 })));
}

/// Deleting an open database is blocked; after closing it succeeds.
#[tokio::test]
async fn test_delete_database() {
    let registry = Registry::new();
    registry.open(v1("db")).unwrap().await.unwrap();

    let err = registry.delete_database("db").unwrap().await.unwrap_err();
    assert!(matches!(err, QueryError::Store(StoreError::Blocked(_))));

    registry.shutdown().unwrap();
    assert!(registry.delete_database("db").unwrap().await.unwrap());
    assert!(!registry.delete_database("db").unwrap().await.unwrap());
}
