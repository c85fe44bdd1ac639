//! Integration tests for roots-store
//!
//! These tests verify persistence and batch semantics of both backends.

use roots_domain::{KeyValueStore, KvWrite};
use roots_store::{MemoryStore, SqliteStore, StoreBackend};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_sqlite_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[tokio::test]
async fn test_sqlite_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roots.db");

    {
        let store = SqliteStore::new(&path).unwrap();
        store
            .set("profile:p1", json!({"id": "p1", "name": "Ama"}))
            .await
            .unwrap();
        store
            .set("profile_relationships:p1", json!(["r1", "r2"]))
            .await
            .unwrap();
    }

    let reopened = SqliteStore::new(&path).unwrap();
    let profile = reopened.get("profile:p1").await.unwrap().unwrap();
    assert_eq!(profile["name"], "Ama");

    let index = reopened.get("profile_relationships:p1").await.unwrap().unwrap();
    assert_eq!(index, json!(["r1", "r2"]));
}

#[tokio::test]
async fn test_sqlite_apply_is_all_or_nothing_visible() {
    let store = SqliteStore::new(":memory:").unwrap();
    store.set("relationship:old", json!({"id": "old"})).await.unwrap();

    store
        .apply(vec![
            KvWrite::put("relationship:new", json!({"id": "new"})),
            KvWrite::put("profile_relationships:a", json!(["new"])),
            KvWrite::put("profile_relationships:b", json!(["new"])),
            KvWrite::delete("relationship:old"),
        ])
        .await
        .unwrap();

    let relationships = store.get_by_prefix("relationship:").await.unwrap();
    assert_eq!(relationships, vec![json!({"id": "new"})]);
    assert_eq!(
        store.get("profile_relationships:b").await.unwrap(),
        Some(json!(["new"]))
    );
}

#[tokio::test]
async fn test_sqlite_set_if_absent_concurrent_single_winner() {
    let store = SqliteStore::new(":memory:").unwrap();

    let attempts = (0..8).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .set_if_absent("relationship_pair:a:b:spouse", json!(format!("r{i}")))
                .await
                .unwrap()
        })
    });

    let mut winners = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        if attempt.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_backends_agree_on_prefix_order() {
    let memory = StoreBackend::from(MemoryStore::new());
    let sqlite = StoreBackend::from(SqliteStore::new(":memory:").unwrap());

    for backend in [&memory, &sqlite] {
        for id in ["c", "a", "b"] {
            backend
                .set(&format!("relationship:{id}"), json!(id))
                .await
                .unwrap();
        }
        backend.set("relationship_pair:a:b:parent", json!("a")).await.unwrap();
    }

    let from_memory = memory.get_by_prefix("relationship:").await.unwrap();
    let from_sqlite = sqlite.get_by_prefix("relationship:").await.unwrap();
    assert_eq!(from_memory, vec![json!("a"), json!("b"), json!("c")]);
    assert_eq!(from_memory, from_sqlite);
}
