//! In-memory key-value store

use crate::StoreError;
use async_trait::async_trait;
use roots_domain::{KeyValueStore, KvWrite};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Ordered in-memory implementation of `KeyValueStore`
///
/// Keys are kept in a `BTreeMap`, so prefix scans return values in key
/// order, matching [`SqliteStore`](crate::SqliteStore). Batches are applied
/// under a single write lock.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    type Error = StoreError;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Self::Error> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, Self::Error> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, Self::Error> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect())
    }

    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), Self::Error> {
        let mut entries = self.entries.write().await;
        for write in writes {
            match write {
                KvWrite::Put { key, value } => {
                    entries.insert(key, value);
                }
                KvWrite::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_prefix_scan_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        store.set("relationship:b", json!("b")).await.unwrap();
        store.set("relationship:a", json!("a")).await.unwrap();
        store.set("relationship_pair:a:b:spouse", json!("x")).await.unwrap();
        store.set("profile:a", json!("p")).await.unwrap();

        let values = store.get_by_prefix("relationship:").await.unwrap();
        assert_eq!(values, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("k", json!(1)).await.unwrap());
        assert!(!store.set_if_absent("k", json!(2)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_apply_batch() {
        let store = MemoryStore::new();
        store.set("old", json!(true)).await.unwrap();

        store
            .apply(vec![
                KvWrite::put("a", json!(1)),
                KvWrite::put("b", json!(2)),
                KvWrite::delete("old"),
            ])
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_del_missing_key_is_noop() {
        let store = MemoryStore::new();
        store.del("missing").await.unwrap();
        assert!(store.is_empty().await);
    }
}
