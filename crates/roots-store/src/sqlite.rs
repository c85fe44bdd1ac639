//! SQLite-backed key-value store

use crate::StoreError;
use async_trait::async_trait;
use roots_domain::{KeyValueStore, KvWrite};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task;

/// SQLite-based implementation of `KeyValueStore`
///
/// All keys live in one `kv_store` table with JSON text values. Calls run on
/// tokio's blocking pool against a single mutex-guarded connection, and
/// [`KeyValueStore::apply`] runs inside one transaction.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use roots_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("roots.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let in_memory = path.as_ref() == Path::new(":memory:");
        let conn = Connection::open(path.as_ref())?;

        if !in_memory {
            // WAL keeps readers unblocked while a batch commits
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        }

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        tracing::debug!(path = %path.as_ref().display(), "opened sqlite store");
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch(schema)?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn decode(text: &str) -> Result<Value, StoreError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    type Error = StoreError;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            let text: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![&key],
                    |row| row.get(0),
                )
                .optional()?;
            text.as_deref().map(Self::decode).transpose()
        })
        .await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Self::Error> {
        let key = key.to_string();
        let text = serde_json::to_string(&value)?;
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value, updated_at = strftime('%s', 'now')",
                params![&key, &text],
            )?;
            Ok(())
        })
        .await
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, Self::Error> {
        let key = key.to_string();
        let text = serde_json::to_string(&value)?;
        self.with_connection(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO NOTHING",
                params![&key, &text],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![&key])?;
            Ok(())
        })
        .await
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, Self::Error> {
        let prefix = prefix.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT value FROM kv_store
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let texts = stmt
                .query_map(params![&prefix], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            texts.iter().map(|text| Self::decode(text)).collect()
        })
        .await
    }

    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), Self::Error> {
        // Encode up front so a bad value aborts before the transaction opens
        let encoded = writes
            .into_iter()
            .map(|write| -> Result<(String, Option<String>), StoreError> {
                match write {
                    KvWrite::Put { key, value } => Ok((key, Some(serde_json::to_string(&value)?))),
                    KvWrite::Delete { key } => Ok((key, None)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            for (key, text) in &encoded {
                match text {
                    Some(text) => {
                        tx.execute(
                            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                             ON CONFLICT(key) DO UPDATE SET
                             value = excluded.value, updated_at = strftime('%s', 'now')",
                            params![key, text],
                        )?;
                    }
                    None => {
                        tx.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = SqliteStore::new(":memory:").unwrap();
        assert!(store.get("profile:none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = SqliteStore::new(":memory:").unwrap();
        store.set("k", json!({"v": 1})).await.unwrap();
        store.set("k", json!({"v": 2})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_prefix_scan_excludes_sibling_prefixes() {
        let store = SqliteStore::new(":memory:").unwrap();
        store.set("profile:b", json!("b")).await.unwrap();
        store.set("profile:a", json!("a")).await.unwrap();
        store.set("profile_relationships:a", json!(["r1"])).await.unwrap();

        let values = store.get_by_prefix("profile:").await.unwrap();
        assert_eq!(values, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_prefix_with_like_wildcards_is_literal() {
        let store = SqliteStore::new(":memory:").unwrap();
        store.set("a%b", json!(1)).await.unwrap();
        store.set("axb", json!(2)).await.unwrap();

        let values = store.get_by_prefix("a%").await.unwrap();
        assert_eq!(values, vec![json!(1)]);
    }
}
