//! RootsLegacy Storage Layer
//!
//! Implements the `KeyValueStore` trait from `roots-domain`.
//!
//! # Architecture
//!
//! - [`MemoryStore`]: ordered in-memory map, for tests and throwaway runs
//! - [`SqliteStore`]: durable single-table store on SQLite
//! - [`StoreBackend`]: one of the above, picked at runtime from configuration
//!
//! # Examples
//!
//! ```no_run
//! use roots_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for key-value operations
//! ```

#![warn(missing_docs)]

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use roots_domain::{KeyValueStore, KvWrite};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking task running a database call failed
    #[error("Storage task failed: {0}")]
    Task(String),

    /// A previous holder of the connection panicked
    #[error("Storage connection lock poisoned")]
    Poisoned,
}

/// A store implementation chosen at runtime
pub enum StoreBackend {
    /// In-memory map
    Memory(MemoryStore),
    /// SQLite file or `:memory:` database
    Sqlite(SqliteStore),
}

impl StoreBackend {
    /// Short name of the active backend ("memory" or "sqlite")
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Memory(_) => "memory",
            StoreBackend::Sqlite(_) => "sqlite",
        }
    }
}

impl From<MemoryStore> for StoreBackend {
    fn from(store: MemoryStore) -> Self {
        StoreBackend::Memory(store)
    }
}

impl From<SqliteStore> for StoreBackend {
    fn from(store: SqliteStore) -> Self {
        StoreBackend::Sqlite(store)
    }
}

#[async_trait]
impl KeyValueStore for StoreBackend {
    type Error = StoreError;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        match self {
            StoreBackend::Memory(store) => store.get(key).await,
            StoreBackend::Sqlite(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Self::Error> {
        match self {
            StoreBackend::Memory(store) => store.set(key, value).await,
            StoreBackend::Sqlite(store) => store.set(key, value).await,
        }
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, Self::Error> {
        match self {
            StoreBackend::Memory(store) => store.set_if_absent(key, value).await,
            StoreBackend::Sqlite(store) => store.set_if_absent(key, value).await,
        }
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        match self {
            StoreBackend::Memory(store) => store.del(key).await,
            StoreBackend::Sqlite(store) => store.del(key).await,
        }
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, Self::Error> {
        match self {
            StoreBackend::Memory(store) => store.get_by_prefix(prefix).await,
            StoreBackend::Sqlite(store) => store.get_by_prefix(prefix).await,
        }
    }

    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), Self::Error> {
        match self {
            StoreBackend::Memory(store) => store.apply(writes).await,
            StoreBackend::Sqlite(store) => store.apply(writes).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_backend_delegates() {
        let backend = StoreBackend::from(MemoryStore::new());
        assert_eq!(backend.name(), "memory");

        backend.set("profile:p1", json!({"name": "Ama"})).await.unwrap();
        let value = backend.get("profile:p1").await.unwrap().unwrap();
        assert_eq!(value["name"], "Ama");
    }

    #[tokio::test]
    async fn test_sqlite_backend_name() {
        let backend = StoreBackend::from(SqliteStore::new(":memory:").unwrap());
        assert_eq!(backend.name(), "sqlite");
        assert!(backend.set_if_absent("k", json!(1)).await.unwrap());
        assert!(!backend.set_if_absent("k", json!(2)).await.unwrap());
    }
}
