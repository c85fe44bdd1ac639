//! Trait definitions for external interactions
//!
//! The graph engine only ever talks to storage through [`KeyValueStore`].
//! Implementations live in the infrastructure layer (`roots-store`).

use async_trait::async_trait;
use serde_json::Value;

/// One write in an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum KvWrite {
    /// Insert or overwrite `key`
    Put {
        /// Target key
        key: String,
        /// New value
        value: Value,
    },
    /// Remove `key` (no-op when absent)
    Delete {
        /// Target key
        key: String,
    },
}

impl KvWrite {
    /// Shorthand for [`KvWrite::Put`]
    pub fn put(key: impl Into<String>, value: Value) -> Self {
        KvWrite::Put {
            key: key.into(),
            value,
        }
    }

    /// Shorthand for [`KvWrite::Delete`]
    pub fn delete(key: impl Into<String>) -> Self {
        KvWrite::Delete { key: key.into() }
    }

    /// Key targeted by this write
    pub fn key(&self) -> &str {
        match self {
            KvWrite::Put { key, .. } | KvWrite::Delete { key } => key,
        }
    }
}

/// Asynchronous key-value store holding JSON values
///
/// Implemented by the infrastructure layer (roots-store). Every call is a
/// suspension point; implementations must be safe to share between
/// concurrently running requests.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error>;

    /// Insert or overwrite `key`
    async fn set(&self, key: &str, value: Value) -> Result<(), Self::Error>;

    /// Insert `key` only if it is absent
    ///
    /// Returns `true` when the value was written, `false` when the key
    /// already existed. This is the conditional-write primitive used to
    /// enforce uniqueness without a separate read.
    async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, Self::Error>;

    /// Remove `key` (no-op when absent)
    async fn del(&self, key: &str) -> Result<(), Self::Error>;

    /// All values whose key starts with `prefix`, in key order
    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, Self::Error>;

    /// Apply every write in `writes` atomically, in order
    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), Self::Error>;
}
