//! Error types for graph operations

use thiserror::Error;

/// Errors that can occur during profile and relationship operations
#[derive(Error, Debug)]
pub enum GraphError {
    /// A profile, relationship or invitation identifier does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request is malformed (e.g. a self-relationship)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request collides with existing state (duplicate edge, already-claimed profile)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller may not perform this operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Underlying key-value store failure
    #[error("Storage error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored record could not be encoded or decoded
    #[error("Malformed record at {key}: {source}")]
    Serialization {
        /// Key (or key prefix) of the offending record
        key: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },
}

impl GraphError {
    /// Wrap a store error
    pub fn store<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        GraphError::Store(Box::new(error))
    }
}

/// Convenient Result type using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;
