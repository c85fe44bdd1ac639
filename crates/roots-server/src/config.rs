//! Configuration file parsing for the server.
//!
//! Loads settings from TOML files including bind address, JWT secret,
//! token expiry, storage backend and query defaults.

use roots_graph::DEFAULT_TREE_DEPTH;
use roots_store::{MemoryStore, SqliteStore, StoreBackend, StoreError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// A field is present but unusable
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// JWT secret for verifying bearer tokens
    pub jwt_secret: String,

    /// Token expiry in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,

    /// Where profiles and relationships are kept
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tree depth used when `max_depth` is not given
    #[serde(default = "default_tree_depth")]
    pub default_tree_depth: usize,

    /// Upper bound on any requested tree depth
    #[serde(default = "default_max_tree_depth")]
    pub max_tree_depth: usize,

    /// Page size used when `limit` is not given
    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite database at `storage.path`
    #[default]
    Sqlite,
    /// Process-local map, lost on exit
    Memory,
}

/// `[storage]` section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend to open
    #[serde(default)]
    pub backend: BackendKind,

    /// Database file (SQLite only)
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Open the configured backend
    pub fn open(&self) -> Result<StoreBackend, StoreError> {
        Ok(match self.backend {
            BackendKind::Memory => StoreBackend::Memory(MemoryStore::new()),
            BackendKind::Sqlite => StoreBackend::Sqlite(SqliteStore::new(&self.path)?),
        })
    }
}

/// Default token expiry: 1 hour
fn default_token_expiry() -> u64 {
    3600
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

fn default_max_tree_depth() -> usize {
    6
}

fn default_list_limit() -> usize {
    100
}

fn default_db_path() -> PathBuf {
    PathBuf::from("roots.db")
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingField("jwt_secret".to_string()));
        }
        if self.default_list_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_list_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.default_tree_depth > self.max_tree_depth {
            return Err(ConfigError::InvalidValue {
                field: "default_tree_depth".to_string(),
                reason: format!("must not exceed max_tree_depth ({})", self.max_tree_depth),
            });
        }
        if self.storage.backend == BackendKind::Sqlite && self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("storage.path".to_string()));
        }
        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            jwt_secret: "test-secret-key-do-not-use-in-production".to_string(),
            token_expiry_secs: 3600,
            storage: StorageConfig {
                backend: BackendKind::Memory,
                path: default_db_path(),
            },
            default_tree_depth: DEFAULT_TREE_DEPTH,
            max_tree_depth: default_max_tree_depth(),
            default_list_limit: 100,
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default_test_config();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.token_expiry_secs, 3600);
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.default_tree_depth, 3);
        assert_eq!(config.max_tree_depth, 6);
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig::default_test_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            jwt_secret = "my-secret"
            token_expiry_secs = 7200
            default_tree_depth = 5

            [storage]
            backend = "sqlite"
            path = "/var/lib/roots/family.db"
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.jwt_secret, "my-secret");
        assert_eq!(config.token_expiry_secs, 7200);
        assert_eq!(config.default_tree_depth, 5);
        assert_eq!(config.max_tree_depth, 6);
        assert_eq!(config.default_list_limit, 100);
        assert_eq!(config.storage.backend, BackendKind::Sqlite);
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/roots/family.db"));
    }

    #[test]
    fn test_storage_defaults_to_sqlite() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            jwt_secret = "s"
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Sqlite);
        assert_eq!(config.storage.path, PathBuf::from("roots.db"));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            jwt_secret = ""
        "#;

        let result = ServerConfig::from_toml(toml);
        assert!(matches!(result, Err(ConfigError::MissingField(field)) if field == "jwt_secret"));
    }

    #[test]
    fn test_zero_list_limit_rejected() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            jwt_secret = "s"
            default_list_limit = 0
        "#;

        assert!(matches!(
            ServerConfig::from_toml(toml),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_default_depth_above_max_rejected() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            jwt_secret = "s"
            default_tree_depth = 4
            max_tree_depth = 2
        "#;

        assert!(matches!(
            ServerConfig::from_toml(toml),
            Err(ConfigError::InvalidValue { field, .. }) if field == "default_tree_depth"
        ));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            jwt_secret = "s"

            [storage]
            backend = "redis"
        "#;

        assert!(matches!(
            ServerConfig::from_toml(toml),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_open_memory_backend() {
        let config = ServerConfig::default_test_config();
        let store = config.storage.open().unwrap();
        assert_eq!(store.name(), "memory");
    }
}
