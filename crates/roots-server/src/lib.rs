//! RootsLegacy HTTP Server
//!
//! JSON API over the family relationship graph: profiles, typed
//! relationships, family trees, exports and index reconciliation.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod session;

use config::ServerConfig;
use handlers::{create_router, AppState};
use roots_store::StoreError;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The configured store could not be opened
    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Install the global tracing subscriber
///
/// Honours `RUST_LOG`; defaults to `info`. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Start the HTTP server
///
/// Opens the configured store, builds the graph and session manager,
/// and serves until the listener fails.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    init_tracing();

    info!("Starting RootsLegacy server");
    info!("Bind address: {}", config.bind_addr());
    info!("Token expiry: {} seconds", config.token_expiry_secs);

    let state = AppState::from_config(&config)?;
    info!(backend = state.storage_backend, "Storage opened");

    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}
