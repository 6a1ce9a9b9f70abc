//! `shelfmate_server`
//!
//! This crate serves the Shelfmate reading tracker over HTTP
use crate::config::{ConfigStore, ServerConfig};
use crate::state::AppState;
use anyhow::{Context as _, Error};
use shelfmate_core::catalog::client::GoogleBooksClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Environment and key-value config
pub mod config;
/// Error types
pub mod errors;
/// HTTP routes and handlers
pub mod routes;
/// App state management
pub mod state;

pub use routes::router;

#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Executed once per run, never across crate boundaries"
)]
#[allow(
    clippy::print_stderr,
    reason = "Tracing might not be available here if run_safe() failed before its initialization"
)]
pub fn run() {
    if let Err(error) = run_safe() {
        eprintln!("Failed to start Shelfmate! Error: {error:#}");
    }
}

/// Encapsulated run function that allows returning errors instead of always panicking on `Err` or
/// `None` variants.
fn run_safe() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|err| anyhow::anyhow!("Unable to set global tracing subscriber: {err}"))?;

    let config = ServerConfig::from_env()?;
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?
        .block_on(start(config))
}

async fn start(config: ServerConfig) -> Result<(), Error> {
    let store = ConfigStore::load(&config.config_path).await?;
    let catalog = GoogleBooksClient::new(config.api_key)?;
    if !catalog.has_api_key() {
        tracing::warn!("No usable GOOGLE_BOOKS_API_KEY set, searching without an API key");
    }

    let state = Arc::new(AppState::new(catalog, store));
    state.connect_stored_library().await;

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    serve(listener, Arc::clone(&state)).await?;
    state.close().await;
    tracing::info!("Shut down");
    Ok(())
}

/// Serves the API on `listener` until Ctrl+C is pressed.
/// # Errors
/// Fails if the listener fails.
#[allow(clippy::missing_inline_in_public_items, reason = "Called once per run")]
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C, shut down is only possible by killing: {err}");
        core::future::pending::<()>().await;
    }
}
