//! The document store process.
//!
//! Configured through `LOBBYFORGE_STORE_BIND` and `LOBBYFORGE_STORE_FILE`;
//! log level through `RUST_LOG` (default `info`).

use std::sync::Arc;

use lobbyforge::{LobbyError, StoreConfig};
use lobbyforge_store::{DocumentStore, StoreServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LobbyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = StoreConfig::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        snapshot = %config.snapshot_path.display(),
        "starting document store"
    );

    let documents = Arc::new(DocumentStore::open(&config.snapshot_path).await?);
    let server = StoreServer::bind(&config.bind_addr, documents).await?;
    server.run().await?;
    Ok(())
}
