//! The lobby process.
//!
//! Configured through `LOBBYFORGE_*` environment variables; log level
//! through `RUST_LOG` (default `info`).

use lobbyforge::{LobbyConfig, LobbyError, LobbyServer};
use lobbyforge_store::StoreClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LobbyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = LobbyConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        store = %config.store_addr,
        games = %config.games_dir.display(),
        "starting lobby"
    );

    let store = StoreClient::new(config.store_addr.clone());
    let server = LobbyServer::<StoreClient>::builder().config(config).build(store).await?;
    server.run().await
}
