//! # Lobbyforge
//!
//! Game distribution lobby and match orchestrator.
//!
//! Developers publish game packages, players browse and download them and
//! gather in rooms, and when a room's host starts the game the lobby
//! launches one server process per match and points every member at it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lobbyforge::{LobbyConfig, LobbyServer};
//! use lobbyforge_store::StoreClient;
//!
//! # async fn start() -> Result<(), lobbyforge::LobbyError> {
//! let config = LobbyConfig::from_env()?;
//! let store = StoreClient::new(config.store_addr.clone());
//! let server = LobbyServer::<StoreClient>::builder().config(config).build(store).await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod library;
mod lobby;
mod matches;
mod server;

pub use config::{
    DEFAULT_GAMES_DIR, DEFAULT_LOBBY_BIND, DEFAULT_SNAPSHOT_FILE, DEFAULT_STORE_ADDR,
    LobbyConfig, StoreConfig,
};
pub use error::{LibraryError, LobbyError};
pub use library::{GameLibrary, MANIFEST_FILE};
pub use lobby::Lobby;
pub use matches::{MatchEntry, MatchRegistry};
pub use server::{LobbyServer, LobbyServerBuilder};
