//! `LobbyServer` builder and accept loop.
//!
//! This is the entry point for running a lobby. It ties together all the
//! layers: transport → protocol → session / room / launcher → lobby.

use std::path::PathBuf;
use std::sync::Arc;

use lobbyforge_store::Datastore;
use lobbyforge_transport::{TcpTransport, Transport};

use crate::handler::handle_connection;
use crate::{Lobby, LobbyConfig, LobbyError};

/// Builder for configuring and starting a lobby server.
///
/// # Example
///
/// ```rust,ignore
/// use lobbyforge::LobbyServer;
/// use lobbyforge_store::StoreClient;
///
/// let server = LobbyServer::builder()
///     .bind("0.0.0.0:26969")
///     .games_dir("/srv/lobbyforge/games")
///     .build(StoreClient::new("127.0.0.1:21212"))
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct LobbyServerBuilder {
    config: LobbyConfig,
}

impl LobbyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once, e.g. with [`LobbyConfig::from_env`].
    pub fn config(mut self, config: LobbyConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the host announced to players in `GAME_STARTING`.
    pub fn public_host(mut self, host: &str) -> Self {
        self.config.public_host = host.to_string();
        self
    }

    pub fn games_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.games_dir = dir.into();
        self
    }

    /// Sets the port given to the first match.
    pub fn first_match_port(mut self, port: u16) -> Self {
        self.config.launcher.first_port = port;
        self
    }

    /// Sets the program that runs game servers; `None` runs them directly.
    pub fn interpreter(mut self, interpreter: Option<PathBuf>) -> Self {
        self.config.launcher.interpreter = interpreter;
        self
    }

    /// Binds the listener and builds the lobby over `store`.
    pub async fn build<D: Datastore>(self, store: D) -> Result<LobbyServer<D>, LobbyError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;
        let lobby = Arc::new(Lobby::new(&self.config, store));
        Ok(LobbyServer { transport, lobby })
    }
}

/// A bound lobby server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LobbyServer<D: Datastore> {
    transport: TcpTransport,
    lobby: Arc<Lobby<D>>,
}

impl<D: Datastore> LobbyServer<D> {
    /// Creates a new builder.
    pub fn builder() -> LobbyServerBuilder {
        LobbyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The shared lobby state, for inspection.
    pub fn lobby(&self) -> Arc<Lobby<D>> {
        Arc::clone(&self.lobby)
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each connection. Runs until the process
    /// is terminated.
    pub async fn run(mut self) -> Result<(), LobbyError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "lobby running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let lobby = Arc::clone(&self.lobby);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, lobby).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
