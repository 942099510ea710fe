//! Error types for the client side.

use lobbyforge_protocol::{ErrorKind, ProtocolError};
use lobbyforge_transport::TransportError;

/// Errors a [`LobbyClient`](crate::LobbyClient) call can return.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No reply arrived within the request timeout. The pending entry has
    /// been removed; a reply arriving later is dropped.
    #[error("request {request_id} timed out")]
    Timeout { request_id: String },

    /// The connection closed before the reply arrived.
    #[error("connection to lobby closed")]
    Disconnected,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The lobby answered with `success: false`.
    #[error("lobby rejected request: {message}")]
    Rejected {
        kind: Option<ErrorKind>,
        message: String,
    },

    /// The game client program could not be started.
    #[error("failed to launch game client: {0}")]
    Launch(#[source] std::io::Error),
}
