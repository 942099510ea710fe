//! Error types for the datastore layer.

use lobbyforge_protocol::{ErrorKind, ProtocolError};
use lobbyforge_transport::TransportError;

/// Errors that can occur talking to, or inside, the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reaching the store process failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A request or reply could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The store closed the connection without replying.
    #[error("datastore closed the connection without replying")]
    NoReply,

    /// The store answered with `success: false`.
    #[error("datastore rejected request: {message}")]
    Rejected {
        kind: Option<ErrorKind>,
        message: String,
    },

    /// The collection name is not one the store keeps.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// The request's `data` had the wrong shape.
    #[error("bad datastore request: {0}")]
    BadRequest(String),

    /// Reading or writing the snapshot file failed.
    #[error("snapshot I/O failed: {0}")]
    Persist(#[source] std::io::Error),

    /// The snapshot file exists but is not a valid snapshot.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(#[source] serde_json::Error),
}

impl StoreError {
    /// The wire error class this failure is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::UnknownCollection(_) | StoreError::BadRequest(_) => {
                ErrorKind::BadRequest
            }
            StoreError::Rejected {
                kind: Some(kind), ..
            } => *kind,
            _ => ErrorKind::Unavailable,
        }
    }
}
