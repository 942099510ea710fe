//! Error types for the session layer.

use lobbyforge_protocol::{ErrorKind, Role};
use lobbyforge_store::StoreError;

/// Errors that can occur during registration, login and logout.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The name already has a live session for this role.
    /// One identity can only be logged in once at a time.
    #[error("{role} {name} is already online")]
    AlreadyOnline { name: String, role: Role },

    /// No account, or no live session, exists under this name.
    #[error("{0} not found")]
    NotFound(String),

    /// The password hash did not match the stored one.
    #[error("invalid password")]
    BadCredentials,

    /// Registration for a name that is already taken.
    #[error("{0} is already registered")]
    AlreadyExists(String),

    /// Name or password missing or blank.
    #[error("invalid credentials: {0}")]
    InvalidInput(String),

    /// The stored identity document is missing fields.
    #[error("malformed identity record: {0}")]
    CorruptRecord(String),

    /// The datastore could not be reached or refused the request.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// The wire error class this failure is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::AlreadyOnline { .. } => ErrorKind::AlreadyOnline,
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::BadCredentials => ErrorKind::BadCredentials,
            SessionError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            SessionError::InvalidInput(_) => ErrorKind::BadRequest,
            SessionError::CorruptRecord(_) => ErrorKind::Unavailable,
            SessionError::Store(e) => e.kind(),
        }
    }
}
