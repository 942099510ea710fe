//! Unified error type for the lobby.

use lobbyforge_launcher::LaunchError;
use lobbyforge_protocol::{ErrorKind, GameRef, ProtocolError};
use lobbyforge_room::RoomError;
use lobbyforge_session::SessionError;
use lobbyforge_store::StoreError;
use lobbyforge_transport::TransportError;

/// Errors from the on-disk game package library.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// No installed package for this version.
    #[error("game {0} is not installed")]
    NotFound(GameRef),

    /// A package for this version is already installed.
    #[error("game {0} already exists")]
    AlreadyExists(GameRef),

    /// A game name, version or file name that is not a plain relative path.
    #[error("invalid package path: {0}")]
    BadPath(String),

    /// A file's contents were not valid base64.
    #[error("file {file} is not valid base64: {source}")]
    BadEncoding {
        file: String,
        #[source]
        source: base64::DecodeError,
    },

    /// `game_config.json` could not be parsed or written.
    #[error("bad game_config.json: {0}")]
    Manifest(#[source] serde_json::Error),

    #[error("package I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::NotFound(_) => ErrorKind::NotFound,
            LibraryError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            LibraryError::BadPath(_) | LibraryError::BadEncoding { .. } => {
                ErrorKind::BadRequest
            }
            LibraryError::Manifest(_) | LibraryError::Io(_) => ErrorKind::Unavailable,
        }
    }
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically. Every
/// variant maps to the [`ErrorKind`] sent back on a failed reply.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    /// A game version the request refers to is not published.
    #[error("game {0} not found")]
    GameNotFound(GameRef),

    /// A developer tried to change a game someone else published.
    #[error("{developer} is not the author of {game}")]
    NotAuthor { developer: String, game: GameRef },

    /// Request fields that parse but make no sense.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An environment variable held an unusable value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LobbyError {
    /// The wire error class this failure is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LobbyError::Transport(_) | LobbyError::Launch(_) | LobbyError::Config(_) => {
                ErrorKind::Unavailable
            }
            LobbyError::Protocol(e) => ErrorKind::from(e),
            LobbyError::Store(e) => e.kind(),
            LobbyError::Session(e) => e.kind(),
            LobbyError::Room(e) => e.kind(),
            LobbyError::Library(e) => e.kind(),
            LobbyError::GameNotFound(_) => ErrorKind::NotFound,
            LobbyError::NotAuthor { .. } => ErrorKind::Forbidden,
            LobbyError::BadRequest(_) => ErrorKind::BadRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobbyforge_protocol::{Role, RoomId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let lobby_err: LobbyError = err.into();
        assert!(matches!(lobby_err, LobbyError::Transport(_)));
        assert!(lobby_err.to_string().contains("gone"));
        assert_eq!(lobby_err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_from_protocol_error_keeps_kind() {
        let err = ProtocolError::UnknownAction("FLY".into());
        let lobby_err: LobbyError = err.into();
        assert_eq!(lobby_err.kind(), ErrorKind::UnknownAction);
    }

    #[test]
    fn test_from_session_error_keeps_kind() {
        let err = SessionError::AlreadyOnline {
            name: "alice".into(),
            role: Role::Player,
        };
        let lobby_err: LobbyError = err.into();
        assert!(matches!(lobby_err, LobbyError::Session(_)));
        assert_eq!(lobby_err.kind(), ErrorKind::AlreadyOnline);
    }

    #[test]
    fn test_from_room_error_keeps_kind() {
        let lobby_err: LobbyError = RoomError::RoomFull(RoomId(1)).into();
        assert_eq!(lobby_err.kind(), ErrorKind::RoomFull);
    }

    #[test]
    fn test_launch_failure_is_unavailable() {
        let lobby_err: LobbyError = LaunchError::PortsExhausted.into();
        assert_eq!(lobby_err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_library_errors_map_to_wire_kinds() {
        let game = GameRef::new("Duel", "1.0.0");
        assert_eq!(
            LobbyError::from(LibraryError::AlreadyExists(game.clone())).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            LobbyError::from(LibraryError::BadPath("../x".into())).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            LobbyError::NotAuthor {
                developer: "mallory".into(),
                game
            }
            .kind(),
            ErrorKind::Forbidden
        );
    }
}
