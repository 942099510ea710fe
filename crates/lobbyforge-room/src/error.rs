//! Error types for the room layer.

use lobbyforge_protocol::{ErrorKind, GameRef, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never created, or emptied and deleted).
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The room is at `max_players`.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The game version a room was asked for is not published.
    #[error("game {0} not found")]
    GameNotFound(GameRef),

    /// Only the host may start a room's match.
    #[error("only the host of room {room_id} can start the game, not {name}")]
    Forbidden { room_id: RoomId, name: String },

    /// Fewer members than the game's `min_players`.
    #[error("room {room_id} needs at least {need} players, has {have}")]
    NotEnoughPlayers {
        room_id: RoomId,
        have: usize,
        need: usize,
    },

    /// A match for this room is already running.
    #[error("room {0} is already playing")]
    AlreadyStarting(RoomId),

    /// Looking up the game's manifest failed for a reason other than the
    /// game being absent.
    #[error("manifest lookup failed: {0}")]
    Lookup(String),
}

impl RoomError {
    /// The wire error class this failure is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::RoomNotFound(_) => ErrorKind::RoomNotFound,
            RoomError::RoomFull(_) => ErrorKind::RoomFull,
            RoomError::GameNotFound(_) => ErrorKind::NotFound,
            RoomError::Forbidden { .. } => ErrorKind::Forbidden,
            RoomError::NotEnoughPlayers { .. } => ErrorKind::NotEnoughPlayers,
            RoomError::AlreadyStarting(_) => ErrorKind::AlreadyStarting,
            RoomError::Lookup(_) => ErrorKind::Unavailable,
        }
    }
}
