//! A single room's state.
//!
//! A room is a pre-match grouping of players around one game version.
//! Rooms are plain data; every mutation goes through the
//! [`RoomDirectory`](crate::RoomDirectory), which holds them under one lock.

use lobbyforge_protocol::{GameRef, RoomId, RoomStatus, RoomSummary, Visibility};

use crate::RoomConfig;

/// One room.
///
/// Invariants, upheld by the directory:
/// - `members` is never empty while the room exists
/// - `members.len() <= config.max_players`
/// - `host` is always `members[0]`
#[derive(Debug, Clone)]
pub struct Room {
    pub(crate) id: RoomId,
    pub(crate) host: String,
    pub(crate) game: GameRef,
    pub(crate) visibility: Visibility,
    /// Join order. Promotion on host leave follows this order.
    pub(crate) members: Vec<String>,
    pub(crate) config: RoomConfig,
    pub(crate) status: RoomStatus,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        host: String,
        game: GameRef,
        visibility: Visibility,
        config: RoomConfig,
    ) -> Self {
        Self {
            id,
            members: vec![host.clone()],
            host,
            game,
            visibility,
            config,
            status: RoomStatus::Idle,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    pub fn is_full(&self) -> bool {
        self.config.is_full(self.members.len())
    }

    /// The wire snapshot of this room.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id,
            host: self.host.clone(),
            game: self.game.clone(),
            visibility: self.visibility,
            members: self.members.clone(),
            member_count: self.members.len(),
            min_players: self.config.min_players,
            max_players: self.config.max_players,
            status: self.status,
        }
    }
}
