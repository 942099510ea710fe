//! Room capacity, copied from the game's manifest when the room is created.

use lobbyforge_protocol::GameManifest;
use serde::{Deserialize, Serialize};

/// Capacity bounds of one room.
///
/// Copied rather than looked up on each join: a room keeps the bounds it
/// was created with even if the package directory changes underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Minimum members required to start a match.
    pub min_players: usize,

    /// Maximum members allowed in the room.
    pub max_players: usize,
}

impl RoomConfig {
    pub fn from_manifest(manifest: &GameManifest) -> Self {
        Self {
            min_players: manifest.min_players,
            max_players: manifest.max_players,
        }
    }

    /// Returns `true` if a room with `members` members has no free slot.
    pub fn is_full(&self, members: usize) -> bool {
        members >= self.max_players
    }

    /// Returns `true` if `members` is enough to start.
    pub fn can_start(&self, members: usize) -> bool {
        members >= self.min_players
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 2,
        }
    }
}
