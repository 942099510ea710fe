//! Core domain types shared by every Lobbyforge actor.
//!
//! These are the records that appear inside requests and replies: room
//! ids, roles, game references, manifests and room summaries. The message
//! unions themselves live in `message.rs`.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
///
/// A newtype over `u64` so a room id can't be confused with a port or a
/// document id. `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Which kind of account an identity is.
///
/// Players and developers live in separate datastore collections and
/// separate online maps, so the same name may exist once per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Player,
    Developer,
}

impl Role {
    /// Name of the datastore collection holding this role's identities.
    pub fn collection(self) -> &'static str {
        match self {
            Role::Player => "Player",
            Role::Developer => "Developer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Whether a room shows up for everyone or only for people who know its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A room's lifecycle state.
///
/// `Playing` holds exactly while a match process for the room is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Idle,
    Playing,
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

/// Names one published version of a game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameRef {
    pub name: String,
    pub version: String,
}

impl GameRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for GameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

fn default_server_program() -> String {
    "game_server.py".into()
}

fn default_client_program() -> String {
    "game_client.py".into()
}

/// Per-version game metadata, stored as `game_config.json` next to the
/// program files.
///
/// The keys stay snake_case on disk and on the wire because this is the
/// file format developers author by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: String,
    pub min_players: usize,
    pub max_players: usize,
    #[serde(default = "default_server_program")]
    pub server_program: String,
    #[serde(default = "default_client_program")]
    pub client_program: String,
}

impl GameManifest {
    /// Returns the `(name, version)` this manifest describes.
    pub fn game_ref(&self) -> GameRef {
        GameRef::new(self.name.clone(), self.version.clone())
    }

    /// Checks the capacity bounds and names.
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.version.trim().is_empty() {
            return Err("name and version must not be empty".into());
        }
        if self.min_players == 0 {
            return Err("min_players must be at least 1".into());
        }
        if self.min_players > self.max_players {
            return Err(format!(
                "min_players ({}) exceeds max_players ({})",
                self.min_players, self.max_players
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// A snapshot of one room, as returned by `LIST_ROOMS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub host: String,
    pub game: GameRef,
    pub visibility: Visibility,
    /// Names in join order. The first entry is the host.
    pub members: Vec<String>,
    pub member_count: usize,
    pub min_players: usize,
    pub max_players: usize,
    pub status: RoomStatus,
}

// =========================================================================
// Tests
// =========================================================================
