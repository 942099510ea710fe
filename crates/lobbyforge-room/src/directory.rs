//! The room directory: every room in the lobby, behind one lock.
//!
//! Each operation takes the lock once and does all of its checks and
//! mutations inside that critical section. In particular
//! [`begin_match`](RoomDirectory::begin_match) checks host, capacity and
//! status and flips the room to `playing` without releasing the lock, so
//! two concurrent starts can never both succeed.

use std::collections::BTreeMap;

use lobbyforge_protocol::{GameRef, RoomId, RoomStatus, RoomSummary, Visibility};
use tokio::sync::Mutex;

use crate::{ManifestLookup, Room, RoomConfig, RoomError};

/// What a successful start hands to the match launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTicket {
    pub room_id: RoomId,
    pub game: GameRef,
    /// Roster at the moment the room went `playing`, in join order.
    pub members: Vec<String>,
}

/// Result of a [`leave`](RoomDirectory::leave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The name was not a member; nothing changed.
    NotMember,
    /// The name left. `new_host` is set if the host left and the next
    /// member in join order took over.
    Left { new_host: Option<String> },
    /// The last member left and the room was deleted.
    Closed,
}

struct DirectoryInner {
    /// Ordered so listings come out by id.
    rooms: BTreeMap<RoomId, Room>,
    next_id: u64,
}

/// All rooms in the lobby.
pub struct RoomDirectory {
    inner: Mutex<DirectoryInner>,
}

impl RoomDirectory {
    /// Creates an empty directory. Room ids start at 1.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DirectoryInner {
                rooms: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Creates a room for `game` with `host` as its first member.
    ///
    /// The manifest is resolved before the lock is taken, so a slow
    /// lookup never blocks other room operations.
    ///
    /// # Errors
    /// [`RoomError::GameNotFound`] if `game` is not published.
    pub async fn create<L: ManifestLookup>(
        &self,
        host: &str,
        game: GameRef,
        visibility: Visibility,
        manifests: &L,
    ) -> Result<RoomId, RoomError> {
        let manifest = manifests.manifest(&game).await?;
        let config = RoomConfig::from_manifest(&manifest);

        let mut inner = self.inner.lock().await;
        let room_id = RoomId(inner.next_id);
        inner.next_id += 1;
        inner.rooms.insert(
            room_id,
            Room::new(room_id, host.to_string(), game, visibility, config),
        );
        drop(inner);

        tracing::info!(%room_id, host, "room created");
        Ok(room_id)
    }

    /// Adds `name` to a room.
    ///
    /// Capacity is checked first: a full room refuses everyone, members
    /// included. Otherwise joining a room you are already in is a no-op.
    /// Joining while a match is running is allowed; the new member simply
    /// isn't part of that match.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] if the room doesn't exist
    /// - [`RoomError::RoomFull`] if it is at `max_players`, even for a member
    pub async fn join(&self, room_id: RoomId, name: &str) -> Result<(), RoomError> {
        let mut inner = self.inner.lock().await;
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::RoomNotFound(room_id))?;

        if room.is_full() {
            return Err(RoomError::RoomFull(room_id));
        }
        if room.is_member(name) {
            return Ok(());
        }
        room.members.push(name.to_string());

        tracing::info!(%room_id, player = name, "joined room");
        Ok(())
    }

    /// Removes `name` from a room.
    ///
    /// An emptied room is deleted. If the host leaves, the earliest
    /// remaining joiner becomes host.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] if the room doesn't exist.
    pub async fn leave(
        &self,
        room_id: RoomId,
        name: &str,
    ) -> Result<LeaveOutcome, RoomError> {
        let mut inner = self.inner.lock().await;
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::RoomNotFound(room_id))?;

        let Some(pos) = room.members.iter().position(|m| m == name) else {
            return Ok(LeaveOutcome::NotMember);
        };
        room.members.remove(pos);

        let Some(first) = room.members.first().cloned() else {
            inner.rooms.remove(&room_id);
            tracing::info!(%room_id, "last member left, room closed");
            return Ok(LeaveOutcome::Closed);
        };

        let new_host = if room.host == name {
            room.host = first.clone();
            tracing::info!(%room_id, host = %first, "host left, promoted next member");
            Some(first)
        } else {
            None
        };

        tracing::info!(%room_id, player = name, "left room");
        Ok(LeaveOutcome::Left { new_host })
    }

    /// Snapshot of every room, ordered by id.
    pub async fn list(&self) -> Vec<RoomSummary> {
        let inner = self.inner.lock().await;
        inner.rooms.values().map(Room::summary).collect()
    }

    /// Snapshot of one room.
    pub async fn get(&self, room_id: RoomId) -> Result<RoomSummary, RoomError> {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .get(&room_id)
            .map(Room::summary)
            .ok_or(RoomError::RoomNotFound(room_id))
    }

    /// Number of rooms.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.rooms.len()
    }

    /// Returns `true` if there are no rooms.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.rooms.is_empty()
    }

    /// The start-game check-and-set.
    ///
    /// Checks, in order: the room exists, `requester` is its host, it has
    /// at least `min_players` members, it is not already playing. On
    /// success the room is `playing` before the lock is released.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`], [`RoomError::Forbidden`],
    /// [`RoomError::NotEnoughPlayers`] or [`RoomError::AlreadyStarting`].
    pub async fn begin_match(
        &self,
        room_id: RoomId,
        requester: &str,
    ) -> Result<MatchTicket, RoomError> {
        let mut inner = self.inner.lock().await;
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::RoomNotFound(room_id))?;

        if room.host != requester {
            return Err(RoomError::Forbidden {
                room_id,
                name: requester.to_string(),
            });
        }
        if !room.config.can_start(room.members.len()) {
            return Err(RoomError::NotEnoughPlayers {
                room_id,
                have: room.members.len(),
                need: room.config.min_players,
            });
        }
        if room.status == RoomStatus::Playing {
            return Err(RoomError::AlreadyStarting(room_id));
        }

        room.status = RoomStatus::Playing;
        tracing::info!(%room_id, members = room.members.len(), "room now playing");

        Ok(MatchTicket {
            room_id,
            game: room.game.clone(),
            members: room.members.clone(),
        })
    }

    /// Returns a room to `idle` after its match ended (or failed to
    /// launch). Returns `false` if the room no longer exists.
    pub async fn finish_match(&self, room_id: RoomId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.rooms.get_mut(&room_id) {
            Some(room) => {
                room.status = RoomStatus::Idle;
                tracing::info!(%room_id, "room back to idle");
                true
            }
            None => false,
        }
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
