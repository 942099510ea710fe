//! Running matches, keyed by room.
//!
//! An entry exists from a successful launch until the reaper sees the
//! process exit. The room directory's `playing` status tracks the same
//! span.

use std::collections::HashMap;

use lobbyforge_launcher::{MatchExit, RunningMatch};
use lobbyforge_protocol::{GameRef, RoomId};
use tokio::sync::Mutex;

/// One live match process and the roster it was launched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntry {
    pub room_id: RoomId,
    pub game: GameRef,
    pub port: u16,
    pub pid: Option<u32>,
    pub roster: Vec<String>,
}

impl MatchEntry {
    pub fn new(running: RunningMatch, game: GameRef, roster: Vec<String>) -> Self {
        Self {
            room_id: running.room_id,
            game,
            port: running.port,
            pid: running.pid,
            roster,
        }
    }
}

/// All live matches.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    matches: Mutex<HashMap<RoomId, MatchEntry>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a launched match. Returns the entry it replaced, which is
    /// always `None` while the directory allows one match per room.
    pub async fn insert(&self, entry: MatchEntry) -> Option<MatchEntry> {
        self.matches.lock().await.insert(entry.room_id, entry)
    }

    /// Drops the entry for `room_id` after its process ended.
    pub async fn remove(&self, room_id: RoomId, exit: &MatchExit) -> Option<MatchEntry> {
        let removed = self.matches.lock().await.remove(&room_id);
        match &removed {
            Some(entry) => {
                tracing::info!(%room_id, port = entry.port, ?exit, "match finished")
            }
            None => tracing::warn!(%room_id, ?exit, "exit for unknown match"),
        }
        removed
    }

    pub async fn get(&self, room_id: RoomId) -> Option<MatchEntry> {
        self.matches.lock().await.get(&room_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.matches.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(room: u64, port: u16) -> MatchEntry {
        MatchEntry::new(
            RunningMatch {
                room_id: RoomId(room),
                port,
                pid: Some(4242),
            },
            GameRef::new("Duel", "1.0.0"),
            vec!["alice".into(), "bob".into()],
        )
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = MatchRegistry::new();
        assert!(registry.insert(entry(1, 44848)).await.is_none());

        let found = registry.get(RoomId(1)).await.unwrap();
        assert_eq!(found.port, 44848);
        assert_eq!(found.roster, vec!["alice", "bob"]);

        let exit = MatchExit::Exited { code: Some(0) };
        assert!(registry.remove(RoomId(1), &exit).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_none() {
        let registry = MatchRegistry::new();
        let exit = MatchExit::Lost("gone".into());
        assert!(registry.remove(RoomId(7), &exit).await.is_none());
    }
}
