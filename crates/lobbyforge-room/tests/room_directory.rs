//! Integration tests for the room directory under concurrent use.

use std::collections::HashMap;
use std::sync::Arc;

use lobbyforge_protocol::{GameManifest, GameRef, RoomStatus, Visibility};
use lobbyforge_room::{ManifestLookup, RoomDirectory, RoomError};

// =========================================================================
// Mock manifest source: a fixed map of published games.
// =========================================================================

struct Catalog(HashMap<GameRef, GameManifest>);

impl Catalog {
    fn with(games: &[(&str, usize, usize)]) -> Self {
        let map = games
            .iter()
            .map(|&(name, min, max)| {
                let manifest = GameManifest {
                    name: name.into(),
                    version: "1.0.0".into(),
                    author: "dev".into(),
                    min_players: min,
                    max_players: max,
                    server_program: "game_server.py".into(),
                    client_program: "game_client.py".into(),
                };
                (manifest.game_ref(), manifest)
            })
            .collect();
        Self(map)
    }
}

impl ManifestLookup for Catalog {
    async fn manifest(&self, game: &GameRef) -> Result<GameManifest, RoomError> {
        self.0
            .get(game)
            .cloned()
            .ok_or_else(|| RoomError::GameNotFound(game.clone()))
    }
}

fn game(name: &str) -> GameRef {
    GameRef::new(name, "1.0.0")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_concurrent_starts_exactly_one_succeeds() {
    let catalog = Catalog::with(&[("Duel", 2, 2)]);
    let dir = Arc::new(RoomDirectory::new());
    let id = dir
        .create("alice", game("Duel"), Visibility::Public, &catalog)
        .await
        .unwrap();
    dir.join(id, "bob").await.unwrap();

    let a = tokio::spawn({
        let dir = Arc::clone(&dir);
        async move { dir.begin_match(id, "alice").await }
    });
    let b = tokio::spawn({
        let dir = Arc::clone(&dir);
        async move { dir.begin_match(id, "alice").await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let starting = results
        .iter()
        .filter(|r| matches!(r, Err(RoomError::AlreadyStarting(_))))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(starting, 1);
}

#[tokio::test]
async fn test_concurrent_joins_never_exceed_capacity() {
    let catalog = Catalog::with(&[("Imposter", 3, 4)]);
    let dir = Arc::new(RoomDirectory::new());
    let id = dir
        .create("host", game("Imposter"), Visibility::Public, &catalog)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let dir = Arc::clone(&dir);
        tasks.push(tokio::spawn(async move {
            dir.join(id, &format!("p{i}")).await
        }));
    }
    let mut full = 0;
    for task in tasks {
        if let Err(RoomError::RoomFull(_)) = task.await.unwrap() {
            full += 1;
        }
    }

    let summary = dir.get(id).await.unwrap();
    assert_eq!(summary.member_count, 4);
    assert_eq!(full, 7);
}

#[tokio::test]
async fn test_room_lifecycle_create_start_finish_empty() {
    let catalog = Catalog::with(&[("Duel", 2, 2)]);
    let dir = RoomDirectory::new();

    let id = dir
        .create("alice", game("Duel"), Visibility::Private, &catalog)
        .await
        .unwrap();
    dir.join(id, "bob").await.unwrap();
    assert!(matches!(dir.join(id, "carol").await, Err(RoomError::RoomFull(_))));

    let ticket = dir.begin_match(id, "alice").await.unwrap();
    assert_eq!(ticket.members, vec!["alice", "bob"]);

    // Leaving mid-match is allowed; the room stays playing.
    dir.leave(id, "alice").await.unwrap();
    let summary = dir.get(id).await.unwrap();
    assert_eq!(summary.host, "bob");
    assert_eq!(summary.status, RoomStatus::Playing);
    assert_eq!(summary.visibility, Visibility::Private);

    assert!(dir.finish_match(id).await);
    dir.leave(id, "bob").await.unwrap();
    assert!(dir.list().await.is_empty());
}

#[tokio::test]
async fn test_unknown_game_is_not_found() {
    let catalog = Catalog::with(&[("Duel", 2, 2)]);
    let dir = RoomDirectory::new();

    let result = dir
        .create("alice", game("Chess"), Visibility::Public, &catalog)
        .await;

    match result {
        Err(e @ RoomError::GameNotFound(_)) => {
            assert_eq!(e.kind(), lobbyforge_protocol::ErrorKind::NotFound);
        }
        other => panic!("expected GameNotFound, got {other:?}"),
    }
}
