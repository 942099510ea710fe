//! The lobby's shared state and its whole-operation methods.
//!
//! Every connection task holds an `Arc<Lobby<D>>` and calls one method per
//! request. Each registry guards itself; no method holds one registry's lock
//! while waiting on another component.

use std::collections::BTreeMap;
use std::sync::Arc;

use lobbyforge_launcher::{LaunchRequest, MatchCompletion, MatchExit, MatchLauncher};
use lobbyforge_protocol::{
    GameManifest, GamePackage, GameRef, GameStarted, ProtocolError, Push, Role,
    RoomCreated, RoomId, RoomSummary, Visibility,
};
use lobbyforge_room::{LeaveOutcome, MatchTicket, RoomDirectory};
use lobbyforge_session::{SessionBinding, SessionRegistry};
use lobbyforge_store::{Datastore, GAME};
use lobbyforge_transport::ConnectionId;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{GameLibrary, LibraryError, LobbyConfig, LobbyError, MatchEntry, MatchRegistry};

/// Everything the lobby knows, shared by all connection tasks.
pub struct Lobby<D: Datastore> {
    store: D,
    sessions: SessionRegistry,
    rooms: Arc<RoomDirectory>,
    matches: Arc<MatchRegistry>,
    library: GameLibrary,
    launcher: MatchLauncher,
    public_host: String,
}

impl<D: Datastore> Lobby<D> {
    pub fn new(config: &LobbyConfig, store: D) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            rooms: Arc::new(RoomDirectory::new()),
            matches: Arc::new(MatchRegistry::new()),
            library: GameLibrary::new(config.games_dir.clone()),
            launcher: MatchLauncher::new(config.launcher.clone()),
            public_host: config.public_host.clone(),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    pub fn matches(&self) -> &MatchRegistry {
        &self.matches
    }

    pub fn library(&self) -> &GameLibrary {
        &self.library
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub async fn register(
        &self,
        name: &str,
        password: &str,
        role: Role,
    ) -> Result<Value, LobbyError> {
        let identity = self
            .sessions
            .register(&self.store, name, role, password)
            .await?;
        Ok(identity.public_view())
    }

    pub async fn login(
        &self,
        name: &str,
        password: &str,
        role: Role,
        binding: SessionBinding,
    ) -> Result<Value, LobbyError> {
        let identity = self
            .sessions
            .login(&self.store, name, role, password, binding)
            .await?;
        Ok(identity.public_view())
    }

    pub async fn logout(&self, name: &str, role: Role) -> Result<(), LobbyError> {
        self.sessions.logout(name, role).await?;
        Ok(())
    }

    /// Ends every session bound to `conn`. Room membership is kept; a
    /// player who reconnects finds their rooms as they left them.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let ended = self.sessions.disconnect(conn).await;
        if !ended.is_empty() {
            debug!(%conn, sessions = ended.len(), "connection sessions cleaned up");
        }
    }

    pub async fn list_players(&self) -> Vec<String> {
        self.sessions.online(Role::Player).await
    }

    // -----------------------------------------------------------------------
    // Game packages
    // -----------------------------------------------------------------------

    /// Publishes a new game version authored by `developer`.
    ///
    /// Installs the files, then records the `Game` document. If the record
    /// can't be written the installed files are removed again.
    pub async fn upload_game(
        &self,
        developer: &str,
        mut manifest: GameManifest,
        files: &BTreeMap<String, String>,
    ) -> Result<Value, LobbyError> {
        manifest.validate().map_err(LobbyError::BadRequest)?;
        let game = manifest.game_ref();

        if !self.game_documents(&game).await?.is_empty() {
            return Err(LibraryError::AlreadyExists(game).into());
        }

        manifest.author = developer.to_string();
        self.library.install(&manifest, files).await?;

        let document = serde_json::to_value(&manifest).map_err(ProtocolError::Encode)?;
        match self.store.create(GAME, document).await {
            Ok(record) => {
                info!(%game, developer, "game published");
                Ok(record)
            }
            Err(e) => {
                warn!(%game, error = %e, "recording game failed, removing files");
                if let Err(cleanup) = self.library.remove(&game).await {
                    warn!(%game, error = %cleanup, "removing files failed");
                }
                Err(e.into())
            }
        }
    }

    /// Replaces the program files of a version `developer` published.
    pub async fn update_game(
        &self,
        developer: &str,
        manifest: &GameManifest,
        files: &BTreeMap<String, String>,
    ) -> Result<(), LobbyError> {
        let game = manifest.game_ref();
        let documents = self.game_documents(&game).await?;
        let Some(record) = documents.first() else {
            return Err(LobbyError::GameNotFound(game));
        };

        if record.get("author").and_then(Value::as_str) != Some(developer) {
            return Err(LobbyError::NotAuthor {
                developer: developer.to_string(),
                game,
            });
        }

        self.library.overwrite(&game, files).await?;
        info!(%game, developer, "game updated");
        Ok(())
    }

    /// Deletes a version's record and files.
    pub async fn remove_game(&self, game: &GameRef) -> Result<(), LobbyError> {
        let deleted = self
            .store
            .delete(GAME, json!({ "name": game.name, "version": game.version }))
            .await?;
        let removed = self.library.remove(game).await?;

        if deleted.is_empty() && !removed {
            return Err(LobbyError::GameNotFound(game.clone()));
        }
        info!(%game, records = deleted.len(), files = removed, "game removed");
        Ok(())
    }

    /// Published games, optionally only those by `author`.
    pub async fn list_games(&self, author: Option<&str>) -> Result<Vec<Value>, LobbyError> {
        let filter = match author {
            Some(author) => json!({ "author": author }),
            None => json!({}),
        };
        Ok(self.store.query(GAME, filter).await?)
    }

    pub async fn download_game(&self, game: &GameRef) -> Result<GamePackage, LobbyError> {
        Ok(self.library.package(game).await?)
    }

    async fn game_documents(&self, game: &GameRef) -> Result<Vec<Value>, LobbyError> {
        Ok(self
            .store
            .query(GAME, json!({ "name": game.name, "version": game.version }))
            .await?)
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    pub async fn create_room(
        &self,
        host: &str,
        game: GameRef,
        visibility: Visibility,
    ) -> Result<RoomCreated, LobbyError> {
        let room_id = self
            .rooms
            .create(host, game, visibility, &self.library)
            .await?;
        Ok(RoomCreated { room_id })
    }

    pub async fn join_room(&self, room_id: RoomId, player: &str) -> Result<(), LobbyError> {
        self.rooms.join(room_id, player).await?;
        Ok(())
    }

    pub async fn leave_room(
        &self,
        room_id: RoomId,
        player: &str,
    ) -> Result<LeaveOutcome, LobbyError> {
        Ok(self.rooms.leave(room_id, player).await?)
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        self.rooms.list().await
    }

    // -----------------------------------------------------------------------
    // Matches
    // -----------------------------------------------------------------------

    /// Starts `room_id`'s match on behalf of `requester`.
    ///
    /// The room is `playing` once the directory's check-and-set succeeds.
    /// If the launch then fails the room goes straight back to `idle` and
    /// the error is returned. On success every online member gets
    /// `GAME_STARTING`, and a reaper task returns the room to `idle` when
    /// the process exits.
    pub async fn start_game(
        &self,
        room_id: RoomId,
        requester: &str,
    ) -> Result<GameStarted, LobbyError> {
        let ticket = self.rooms.begin_match(room_id, requester).await?;

        let (entry, completion) = match self.launch(&ticket).await {
            Ok(launched) => launched,
            Err(e) => {
                warn!(%room_id, error = %e, "match launch failed, room back to idle");
                self.rooms.finish_match(room_id).await;
                return Err(e);
            }
        };
        let port = entry.port;
        self.matches.insert(entry).await;

        let rooms = Arc::clone(&self.rooms);
        let matches = Arc::clone(&self.matches);
        tokio::spawn(async move {
            let exit = completion.wait().await;
            reap(&rooms, &matches, room_id, exit).await;
        });

        let push = Push::GameStarting {
            starter: requester.to_string(),
            port,
            lobby_host: self.public_host.clone(),
            room_id,
        };
        let notified = self
            .sessions
            .push(Role::Player, &ticket.members, &push)
            .await;
        info!(%room_id, port, notified, members = ticket.members.len(), "game starting");

        Ok(GameStarted {
            port,
            lobby_host: self.public_host.clone(),
        })
    }

    async fn launch(
        &self,
        ticket: &MatchTicket,
    ) -> Result<(MatchEntry, MatchCompletion), LobbyError> {
        let manifest = self
            .library
            .manifest(&ticket.game)
            .await
            .map_err(|e| match e {
                LibraryError::NotFound(game) => LobbyError::GameNotFound(game),
                other => other.into(),
            })?;
        let install_dir = self.library.install_dir(&ticket.game)?;

        let (running, completion) = self.launcher.launch(LaunchRequest {
            room_id: ticket.room_id,
            install_dir,
            program: manifest.server_program,
            players: ticket.members.len(),
        })?;

        let entry = MatchEntry::new(running, ticket.game.clone(), ticket.members.clone());
        Ok((entry, completion))
    }
}

/// Runs once a match process has exited, whatever its exit code.
async fn reap(rooms: &RoomDirectory, matches: &MatchRegistry, room_id: RoomId, exit: MatchExit) {
    matches.remove(room_id, &exit).await;
    if !rooms.finish_match(room_id).await {
        debug!(%room_id, "room closed while its match was running");
    }
}
