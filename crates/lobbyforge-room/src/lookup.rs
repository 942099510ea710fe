//! Where the room directory gets game manifests from.

use std::future::Future;

use lobbyforge_protocol::{GameManifest, GameRef};

use crate::RoomError;

/// Resolves a published game version to its manifest.
///
/// The lobby implements this over its on-disk package library; tests use
/// a map.
pub trait ManifestLookup: Send + Sync {
    /// Returns the manifest for `game`.
    ///
    /// # Errors
    /// [`RoomError::GameNotFound`] if no such version is published,
    /// [`RoomError::Lookup`] if the lookup itself failed.
    fn manifest(
        &self,
        game: &GameRef,
    ) -> impl Future<Output = Result<GameManifest, RoomError>> + Send;
}
