//! The on-disk game package library.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<name>/<version>/game_config.json
//! <root>/<name>/<version>/<program files...>
//! ```
//!
//! Files travel inside JSON messages as base64 strings keyed by their path
//! relative to the version directory.

use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lobbyforge_protocol::{GameManifest, GamePackage, GameRef};
use lobbyforge_room::{ManifestLookup, RoomError};
use tracing::{debug, info, warn};

use crate::LibraryError;

/// Name of the manifest file inside a version directory.
pub const MANIFEST_FILE: &str = "game_config.json";

/// Installed game packages, one directory per (name, version).
#[derive(Debug, Clone)]
pub struct GameLibrary {
    root: PathBuf,
}

impl GameLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory `game` is (or would be) installed in.
    ///
    /// # Errors
    /// [`LibraryError::BadPath`] unless name and version are each a single
    /// plain path component.
    pub fn install_dir(&self, game: &GameRef) -> Result<PathBuf, LibraryError> {
        for part in [&game.name, &game.version] {
            let mut components = Path::new(part.as_str()).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => {}
                _ => return Err(LibraryError::BadPath(part.clone())),
            }
        }
        Ok(self.root.join(&game.name).join(&game.version))
    }

    /// Reads the installed manifest for `game`.
    pub async fn manifest(&self, game: &GameRef) -> Result<GameManifest, LibraryError> {
        let path = self.install_dir(game)?.join(MANIFEST_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(LibraryError::NotFound(game.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(LibraryError::Manifest)
    }

    /// Installs a new version: decodes `files` into its directory and
    /// writes `game_config.json` from `manifest`.
    ///
    /// A `game_config.json` among `files` is ignored; the manifest always
    /// wins. Nothing is written unless every file decodes.
    ///
    /// # Errors
    /// [`LibraryError::AlreadyExists`] if the version directory exists,
    /// [`LibraryError::BadPath`] or [`LibraryError::BadEncoding`] for a bad
    /// file entry.
    pub async fn install(
        &self,
        manifest: &GameManifest,
        files: &BTreeMap<String, String>,
    ) -> Result<PathBuf, LibraryError> {
        let game = manifest.game_ref();
        let dir = self.install_dir(&game)?;
        let decoded = decode_files(files)?;

        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // The non-recursive create is the claim: one installer wins per version.
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                return Err(LibraryError::AlreadyExists(game));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = populate(&dir, manifest, &decoded).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                warn!(%game, error = %cleanup, "removing partial install failed");
            }
            return Err(e);
        }

        info!(%game, files = decoded.len(), "package installed");
        Ok(dir)
    }

    /// Replaces program files of an installed version. The manifest is
    /// left as published.
    ///
    /// # Errors
    /// [`LibraryError::NotFound`] if the version is not installed.
    pub async fn overwrite(
        &self,
        game: &GameRef,
        files: &BTreeMap<String, String>,
    ) -> Result<(), LibraryError> {
        let dir = self.install_dir(game)?;
        let decoded = decode_files(files)?;

        if !tokio::fs::try_exists(dir.join(MANIFEST_FILE)).await? {
            return Err(LibraryError::NotFound(game.clone()));
        }
        write_files(&dir, &decoded).await?;

        info!(%game, files = decoded.len(), "package files updated");
        Ok(())
    }

    /// The manifest plus every installed file except the server program,
    /// base64-encoded.
    pub async fn package(&self, game: &GameRef) -> Result<GamePackage, LibraryError> {
        let manifest = self.manifest(game).await?;
        let dir = self.install_dir(game)?;

        let mut files = BTreeMap::new();
        let mut pending = vec![dir.clone()];
        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(key) = relative_key(&dir, &path) else {
                    continue;
                };
                if key == manifest.server_program {
                    continue;
                }
                let bytes = tokio::fs::read(&path).await?;
                files.insert(key, STANDARD.encode(bytes));
            }
        }

        debug!(%game, files = files.len(), "package built");
        Ok(GamePackage { manifest, files })
    }

    /// Deletes an installed version. Returns `false` if it wasn't there.
    pub async fn remove(&self, game: &GameRef) -> Result<bool, LibraryError> {
        let dir = self.install_dir(game)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        // Drop the game's directory too once its last version is gone.
        if let Some(parent) = dir.parent() {
            let _ = tokio::fs::remove_dir(parent).await;
        }
        info!(%game, "package removed");
        Ok(true)
    }
}

impl ManifestLookup for GameLibrary {
    async fn manifest(&self, game: &GameRef) -> Result<GameManifest, RoomError> {
        GameLibrary::manifest(self, game).await.map_err(|e| match e {
            LibraryError::NotFound(game) => RoomError::GameNotFound(game),
            other => RoomError::Lookup(other.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Validates and decodes every entry up front.
fn decode_files(
    files: &BTreeMap<String, String>,
) -> Result<Vec<(PathBuf, Vec<u8>)>, LibraryError> {
    let mut decoded = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = safe_relative(name)?;
        if path == Path::new(MANIFEST_FILE) {
            debug!(file = %name, "skipping uploaded manifest file");
            continue;
        }
        let bytes = STANDARD
            .decode(content)
            .map_err(|source| LibraryError::BadEncoding {
                file: name.clone(),
                source,
            })?;
        decoded.push((path, bytes));
    }
    Ok(decoded)
}

/// Writes the program files, then the manifest.
async fn populate(
    dir: &Path,
    manifest: &GameManifest,
    files: &[(PathBuf, Vec<u8>)],
) -> Result<(), LibraryError> {
    write_files(dir, files).await?;
    let config = serde_json::to_vec_pretty(manifest).map_err(LibraryError::Manifest)?;
    tokio::fs::write(dir.join(MANIFEST_FILE), config).await?;
    Ok(())
}

async fn write_files(dir: &Path, files: &[(PathBuf, Vec<u8>)]) -> Result<(), LibraryError> {
    for (relative, bytes) in files {
        let target = dir.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
    }
    Ok(())
}

/// Accepts only relative paths made of plain components.
fn safe_relative(name: &str) -> Result<PathBuf, LibraryError> {
    let path = Path::new(name);
    let plain = path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(path.to_path_buf())
    } else {
        Err(LibraryError::BadPath(name.to_string()))
    }
}

/// `path` relative to `dir`, with `/` separators.
fn relative_key(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> GameManifest {
        GameManifest {
            name: "Duel".into(),
            version: "1.0.0".into(),
            author: "dev".into(),
            min_players: 2,
            max_players: 2,
            server_program: "game_server.py".into(),
            client_program: "game_client.py".into(),
        }
    }

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, body)| (name.to_string(), STANDARD.encode(body)))
            .collect()
    }

    #[test]
    fn test_safe_relative_rejects_escapes() {
        assert!(safe_relative("game_client.py").is_ok());
        assert!(safe_relative("assets/board.txt").is_ok());
        assert!(safe_relative("../evil.py").is_err());
        assert!(safe_relative("assets/../../evil.py").is_err());
        assert!(safe_relative("/etc/passwd").is_err());
        assert!(safe_relative("").is_err());
    }

    #[test]
    fn test_install_dir_rejects_nested_names() {
        let library = GameLibrary::new("/srv/games");
        assert!(library.install_dir(&GameRef::new("Duel", "1.0.0")).is_ok());
        assert!(library.install_dir(&GameRef::new("..", "1.0.0")).is_err());
        assert!(library.install_dir(&GameRef::new("Duel", "a/b")).is_err());
    }

    #[tokio::test]
    async fn test_install_then_read_manifest() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());

        let dir = library
            .install(&manifest(), &files(&[("game_server.py", "print(1)")]))
            .await
            .unwrap();

        assert_eq!(dir, root.path().join("Duel").join("1.0.0"));
        assert_eq!(
            library.manifest(&GameRef::new("Duel", "1.0.0")).await.unwrap(),
            manifest()
        );
        assert_eq!(
            std::fs::read_to_string(dir.join("game_server.py")).unwrap(),
            "print(1)"
        );
    }

    #[tokio::test]
    async fn test_install_twice_is_already_exists() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());

        library.install(&manifest(), &BTreeMap::new()).await.unwrap();
        let second = library.install(&manifest(), &BTreeMap::new()).await;

        assert!(matches!(second, Err(LibraryError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_install_concurrent_same_version_has_one_winner() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());
        let mut wider = manifest();
        wider.max_players = 4;
        let program = files(&[("game_server.py", "print(1)")]);

        let narrow = manifest();
        let (a, b) = tokio::join!(
            library.install(&narrow, &program),
            library.install(&wider, &program),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1, "{outcomes:?}");
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(LibraryError::AlreadyExists(_))))
        );

        let winner = if outcomes[0].is_ok() { manifest() } else { wider };
        assert_eq!(
            library.manifest(&GameRef::new("Duel", "1.0.0")).await.unwrap(),
            winner
        );
    }

    #[tokio::test]
    async fn test_install_bad_base64_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());
        let mut bad = BTreeMap::new();
        bad.insert("game_server.py".to_string(), "***".to_string());

        let result = library.install(&manifest(), &bad).await;

        assert!(matches!(result, Err(LibraryError::BadEncoding { .. })));
        assert!(!root.path().join("Duel").exists());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_manifest() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());
        let game = GameRef::new("Duel", "1.0.0");
        library
            .install(&manifest(), &files(&[("game_client.py", "v1")]))
            .await
            .unwrap();

        library
            .overwrite(
                &game,
                &files(&[("game_client.py", "v2"), (MANIFEST_FILE, "{}")]),
            )
            .await
            .unwrap();

        let package = library.package(&game).await.unwrap();
        assert_eq!(package.manifest, manifest());
        assert_eq!(package.files["game_client.py"], STANDARD.encode("v2"));
    }

    #[tokio::test]
    async fn test_overwrite_missing_version_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());

        let result = library
            .overwrite(&GameRef::new("Duel", "9.9.9"), &BTreeMap::new())
            .await;

        assert!(matches!(result, Err(LibraryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_package_omits_server_program() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());
        library
            .install(
                &manifest(),
                &files(&[
                    ("game_server.py", "server"),
                    ("game_client.py", "client"),
                    ("assets/board.txt", "board"),
                ]),
            )
            .await
            .unwrap();

        let package = library
            .package(&GameRef::new("Duel", "1.0.0"))
            .await
            .unwrap();

        assert!(!package.files.contains_key("game_server.py"));
        assert_eq!(package.files["game_client.py"], STANDARD.encode("client"));
        assert_eq!(package.files["assets/board.txt"], STANDARD.encode("board"));
        assert!(package.files.contains_key(MANIFEST_FILE));
    }

    #[tokio::test]
    async fn test_remove_deletes_version() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());
        let game = GameRef::new("Duel", "1.0.0");
        library.install(&manifest(), &BTreeMap::new()).await.unwrap();

        assert!(library.remove(&game).await.unwrap());
        assert!(!library.remove(&game).await.unwrap());
        assert!(matches!(
            library.manifest(&game).await,
            Err(LibraryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_manifest_lookup_maps_missing_to_game_not_found() {
        let root = tempfile::tempdir().unwrap();
        let library = GameLibrary::new(root.path());

        let result =
            ManifestLookup::manifest(&library, &GameRef::new("Nope", "1.0.0")).await;

        assert!(matches!(result, Err(RoomError::GameNotFound(_))));
    }
}
