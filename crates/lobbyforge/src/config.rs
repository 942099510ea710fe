//! Lobby and store process configuration.
//!
//! Both binaries read their settings from `LOBBYFORGE_*` environment
//! variables on top of the defaults below. Library users build the structs
//! directly or go through [`LobbyServer::builder`](crate::LobbyServer::builder).

use std::path::PathBuf;
use std::str::FromStr;

use lobbyforge_launcher::{DEFAULT_FIRST_PORT, LauncherConfig};

use crate::LobbyError;

pub const DEFAULT_LOBBY_BIND: &str = "0.0.0.0:26969";
pub const DEFAULT_STORE_ADDR: &str = "127.0.0.1:21212";
pub const DEFAULT_GAMES_DIR: &str = "games";
pub const DEFAULT_SNAPSHOT_FILE: &str = "lobbyforge-store.json";

/// Settings for the lobby process.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Address the lobby listens on.
    pub bind_addr: String,
    /// Host players are told to connect to for a match (`lobbyHost`).
    pub public_host: String,
    /// Where the document store process listens.
    pub store_addr: String,
    /// Root of the installed package tree.
    pub games_dir: PathBuf,
    pub launcher: LauncherConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_LOBBY_BIND.to_string(),
            public_host: "127.0.0.1".to_string(),
            store_addr: DEFAULT_STORE_ADDR.to_string(),
            games_dir: PathBuf::from(DEFAULT_GAMES_DIR),
            launcher: LauncherConfig::default(),
        }
    }
}

impl LobbyConfig {
    /// Reads `LOBBYFORGE_BIND`, `LOBBYFORGE_PUBLIC_HOST`,
    /// `LOBBYFORGE_STORE_ADDR`, `LOBBYFORGE_GAMES_DIR`,
    /// `LOBBYFORGE_FIRST_MATCH_PORT` and `LOBBYFORGE_INTERPRETER`.
    ///
    /// An empty `LOBBYFORGE_INTERPRETER` runs game programs directly.
    pub fn from_env() -> Result<Self, LobbyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LobbyError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("LOBBYFORGE_BIND") {
            config.bind_addr = bind;
        }
        if let Some(host) = lookup("LOBBYFORGE_PUBLIC_HOST") {
            config.public_host = host;
        }
        if let Some(addr) = lookup("LOBBYFORGE_STORE_ADDR") {
            config.store_addr = addr;
        }
        if let Some(dir) = lookup("LOBBYFORGE_GAMES_DIR") {
            config.games_dir = PathBuf::from(dir);
        }
        config.launcher.first_port =
            parse_var(&lookup, "LOBBYFORGE_FIRST_MATCH_PORT")?.unwrap_or(DEFAULT_FIRST_PORT);
        if let Some(interpreter) = lookup("LOBBYFORGE_INTERPRETER") {
            config.launcher.interpreter = match interpreter.trim() {
                "" => None,
                path => Some(PathBuf::from(path)),
            };
        }

        Ok(config)
    }
}

/// Settings for the document store process.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub bind_addr: String,
    /// Snapshot file rewritten after every mutation.
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_STORE_ADDR.to_string(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
        }
    }
}

impl StoreConfig {
    /// Reads `LOBBYFORGE_STORE_BIND` and `LOBBYFORGE_STORE_FILE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(bind) = lookup("LOBBYFORGE_STORE_BIND") {
            config.bind_addr = bind;
        }
        if let Some(file) = lookup("LOBBYFORGE_STORE_FILE") {
            config.snapshot_path = PathBuf::from(file);
        }
        config
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, LobbyError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| LobbyError::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}
