//! The session registry: who is online, per role, and on which connection.
//!
//! Players and developers are tracked in two independent maps, each behind
//! its own lock. A name appears at most once per map, so an identity can
//! only be logged in from one connection at a time.
//!
//! ```text
//! register() ──→ [account in datastore]
//!                       │
//!                       ▼
//!                   login() ──→ [online: name → binding] ──→ logout()
//!                                          │
//!                                          └──(connection ends)──→ disconnect()
//! ```

use std::collections::HashMap;

use lobbyforge_protocol::{Push, Role};
use lobbyforge_store::Datastore;
use lobbyforge_transport::ConnectionId;
use serde_json::json;
use tokio::sync::Mutex;

use crate::auth::{Identity, hash_password, verify_password};
use crate::{SessionBinding, SessionError};

type OnlineMap = HashMap<String, SessionBinding>;

/// Tracks every online identity.
///
/// All methods take `&self`; the maps are locked internally and never held
/// across a datastore call.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    players: Mutex<OnlineMap>,
    developers: Mutex<OnlineMap>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn online_map(&self, role: Role) -> &Mutex<OnlineMap> {
        match role {
            Role::Player => &self.players,
            Role::Developer => &self.developers,
        }
    }

    /// Creates an account in the role's collection.
    ///
    /// # Errors
    /// - [`SessionError::InvalidInput`] if name or password is blank
    /// - [`SessionError::AlreadyExists`] if the name is taken for this role
    pub async fn register<D: Datastore>(
        &self,
        store: &D,
        name: &str,
        role: Role,
        password: &str,
    ) -> Result<Identity, SessionError> {
        validate(name, password)?;

        let existing = store
            .query(role.collection(), json!({ "userName": name }))
            .await?;
        if !existing.is_empty() {
            return Err(SessionError::AlreadyExists(name.to_string()));
        }

        let doc = store
            .create(
                role.collection(),
                json!({
                    "userName": name,
                    "passwordHash": hash_password(password),
                }),
            )
            .await?;
        let identity = Identity::from_document(doc)?;

        tracing::info!(user = name, %role, id = identity.id, "account registered");
        Ok(identity)
    }

    /// Logs `name` in and binds its session to `binding`.
    ///
    /// The online check runs twice: once up front to skip the datastore
    /// round trip, and again at insert time since another connection may
    /// have logged in while we were waiting on the store.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyOnline`] if `name` already has a session
    /// - [`SessionError::NotFound`] if no such account exists
    /// - [`SessionError::BadCredentials`] if the password is wrong
    pub async fn login<D: Datastore>(
        &self,
        store: &D,
        name: &str,
        role: Role,
        password: &str,
        binding: SessionBinding,
    ) -> Result<Identity, SessionError> {
        if self.is_online(role, name).await {
            return Err(already_online(name, role));
        }

        let identity = store
            .query(role.collection(), json!({ "userName": name }))
            .await?
            .into_iter()
            .next()
            .map(Identity::from_document)
            .transpose()?
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;

        if !verify_password(password, &identity.password_hash) {
            tracing::debug!(user = name, %role, "login rejected: bad password");
            return Err(SessionError::BadCredentials);
        }

        let conn = binding.conn;
        {
            let mut online = self.online_map(role).lock().await;
            if online.contains_key(name) {
                return Err(already_online(name, role));
            }
            online.insert(name.to_string(), binding);
        }

        tracing::info!(user = name, %role, %conn, "logged in");
        Ok(identity)
    }

    /// Ends `name`'s session.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if `name` was not online.
    pub async fn logout(
        &self,
        name: &str,
        role: Role,
    ) -> Result<(), SessionError> {
        let removed = self.online_map(role).lock().await.remove(name);
        match removed {
            Some(binding) => {
                tracing::info!(user = name, %role, conn = %binding.conn, "logged out");
                Ok(())
            }
            None => Err(SessionError::NotFound(name.to_string())),
        }
    }

    /// Removes every session bound to `conn`, in both roles.
    ///
    /// Called when a connection's serving loop ends. Sessions logged in
    /// from other connections are untouched. Returns what was removed.
    pub async fn disconnect(&self, conn: ConnectionId) -> Vec<(Role, String)> {
        let mut removed = Vec::new();
        for role in [Role::Player, Role::Developer] {
            let mut online = self.online_map(role).lock().await;
            online.retain(|name, binding| {
                if binding.conn == conn {
                    removed.push((role, name.clone()));
                    false
                } else {
                    true
                }
            });
        }

        for (role, name) in &removed {
            tracing::info!(user = %name, %role, %conn, "session ended by disconnect");
        }
        removed
    }

    /// Returns `true` if `name` has a live session for `role`.
    pub async fn is_online(&self, role: Role, name: &str) -> bool {
        self.online_map(role).lock().await.contains_key(name)
    }

    /// Online names for `role`, sorted.
    pub async fn online(&self, role: Role) -> Vec<String> {
        let mut names: Vec<String> =
            self.online_map(role).lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Queues `push` for every name in `names` that is still online.
    ///
    /// Returns how many sessions it was delivered to. Offline names are
    /// skipped silently; a failed hand-off is logged.
    pub async fn push(&self, role: Role, names: &[String], push: &Push) -> usize {
        let online = self.online_map(role).lock().await;
        let mut delivered = 0;

        for name in names {
            let Some(binding) = online.get(name) else {
                continue;
            };
            if binding.deliver(push.clone()) {
                delivered += 1;
            } else {
                tracing::warn!(user = %name, conn = %binding.conn, "push outbox closed");
            }
        }
        delivered
    }
}

fn validate(name: &str, password: &str) -> Result<(), SessionError> {
    if name.trim().is_empty() {
        return Err(SessionError::InvalidInput("name is empty".into()));
    }
    if password.is_empty() {
        return Err(SessionError::InvalidInput("password is empty".into()));
    }
    Ok(())
}

fn already_online(name: &str, role: Role) -> SessionError {
    SessionError::AlreadyOnline {
        name: name.to_string(),
        role,
    }
}

// =========================================================================
// Tests
// =========================================================================
