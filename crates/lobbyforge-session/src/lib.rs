//! Account and session management for Lobbyforge.
//!
//! This crate handles who is allowed in and who is online:
//!
//! 1. **Accounts**: registration and password checks against the
//!    datastore ([`hash_password`], [`Identity`])
//! 2. **Sessions**: the per-role online maps ([`SessionRegistry`]), each
//!    entry bound to the connection that logged in ([`SessionBinding`])
//! 3. **Pushes**: delivering notifications to online names through their
//!    connection's outbox
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby dispatcher (above)  ← logs people in and out, pushes GAME_STARTING
//!     ↕
//! Session Layer (this crate)  ← online identities and their connections
//!     ↕
//! Datastore gateway (below)  ← account documents
//! ```

mod auth;
mod error;
mod registry;
mod session;

pub use auth::{Identity, hash_password, verify_password};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{PushReceiver, PushSender, SessionBinding, push_channel};
