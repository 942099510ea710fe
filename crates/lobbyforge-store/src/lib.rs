//! Document storage for Lobbyforge.
//!
//! - [`Datastore`]: the trait the lobby talks to.
//! - [`StoreClient`]: a [`Datastore`] that reaches the store process with
//!   one framed request per connection.
//! - [`DocumentStore`]: the store itself, one auto-increment document map
//!   per collection, optionally persisted to a JSON snapshot.
//! - [`StoreServer`]: the accept loop that serves a [`DocumentStore`].
//!
//! ```text
//! Lobby ──StoreClient──▶ TCP ──▶ StoreServer ──▶ DocumentStore ──▶ database.json
//! ```

mod document;
mod error;
mod gateway;
mod request;
mod server;

pub use document::DocumentStore;
pub use error::StoreError;
pub use gateway::{Datastore, StoreClient};
pub use request::{
    COLLECTIONS, DEVELOPER, GAME, PLAYER, StoreAction, StoreRequest,
};
pub use server::StoreServer;
