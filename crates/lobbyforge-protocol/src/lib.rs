//! Wire protocol for Lobbyforge.
//!
//! This crate defines the "language" every actor speaks inside the frames
//! produced by `lobbyforge-transport`:
//!
//! - **Types** ([`RoomId`], [`Role`], [`GameManifest`], [`RoomSummary`], ...):
//!   the records that appear inside messages.
//! - **Messages** ([`Request`], [`Push`], [`Reply`]): the tagged unions
//!   decoded once at the connection boundary.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`], [`ErrorKind`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Request / Reply / Push) → Lobby dispatcher
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{
    ErrorKind, GamePackage, GameStarted, IncomingRequest, Push, REQUEST_ID_FIELD,
    Reply, Request, RoomCreated, request_with_id,
};
pub use types::{
    GameManifest, GameRef, Role, RoomId, RoomStatus, RoomSummary, Visibility,
};
