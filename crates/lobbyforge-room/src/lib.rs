//! Room management for Lobbyforge.
//!
//! A room gathers players around one game version until its host starts a
//! match. All rooms live in one [`RoomDirectory`] whose operations are
//! whole critical sections.
//!
//! # Key types
//!
//! - [`RoomDirectory`]: create, join, leave, list, and the start-game
//!   check-and-set ([`begin_match`](RoomDirectory::begin_match))
//! - [`ManifestLookup`]: where room capacity comes from
//! - [`MatchTicket`]: what a successful start hands to the launcher
//! - [`RoomConfig`]: capacity bounds copied from the manifest

#![allow(async_fn_in_trait)]

mod config;
mod directory;
mod error;
mod lookup;
mod room;

pub use config::RoomConfig;
pub use directory::{LeaveOutcome, MatchTicket, RoomDirectory};
pub use error::RoomError;
pub use lookup::ManifestLookup;
pub use room::Room;
