//! Client side of the Lobbyforge protocol.
//!
//! [`LobbyClient`] multiplexes any number of concurrent requests over one
//! lobby connection by tagging each with a random `requestId` and routing
//! replies back to their callers. Pushes, which carry no id, come out of a
//! separate channel. [`launch_game_client`] starts the downloaded game
//! client once a match is announced.

mod client;
mod error;
mod handoff;

pub use client::{LobbyClient, Pushes, REQUEST_TIMEOUT};
pub use error::ClientError;
pub use handoff::launch_game_client;
