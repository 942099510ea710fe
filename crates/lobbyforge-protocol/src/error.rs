//! Error types for the protocol layer.
//!
//! Each crate in Lobbyforge defines its own error enum. When you see a
//! `ProtocolError`, the problem is in how a message was encoded or what
//! shape it had, not in networking or lobby state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization of raw bytes failed.
    ///
    /// The frame was not UTF-8 JSON at all. The peer is broken, so the
    /// connection that produced it gets closed.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is JSON but not a valid message envelope.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The `action` field names an action nobody handles.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A known action arrived with missing or mistyped fields.
    #[error("bad request for {action}: {reason}")]
    BadRequest { action: String, reason: String },
}

impl ProtocolError {
    /// Returns `true` if the connection that produced this error must be
    /// closed instead of answered.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::Decode(_))
    }
}
