//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The framing layer moves bytes; the codec decides what those bytes mean.
//! Every Lobbyforge actor speaks UTF-8 JSON inside the frames, so
//! [`JsonCodec`] is the only implementation today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec lives inside long-running
/// connection tasks that Tokio may move between threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use lobbyforge_protocol::{Codec, JsonCodec, Push, RoomId};
///
/// let codec = JsonCodec;
/// let push = Push::GameStarting {
///     starter: "alice".into(),
///     port: 44848,
///     lobby_host: "127.0.0.1".into(),
///     room_id: RoomId(1),
/// };
///
/// let bytes = codec.encode(&push).unwrap();
/// let decoded: Push = codec.decode(&bytes).unwrap();
/// assert_eq!(push, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        // `from_slice` also rejects invalid UTF-8, which is exactly the
        // "not a JSON frame" case.
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
