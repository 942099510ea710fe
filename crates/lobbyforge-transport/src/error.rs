/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding, connecting or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A chunk header declared more bytes than the framing bound allows.
    ///
    /// This is a protocol violation: the peer is either broken or hostile,
    /// so the connection must be closed.
    #[error("chunk length {len} exceeds bound {max}")]
    OversizedChunk { len: usize, max: usize },

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns `true` for errors that mean the peer broke the framing rules.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::OversizedChunk { .. })
    }
}
