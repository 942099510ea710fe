//! What a live session is bound to.

use lobbyforge_protocol::Push;
use lobbyforge_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending half of a connection's push outbox.
///
/// The connection's writer task owns the receiving half and forwards every
/// push onto the wire, interleaved safely with replies.
pub type PushSender = mpsc::UnboundedSender<Push>;

/// Receiving half of a connection's push outbox.
pub type PushReceiver = mpsc::UnboundedReceiver<Push>;

/// Creates a fresh push outbox for one connection.
pub fn push_channel() -> (PushSender, PushReceiver) {
    mpsc::unbounded_channel()
}

/// The connection an online identity was logged in from.
#[derive(Debug, Clone)]
pub struct SessionBinding {
    /// The connection that performed the login. Only that connection's
    /// disconnect ends the session.
    pub conn: ConnectionId,
    outbox: PushSender,
}

impl SessionBinding {
    pub fn new(conn: ConnectionId, outbox: PushSender) -> Self {
        Self { conn, outbox }
    }

    /// Queues `push` for this connection. Returns `false` if the
    /// connection's writer is already gone.
    pub fn deliver(&self, push: Push) -> bool {
        self.outbox.send(push).is_ok()
    }
}
