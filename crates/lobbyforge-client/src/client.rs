//! The correlation client: request/response matching over one connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lobbyforge_protocol::{
    Codec, JsonCodec, Push, REQUEST_ID_FIELD, Reply, Request, request_with_id,
};
use lobbyforge_transport::{Connection, TcpConnection};
use rand::Rng;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ClientError;

/// How long a request waits for its reply before giving up.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Receiving half for pushes arriving on a client connection.
pub type Pushes = mpsc::UnboundedReceiver<Push>;

/// Outstanding requests, keyed by correlation id.
#[derive(Default)]
struct Pending {
    slots: HashMap<String, oneshot::Sender<Reply>>,
    /// Set once the receive loop has stopped. No reply can arrive after.
    closed: bool,
}

/// A lobby connection that matches replies to requests by `requestId`.
///
/// Any number of requests may be in flight at once; each caller waits only
/// for its own reply. Messages without a known correlation id that parse
/// as a [`Push`] are forwarded to the [`Pushes`] channel handed out by
/// [`connect`](Self::connect).
pub struct LobbyClient {
    conn: Arc<TcpConnection>,
    pending: Arc<Mutex<Pending>>,
    codec: JsonCodec,
    timeout: Duration,
    receiver: JoinHandle<()>,
}

impl LobbyClient {
    /// Connects to a lobby at `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<(Self, Pushes), ClientError> {
        let conn = TcpConnection::connect(addr).await?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already-open connection and starts its receive loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_connection(conn: TcpConnection) -> (Self, Pushes) {
        let conn = Arc::new(conn);
        let pending = Arc::new(Mutex::new(Pending::default()));
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&conn),
            Arc::clone(&pending),
            push_tx,
        ));

        let client = Self {
            conn,
            pending,
            codec: JsonCodec,
            timeout: REQUEST_TIMEOUT,
            receiver,
        };
        (client, push_rx)
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `request` and waits for the reply carrying its id.
    ///
    /// A failure reply (`success: false`) is still `Ok`; use
    /// [`call`](Self::call) to turn it into an error.
    ///
    /// # Errors
    /// - [`ClientError::Timeout`] if no reply arrives in time. Only this
    ///   request's pending entry is removed.
    /// - [`ClientError::Disconnected`] if the connection closes first.
    pub async fn request(&self, request: &Request) -> Result<Reply, ClientError> {
        let request_id = new_request_id();
        let value = request_with_id(request, &request_id)?;
        let bytes = self.codec.encode(&value)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(ClientError::Disconnected);
            }
            pending.slots.insert(request_id.clone(), tx);
        }

        debug!(request_id = %request_id, action = request.action(), "sending request");

        if let Err(e) = self.conn.send(&bytes).await {
            self.pending.lock().await.slots.remove(&request_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // The receive loop dropped every sender on its way out.
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => {
                self.pending.lock().await.slots.remove(&request_id);
                warn!(request_id = %request_id, action = request.action(), "request timed out");
                Err(ClientError::Timeout { request_id })
            }
        }
    }

    /// Like [`request`](Self::request), but returns the reply's `data` and
    /// maps `success: false` to [`ClientError::Rejected`].
    pub async fn call(&self, request: &Request) -> Result<Value, ClientError> {
        let reply = self.request(request).await?;
        if reply.success {
            Ok(reply.data.unwrap_or(Value::Null))
        } else {
            Err(ClientError::Rejected {
                kind: reply.kind,
                message: reply.error.unwrap_or_default(),
            })
        }
    }

    /// Number of requests still waiting for a reply.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.slots.len()
    }

    /// Closes the sending side. In-flight requests fail once the lobby
    /// closes its side.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await?;
        Ok(())
    }
}

impl Drop for LobbyClient {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

/// 16 random bytes, hex encoded.
fn new_request_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Receive loop
// ---------------------------------------------------------------------------

async fn receive_loop(
    conn: Arc<TcpConnection>,
    pending: Arc<Mutex<Pending>>,
    pushes: mpsc::UnboundedSender<Push>,
) {
    let codec = JsonCodec;
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(conn = %conn.id(), "lobby closed the connection");
                break;
            }
            Err(e) => {
                warn!(conn = %conn.id(), error = %e, "receive failed");
                break;
            }
        };

        let value: Value = match codec.decode(&data) {
            Ok(value) => value,
            Err(e) => {
                warn!(conn = %conn.id(), error = %e, "dropping undecodable message");
                continue;
            }
        };

        route(value, &pending, &pushes).await;
    }

    let mut pending = pending.lock().await;
    pending.closed = true;
    // Dropping the senders wakes every waiter with `Disconnected`.
    pending.slots.clear();
}

/// Delivers one incoming message: to its waiter, to the push channel, or
/// nowhere.
async fn route(
    value: Value,
    pending: &Mutex<Pending>,
    pushes: &mpsc::UnboundedSender<Push>,
) {
    let request_id = value
        .get(REQUEST_ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_owned);

    if let Some(request_id) = request_id {
        let slot = pending.lock().await.slots.remove(&request_id);
        let Some(slot) = slot else {
            debug!(request_id = %request_id, "dropping reply with no waiter");
            return;
        };
        match serde_json::from_value::<Reply>(value) {
            Ok(reply) => {
                // The waiter may have been cancelled.
                let _ = slot.send(reply);
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "malformed reply");
            }
        }
        return;
    }

    match serde_json::from_value::<Push>(value) {
        Ok(push) => {
            if pushes.send(push).is_err() {
                debug!("push receiver dropped; discarding push");
            }
        }
        Err(_) => debug!("dropping message with no correlation id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_id_is_32_hex_chars() {
        let id = new_request_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_new_request_id_is_unique() {
        assert_ne!(new_request_id(), new_request_id());
    }
}
