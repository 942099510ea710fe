//! TCP transport carrying chunk-framed messages.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::frame::{self, MAX_CHUNK_LEN};
use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_chunk: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            max_chunk: MAX_CHUNK_LEN,
        })
    }

    /// Overrides the per-chunk bound for every accepted connection.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream, self.max_chunk);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single TCP connection speaking the chunked framing.
///
/// Reads and writes are guarded separately: one task can sit in
/// [`recv`](Connection::recv) while others send. Sends are serialized, so
/// two messages never interleave on the wire.
pub struct TcpConnection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    max_chunk: usize,
}

impl TcpConnection {
    /// Opens an outbound connection to `addr`.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = Self::from_stream(stream, MAX_CHUNK_LEN);
        tracing::debug!(id = %conn.id, addr, "connected");
        Ok(conn)
    }

    /// Returns the remote address, if the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn from_stream(stream: TcpStream, max_chunk: usize) -> Self {
        let peer = stream.peer_addr().ok();
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            peer,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            max_chunk,
        }
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        frame::write_message(&mut *writer, data, self.max_chunk).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        frame::read_message(&mut *reader, self.max_chunk).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
