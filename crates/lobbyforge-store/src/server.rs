//! The store process's accept loop.
//!
//! Each connection carries framed [`StoreRequest`]s and gets one
//! [`Reply`] per request. The gateway closes after its single reply, but
//! the loop serves until the peer goes away.

use std::sync::Arc;

use lobbyforge_protocol::{Codec, ErrorKind, JsonCodec, Reply};
use lobbyforge_transport::{Connection, TcpConnection, TcpTransport, Transport};
use serde_json::Value;

use crate::{Datastore, DocumentStore, StoreError, StoreRequest};

/// Serves a [`DocumentStore`] over TCP.
pub struct StoreServer {
    transport: TcpTransport,
    store: Arc<DocumentStore>,
}

impl StoreServer {
    /// Binds the listener.
    pub async fn bind(
        addr: &str,
        store: Arc<DocumentStore>,
    ) -> Result<Self, StoreError> {
        let transport = TcpTransport::bind(addr).await?;
        Ok(Self { transport, store })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(mut self) -> Result<(), StoreError> {
        tracing::info!("datastore running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        if let Err(e) = serve(conn, store).await {
                            tracing::debug!(
                                error = %e,
                                "datastore connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn serve(
    conn: TcpConnection,
    store: Arc<DocumentStore>,
) -> Result<(), StoreError> {
    let codec = JsonCodec;
    let conn_id = conn.id();

    while let Some(data) = conn.recv().await? {
        // Not JSON at all: the peer is not speaking our protocol.
        let value: Value = codec.decode(&data)?;

        let reply = match serde_json::from_value::<StoreRequest>(value) {
            Ok(request) => {
                tracing::debug!(
                    %conn_id,
                    collection = %request.collection,
                    action = ?request.action,
                    "datastore request"
                );
                match store.execute(request).await {
                    Ok(data) => Reply::ok(data),
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "datastore request failed");
                        Reply::failure(e.kind(), e.to_string())
                    }
                }
            }
            Err(e) => Reply::failure(
                ErrorKind::BadRequest,
                format!("malformed datastore request: {e}"),
            ),
        };

        conn.send(&codec.encode(&reply)?).await?;
    }

    tracing::debug!(%conn_id, "datastore connection closed");
    Ok(())
}
