//! The datastore seam and its remote client.
//!
//! Everything above this crate talks to storage through the [`Datastore`]
//! trait. In production that is a [`StoreClient`] reaching a separate store
//! process; in tests it is usually an in-process
//! [`DocumentStore`](crate::DocumentStore).

use std::future::Future;

use lobbyforge_protocol::{Codec, JsonCodec, Reply};
use lobbyforge_transport::{Connection, TcpConnection};
use serde_json::Value;

use crate::{StoreError, StoreRequest};

/// Executes document-store requests.
///
/// Implementors provide [`execute`](Self::execute); the helpers wrap the
/// three request shapes. The returned futures are `Send` so callers can
/// hold a `Datastore` inside spawned connection tasks.
pub trait Datastore: Send + Sync + 'static {
    /// Runs one request and returns the store's `data` payload.
    fn execute(
        &self,
        request: StoreRequest,
    ) -> impl Future<Output = Result<Value, StoreError>> + Send;

    /// Inserts `document`, returning it with its assigned `id`.
    fn create(
        &self,
        collection: &str,
        document: Value,
    ) -> impl Future<Output = Result<Value, StoreError>> + Send {
        self.execute(StoreRequest::create(collection, document))
    }

    /// Returns every document matching `filter`.
    fn query(
        &self,
        collection: &str,
        filter: Value,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send {
        let pending = self.execute(StoreRequest::query(collection, filter));
        async move { into_documents(pending.await?) }
    }

    /// Removes and returns every document matching `filter`.
    fn delete(
        &self,
        collection: &str,
        filter: Value,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send {
        let pending = self.execute(StoreRequest::delete(collection, filter));
        async move { into_documents(pending.await?) }
    }
}

fn into_documents(data: Value) -> Result<Vec<Value>, StoreError> {
    match data {
        Value::Array(docs) => Ok(docs),
        Value::Null => Ok(Vec::new()),
        other => Err(StoreError::BadRequest(format!(
            "expected a document list, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// StoreClient
// ---------------------------------------------------------------------------

/// Reaches a remote store process.
///
/// Each call opens a fresh connection, sends exactly one request, waits for
/// exactly one reply and closes. No pooling and no retry: a failed write is
/// reported, never repeated.
#[derive(Debug, Clone)]
pub struct StoreClient {
    addr: String,
    codec: JsonCodec,
}

impl StoreClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            codec: JsonCodec,
        }
    }

    /// The `host:port` this client connects to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Datastore for StoreClient {
    async fn execute(&self, request: StoreRequest) -> Result<Value, StoreError> {
        let bytes = self.codec.encode(&request)?;

        let conn = TcpConnection::connect(&self.addr).await?;
        conn.send(&bytes).await?;
        let received = conn.recv().await;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "closing datastore connection failed");
        }

        let Some(data) = received? else {
            return Err(StoreError::NoReply);
        };
        let reply: Reply = self.codec.decode(&data)?;

        tracing::debug!(
            collection = %request.collection,
            action = ?request.action,
            success = reply.success,
            "datastore call finished"
        );

        if reply.success {
            Ok(reply.data.unwrap_or(Value::Null))
        } else {
            Err(StoreError::Rejected {
                kind: reply.kind,
                message: reply
                    .error
                    .unwrap_or_else(|| "request failed".to_string()),
            })
        }
    }
}
