//! Per-connection handler: decode, dispatch, reply.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that forwards pushes from the connection's outbox.
//! The flow is:
//!   1. Receive a message → decode JSON (undecodable bytes close the
//!      connection)
//!   2. Parse the tagged request (a bad shape gets an error reply)
//!   3. Dispatch to the [`Lobby`] and send the reply, echoing `requestId`
//!   4. On close, end every session this connection logged in

use std::sync::Arc;

use lobbyforge_protocol::{
    Codec, ErrorKind, IncomingRequest, JsonCodec, ProtocolError, Reply, Request,
};
use lobbyforge_session::{PushReceiver, PushSender, SessionBinding, push_channel};
use lobbyforge_store::Datastore;
use lobbyforge_transport::{Connection, ConnectionId, TcpConnection};
use serde::Serialize;
use serde_json::Value;

use crate::{Lobby, LobbyError};

/// Drop guard that ends a connection's sessions when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct SessionGuard<D: Datastore> {
    conn_id: ConnectionId,
    lobby: Arc<Lobby<D>>,
}

impl<D: Datastore> Drop for SessionGuard<D> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let lobby = Arc::clone(&self.lobby);
        tokio::spawn(async move {
            lobby.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<D: Datastore>(
    conn: TcpConnection,
    lobby: Arc<Lobby<D>>,
) -> Result<(), LobbyError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = ?conn.peer_addr(), "handling new connection");

    let _guard = SessionGuard {
        conn_id,
        lobby: Arc::clone(&lobby),
    };

    let (outbox, pushes) = push_channel();
    let writer = tokio::spawn(forward_pushes(Arc::clone(&conn), pushes));

    let result = serve(&conn, &lobby, &outbox).await;

    // Session bindings still hold outbox clones until the guard runs, so
    // the writer would never see its channel close on its own.
    writer.abort();
    result
    // _guard drops here → session cleanup fires.
}

async fn serve<D: Datastore>(
    conn: &TcpConnection,
    lobby: &Lobby<D>,
    outbox: &PushSender,
) -> Result<(), LobbyError> {
    let conn_id = conn.id();
    let codec = JsonCodec;

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed");
                return Ok(());
            }
            Err(e) if e.is_protocol_violation() => {
                tracing::warn!(%conn_id, error = %e, "bad frame, closing connection");
                return Err(e.into());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Ok(());
            }
        };

        let value: Value = match codec.decode(&data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "undecodable message, closing connection");
                return Err(e.into());
            }
        };

        let incoming = IncomingRequest::from_value(value);
        let reply = match incoming.request {
            Ok(request) => dispatch(lobby, conn_id, outbox, request).await,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "rejected request");
                Reply::failure(ErrorKind::from(&e), e.to_string())
            }
        }
        .with_request_id(incoming.request_id);

        let bytes = codec.encode(&reply)?;
        conn.send(&bytes).await?;
    }
}

/// Runs one request against the lobby and turns the outcome into a reply.
async fn dispatch<D: Datastore>(
    lobby: &Lobby<D>,
    conn_id: ConnectionId,
    outbox: &PushSender,
    request: Request,
) -> Reply {
    let action = request.action();
    tracing::debug!(%conn_id, action, "dispatching");

    match execute(lobby, conn_id, outbox, request).await {
        Ok(reply) => reply,
        Err(e) => {
            let kind = e.kind();
            if kind == ErrorKind::Unavailable {
                tracing::warn!(%conn_id, action, error = %e, "request failed");
            } else {
                tracing::debug!(%conn_id, action, error = %e, "request refused");
            }
            Reply::failure(kind, e.to_string())
        }
    }
}

async fn execute<D: Datastore>(
    lobby: &Lobby<D>,
    conn_id: ConnectionId,
    outbox: &PushSender,
    request: Request,
) -> Result<Reply, LobbyError> {
    match request {
        // -- Accounts --
        Request::Register {
            name,
            password,
            role,
        } => lobby.register(&name, &password, role).await.map(Reply::ok),
        Request::Login {
            name,
            password,
            role,
        } => {
            let binding = SessionBinding::new(conn_id, outbox.clone());
            lobby
                .login(&name, &password, role, binding)
                .await
                .map(Reply::ok)
        }
        Request::Logout { name, role } => {
            lobby.logout(&name, role).await?;
            Ok(Reply::done())
        }

        // -- Publishing --
        Request::UploadGame {
            developer,
            manifest,
            files,
        } => lobby
            .upload_game(&developer, manifest, &files)
            .await
            .map(Reply::ok),
        Request::UpdateGame {
            developer,
            manifest,
            files,
        } => {
            lobby.update_game(&developer, &manifest, &files).await?;
            Ok(Reply::done())
        }
        Request::RemoveGame { game } => {
            lobby.remove_game(&game).await?;
            Ok(Reply::done())
        }

        // -- Browsing --
        Request::ListGames { author } => {
            data(&lobby.list_games(author.as_deref()).await?)
        }
        Request::ListPlayers => data(&lobby.list_players().await),
        Request::DownloadGame { game } => data(&lobby.download_game(&game).await?),

        // -- Rooms --
        Request::CreateRoom {
            host,
            game,
            visibility,
        } => data(&lobby.create_room(&host, game, visibility).await?),
        Request::JoinRoom { room_id, player } => {
            lobby.join_room(room_id, &player).await?;
            Ok(Reply::done())
        }
        Request::ListRooms => data(&lobby.list_rooms().await),
        Request::LeaveRoom { room_id, player } => {
            lobby.leave_room(room_id, &player).await?;
            Ok(Reply::done())
        }
        Request::StartGame { room_id, player } => {
            data(&lobby.start_game(room_id, &player).await?)
        }
    }
}

/// A successful reply carrying `value` as its `data`.
fn data<T: Serialize>(value: &T) -> Result<Reply, LobbyError> {
    let value = serde_json::to_value(value).map_err(ProtocolError::Encode)?;
    Ok(Reply::ok(value))
}

/// Writes every push queued for this connection, in order.
async fn forward_pushes(conn: Arc<TcpConnection>, mut pushes: PushReceiver) {
    let codec = JsonCodec;
    while let Some(push) = pushes.recv().await {
        let bytes = match codec.encode(&push) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "failed to encode push");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "push send failed");
            break;
        }
    }
}
