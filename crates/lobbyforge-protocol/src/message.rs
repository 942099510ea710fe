//! The message unions that travel inside frames.
//!
//! Three shapes exist on a lobby connection:
//!
//! ```text
//! client → lobby   Request   { "action": "JOIN_ROOM", "roomId": 1, ..., "requestId"? }
//! lobby  → client  Reply     { "success": true, "data"?, "error"?, "kind"?, "requestId"? }
//! lobby  → client  Push      { "action": "GAME_STARTING", ... }   (no requestId)
//! ```
//!
//! Requests are decoded once, at the edge, into the [`Request`] enum. The
//! dispatcher then matches it exhaustively, so adding an action without
//! handling it is a compile error.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;
use crate::types::{GameManifest, GameRef, Role, RoomId, Visibility};

/// Name of the correlation field carried on requests and echoed on replies.
pub const REQUEST_ID_FIELD: &str = "requestId";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Every action a client may ask the lobby to perform.
///
/// `#[serde(tag = "action")]` makes this an internally tagged union: the
/// variant name (in SCREAMING_SNAKE_CASE) sits next to the fields, which
/// are camelCase. Unknown extra fields, like `requestId`, are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    // -- Accounts --
    Register {
        name: String,
        password: String,
        role: Role,
    },
    Login {
        name: String,
        password: String,
        role: Role,
    },
    Logout {
        name: String,
        role: Role,
    },

    // -- Publishing (developer tool) --
    /// Publishes a new game version. `files` maps relative file names to
    /// base64-encoded contents.
    UploadGame {
        developer: String,
        manifest: GameManifest,
        #[serde(default)]
        files: BTreeMap<String, String>,
    },
    /// Replaces the program files of a version the developer authored.
    UpdateGame {
        developer: String,
        manifest: GameManifest,
        #[serde(default)]
        files: BTreeMap<String, String>,
    },
    RemoveGame {
        game: GameRef,
    },

    // -- Browsing (player tool) --
    ListGames {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },
    ListPlayers,
    DownloadGame {
        game: GameRef,
    },

    // -- Rooms --
    CreateRoom {
        host: String,
        game: GameRef,
        #[serde(default)]
        visibility: Visibility,
    },
    JoinRoom {
        room_id: RoomId,
        player: String,
    },
    ListRooms,
    LeaveRoom {
        room_id: RoomId,
        player: String,
    },
    StartGame {
        room_id: RoomId,
        player: String,
    },
}

impl Request {
    /// Every action name this enum accepts.
    pub const ACTIONS: &'static [&'static str] = &[
        "REGISTER",
        "LOGIN",
        "LOGOUT",
        "UPLOAD_GAME",
        "UPDATE_GAME",
        "REMOVE_GAME",
        "LIST_GAMES",
        "LIST_PLAYERS",
        "DOWNLOAD_GAME",
        "CREATE_ROOM",
        "JOIN_ROOM",
        "LIST_ROOMS",
        "LEAVE_ROOM",
        "START_GAME",
    ];

    /// The wire name of this request's action.
    pub fn action(&self) -> &'static str {
        match self {
            Request::Register { .. } => "REGISTER",
            Request::Login { .. } => "LOGIN",
            Request::Logout { .. } => "LOGOUT",
            Request::UploadGame { .. } => "UPLOAD_GAME",
            Request::UpdateGame { .. } => "UPDATE_GAME",
            Request::RemoveGame { .. } => "REMOVE_GAME",
            Request::ListGames { .. } => "LIST_GAMES",
            Request::ListPlayers => "LIST_PLAYERS",
            Request::DownloadGame { .. } => "DOWNLOAD_GAME",
            Request::CreateRoom { .. } => "CREATE_ROOM",
            Request::JoinRoom { .. } => "JOIN_ROOM",
            Request::ListRooms => "LIST_ROOMS",
            Request::LeaveRoom { .. } => "LEAVE_ROOM",
            Request::StartGame { .. } => "START_GAME",
        }
    }
}

/// A decoded request plus the correlation id it arrived with.
///
/// The id is kept even when the body fails to decode, so the error reply
/// can still be matched by the caller.
#[derive(Debug)]
pub struct IncomingRequest {
    pub request_id: Option<Value>,
    pub request: Result<Request, ProtocolError>,
}

impl IncomingRequest {
    /// Classifies one already-parsed JSON message.
    pub fn from_value(value: Value) -> Self {
        let request_id = value.get(REQUEST_ID_FIELD).cloned();
        let request = decode_request(value);
        Self {
            request_id,
            request,
        }
    }
}

fn decode_request(value: Value) -> Result<Request, ProtocolError> {
    let Some(object) = value.as_object() else {
        return Err(ProtocolError::InvalidMessage(
            "message is not a JSON object".into(),
        ));
    };
    let action = match object.get("action") {
        Some(Value::String(action)) => action.clone(),
        Some(_) => {
            return Err(ProtocolError::InvalidMessage(
                "action is not a string".into(),
            ));
        }
        None => {
            return Err(ProtocolError::InvalidMessage("missing action".into()));
        }
    };

    if !Request::ACTIONS.contains(&action.as_str()) {
        return Err(ProtocolError::UnknownAction(action));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::BadRequest {
        action,
        reason: e.to_string(),
    })
}

/// Serializes a request with `requestId` attached.
pub fn request_with_id(
    request: &Request,
    request_id: &str,
) -> Result<Value, ProtocolError> {
    let mut value =
        serde_json::to_value(request).map_err(ProtocolError::Encode)?;
    match value.as_object_mut() {
        Some(object) => {
            object.insert(
                REQUEST_ID_FIELD.into(),
                Value::String(request_id.into()),
            );
            Ok(value)
        }
        None => Err(ProtocolError::InvalidMessage(
            "request did not serialize to an object".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Unsolicited lobby → client notifications.
///
/// Pushes never carry a correlation id; that is how a client tells them
/// apart from replies on the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Push {
    /// A room's match process is up. Members should hand off to the game
    /// client, pointing it at `lobby_host:port`.
    GameStarting {
        starter: String,
        port: u16,
        lobby_host: String,
        room_id: RoomId,
    },
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Machine-readable failure class carried on error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AlreadyOnline,
    NotFound,
    BadCredentials,
    RoomFull,
    RoomNotFound,
    Forbidden,
    NotEnoughPlayers,
    AlreadyStarting,
    UnknownAction,
    AlreadyExists,
    BadRequest,
    /// A collaborator (datastore, filesystem, process spawn) failed.
    Unavailable,
}

impl From<&ProtocolError> for ErrorKind {
    fn from(err: &ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownAction(_) => ErrorKind::UnknownAction,
            ProtocolError::Encode(_) => ErrorKind::Unavailable,
            ProtocolError::Decode(_)
            | ProtocolError::InvalidMessage(_)
            | ProtocolError::BadRequest { .. } => ErrorKind::BadRequest,
        }
    }
}

/// The reply envelope shared by the lobby and the datastore.
///
/// ```json
/// { "success": true,  "data": {...}, "requestId": "9f0c..." }
/// { "success": false, "error": "room is full", "kind": "RoomFull" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
}

impl Reply {
    /// A successful reply carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            request_id: None,
        }
    }

    /// A successful reply with no payload.
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            kind: None,
            request_id: None,
        }
    }

    /// A failed reply.
    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            kind: Some(kind),
            request_id: None,
        }
    }

    /// Echoes the caller's correlation id, if it sent one.
    pub fn with_request_id(mut self, request_id: Option<Value>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns the correlation id as a string, if it is one.
    pub fn request_id_str(&self) -> Option<&str> {
        self.request_id.as_ref().and_then(Value::as_str)
    }

    /// Deserializes `data` into `T`. A missing `data` field decodes as
    /// JSON `null`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let data = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| {
            ProtocolError::InvalidMessage(format!("unexpected reply data: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Reply payloads
// ---------------------------------------------------------------------------

/// `data` of a successful `CREATE_ROOM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub room_id: RoomId,
}

/// `data` of a successful `START_GAME`. Same port as the push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStarted {
    pub port: u16,
    pub lobby_host: String,
}

/// `data` of a successful `DOWNLOAD_GAME`: the manifest plus every file
/// except the server program, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePackage {
    pub manifest: GameManifest,
    pub files: BTreeMap<String, String>,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =====================================================================
    // Request decoding
    // =====================================================================

    #[test]
    fn test_request_join_room_json_format() {
        let req = Request::JoinRoom {
            room_id: RoomId(4),
            player: "bob".into(),
        };
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["action"], "JOIN_ROOM");
        assert_eq!(json["roomId"], 4);
        assert_eq!(json["player"], "bob");
    }

    #[test]
    fn test_request_unit_variant_json_format() {
        let json = serde_json::to_value(Request::ListRooms).unwrap();
        assert_eq!(json, json!({"action": "LIST_ROOMS"}));
    }

    #[test]
    fn test_incoming_request_keeps_request_id() {
        let incoming = IncomingRequest::from_value(json!({
            "action": "LOGIN",
            "name": "alice",
            "password": "pw",
            "role": "Player",
            "requestId": "abc"
        }));

        assert_eq!(incoming.request_id, Some(json!("abc")));
        assert_eq!(
            incoming.request.unwrap(),
            Request::Login {
                name: "alice".into(),
                password: "pw".into(),
                role: Role::Player,
            }
        );
    }

    #[test]
    fn test_incoming_request_unit_variant_with_request_id() {
        let incoming = IncomingRequest::from_value(json!({
            "action": "LIST_PLAYERS",
            "requestId": "r1"
        }));
        assert_eq!(incoming.request.unwrap(), Request::ListPlayers);
    }

    #[test]
    fn test_incoming_request_unknown_action() {
        let incoming = IncomingRequest::from_value(json!({
            "action": "FLY_TO_MOON",
            "requestId": 7
        }));

        assert_eq!(incoming.request_id, Some(json!(7)));
        assert!(matches!(
            incoming.request,
            Err(ProtocolError::UnknownAction(ref a)) if a == "FLY_TO_MOON"
        ));
    }

    #[test]
    fn test_incoming_request_known_action_with_bad_fields() {
        let incoming = IncomingRequest::from_value(json!({
            "action": "JOIN_ROOM",
            "roomId": "not a number"
        }));
        let err = incoming.request.unwrap_err();

        assert!(matches!(err, ProtocolError::BadRequest { .. }));
        assert_eq!(ErrorKind::from(&err), ErrorKind::BadRequest);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_incoming_request_missing_action() {
        let incoming = IncomingRequest::from_value(json!({"name": "x"}));
        assert!(matches!(
            incoming.request,
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_incoming_request_not_an_object() {
        let incoming = IncomingRequest::from_value(json!([1, 2, 3]));
        assert!(incoming.request_id.is_none());
        assert!(incoming.request.is_err());
    }

    #[test]
    fn test_create_room_visibility_defaults_to_public() {
        let incoming = IncomingRequest::from_value(json!({
            "action": "CREATE_ROOM",
            "host": "alice",
            "game": {"name": "Duel", "version": "1.0.0"}
        }));
        match incoming.request.unwrap() {
            Request::CreateRoom { visibility, .. } => {
                assert_eq!(visibility, Visibility::Public);
            }
            other => panic!("expected CreateRoom, got {other:?}"),
        }
    }

    #[test]
    fn test_every_variant_action_is_listed() {
        let game = GameRef::new("g", "1");
        let samples = [
            Request::ListPlayers,
            Request::ListRooms,
            Request::ListGames { author: None },
            Request::RemoveGame { game: game.clone() },
            Request::DownloadGame { game },
        ];
        for req in samples {
            let json = serde_json::to_value(&req).unwrap();
            assert_eq!(json["action"], req.action());
            assert!(Request::ACTIONS.contains(&req.action()));
        }
    }

    #[test]
    fn test_request_with_id_attaches_field() {
        let value = request_with_id(&Request::ListRooms, "ff00").unwrap();
        assert_eq!(value["requestId"], "ff00");
        assert_eq!(value["action"], "LIST_ROOMS");
    }

    // =====================================================================
    // Push
    // =====================================================================

    #[test]
    fn test_push_game_starting_json_format() {
        let push = Push::GameStarting {
            starter: "alice".into(),
            port: 44848,
            lobby_host: "10.0.0.1".into(),
            room_id: RoomId(2),
        };
        let json = serde_json::to_value(&push).unwrap();

        assert_eq!(json["action"], "GAME_STARTING");
        assert_eq!(json["port"], 44848);
        assert_eq!(json["lobbyHost"], "10.0.0.1");
        assert_eq!(json["roomId"], 2);
        assert!(json.get("requestId").is_none());
    }

    // =====================================================================
    // Reply
    // =====================================================================

    #[test]
    fn test_reply_ok_omits_error_fields() {
        let json = serde_json::to_value(Reply::ok(json!({"a": 1}))).unwrap();
        assert_eq!(json, json!({"success": true, "data": {"a": 1}}));
    }

    #[test]
    fn test_reply_failure_carries_kind() {
        let reply = Reply::failure(ErrorKind::RoomFull, "room is full")
            .with_request_id(Some(json!("x")));
        let json = serde_json::to_value(&reply).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "room is full");
        assert_eq!(json["kind"], "RoomFull");
        assert_eq!(json["requestId"], "x");
    }

    #[test]
    fn test_reply_data_as_typed_payload() {
        let reply = Reply::ok(json!({"port": 5000, "lobbyHost": "h"}));
        let started: GameStarted = reply.data_as().unwrap();
        assert_eq!(started.port, 5000);
        assert_eq!(started.lobby_host, "h");
    }

    #[test]
    fn test_reply_request_id_str_ignores_non_strings() {
        let reply = Reply::done().with_request_id(Some(json!(12)));
        assert_eq!(reply.request_id_str(), None);
    }
}
