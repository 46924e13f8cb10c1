//! WebSocket protocol messages.
//!
//! Every frame is a JSON envelope `{"type": ..., "payload": ..., "correlationId": ...}`.
//! Inbound envelopes are first read loosely as a `RawEnvelope`, so a request
//! with an unknown type or a bad payload can still be answered with the
//! caller's correlation id, and then decoded into a `ClientMessage`.

use carcassonne_core::{
    BotMove, GameEvent, GameSnapshot, Placement, Player, PlayerColor, PlayerId, Position,
    Rotation, TileDefinition,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// An inbound envelope before its payload is interpreted
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, rename = "correlationId")]
    pub correlation_id: Option<String>,
}

impl RawEnvelope {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Interpret the payload according to the declared type
    pub fn decode(&self) -> Result<ClientMessage, ProtocolError> {
        let kind: RequestKind = self.kind.parse()?;
        let payload = self.payload.clone();

        let message = match kind {
            RequestKind::Connect => ClientMessage::Connect(payload_as(kind, payload)?),
            RequestKind::ListRooms => ClientMessage::ListRooms,
            RequestKind::CreateRoom => ClientMessage::CreateRoom(payload_as(kind, payload)?),
            RequestKind::JoinRoom => ClientMessage::JoinRoom(payload_as(kind, payload)?),
            RequestKind::LeaveRoom => ClientMessage::LeaveRoom,
            RequestKind::AddBot => ClientMessage::AddBot(payload_as(kind, payload)?),
            RequestKind::StartGame => ClientMessage::StartGame,
            RequestKind::PlaceTile => ClientMessage::PlaceTile(payload_as(kind, payload)?),
            RequestKind::PlaceMarker => ClientMessage::PlaceMarker(payload_as(kind, payload)?),
            RequestKind::SkipMarker => ClientMessage::SkipMarker,
            RequestKind::DiscardTile => ClientMessage::DiscardTile,
            RequestKind::Ping => ClientMessage::Ping(payload_as(kind, payload)?),
        };
        Ok(message)
    }
}

/// Deserialize a payload, treating a missing one as an empty object
fn payload_as<T: DeserializeOwned>(kind: RequestKind, payload: Value) -> Result<T, ProtocolError> {
    let payload = match payload {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

/// The closed set of request types a client may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Connect,
    ListRooms,
    CreateRoom,
    JoinRoom,
    LeaveRoom,
    AddBot,
    StartGame,
    PlaceTile,
    PlaceMarker,
    SkipMarker,
    DiscardTile,
    Ping,
}

impl RequestKind {
    pub const ALL: [RequestKind; 12] = [
        RequestKind::Connect,
        RequestKind::ListRooms,
        RequestKind::CreateRoom,
        RequestKind::JoinRoom,
        RequestKind::LeaveRoom,
        RequestKind::AddBot,
        RequestKind::StartGame,
        RequestKind::PlaceTile,
        RequestKind::PlaceMarker,
        RequestKind::SkipMarker,
        RequestKind::DiscardTile,
        RequestKind::Ping,
    ];

    /// Wire name of the request type
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Connect => "CONNECT",
            RequestKind::ListRooms => "LIST_ROOMS",
            RequestKind::CreateRoom => "CREATE_ROOM",
            RequestKind::JoinRoom => "JOIN_ROOM",
            RequestKind::LeaveRoom => "LEAVE_ROOM",
            RequestKind::AddBot => "ADD_BOT",
            RequestKind::StartGame => "START_GAME",
            RequestKind::PlaceTile => "PLACE_TILE",
            RequestKind::PlaceMarker => "PLACE_MARKER",
            RequestKind::SkipMarker => "SKIP_MARKER",
            RequestKind::DiscardTile => "DISCARD_TILE",
            RequestKind::Ping => "PING",
        }
    }

    /// Older wire name still accepted on input
    pub fn alias(&self) -> Option<&'static str> {
        match self {
            RequestKind::StartGame => Some("GAME_START"),
            RequestKind::PlaceMarker => Some("PLACE_MEEPLE"),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.alias() == Some(s))
            .ok_or_else(|| ProtocolError::UnknownType(s.to_string()))
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Declare the identity used by this connection
    Connect(ConnectPayload),

    /// Request the list of joinable rooms
    ListRooms,

    /// Create a room and join it
    CreateRoom(CreateRoomPayload),

    /// Join an existing room
    JoinRoom(JoinRoomPayload),

    /// Leave the current room
    LeaveRoom,

    /// Add a bot to the current room (creator only)
    AddBot(AddBotPayload),

    /// Start the game (creator only)
    StartGame,

    /// Place the tile in hand
    PlaceTile(PlaceTilePayload),

    /// Claim a feature on the tile just placed
    PlaceMarker(PlaceMarkerPayload),

    /// Finish the turn without a marker
    SkipMarker,

    /// Set aside a tile that fits nowhere
    DiscardTile,

    /// Keepalive and latency check
    Ping(PingPayload),
}

impl ClientMessage {
    pub fn kind(&self) -> RequestKind {
        match self {
            ClientMessage::Connect(_) => RequestKind::Connect,
            ClientMessage::ListRooms => RequestKind::ListRooms,
            ClientMessage::CreateRoom(_) => RequestKind::CreateRoom,
            ClientMessage::JoinRoom(_) => RequestKind::JoinRoom,
            ClientMessage::LeaveRoom => RequestKind::LeaveRoom,
            ClientMessage::AddBot(_) => RequestKind::AddBot,
            ClientMessage::StartGame => RequestKind::StartGame,
            ClientMessage::PlaceTile(_) => RequestKind::PlaceTile,
            ClientMessage::PlaceMarker(_) => RequestKind::PlaceMarker,
            ClientMessage::SkipMarker => RequestKind::SkipMarker,
            ClientMessage::DiscardTile => RequestKind::DiscardTile,
            ClientMessage::Ping(_) => RequestKind::Ping,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
    pub player_id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomPayload {
    pub room_name: String,
    /// Out-of-range values fall back to the maximum
    #[serde(default)]
    pub max_players: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBotPayload {
    pub bot_name: String,
    /// Validated by the room so unknown tiers are rejected, not downgraded
    pub difficulty: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceTilePayload {
    pub position: Position,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceMarkerPayload {
    #[serde(alias = "featureId")]
    pub feature_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PingPayload {
    pub timestamp: Option<i64>,
    pub client_id: Option<String>,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Identity accepted, with the joinable rooms
    Connected { player: Player, rooms: Vec<RoomInfo> },

    /// Joinable rooms
    RoomList { rooms: Vec<RoomInfo> },

    /// Room membership changed
    RoomState { room: RoomInfo, players: Vec<Player> },

    /// Game started
    GameStarted { room_id: Uuid, players: Vec<Player> },

    /// Full game state after a change
    GameState { state: GameSnapshot },

    /// A new turn began
    TurnStart {
        current_player: PlayerId,
        current_tile: Option<Arc<TileDefinition>>,
        valid_placements: Vec<Placement>,
    },

    /// Outcome of the sender's own action
    ActionResult { events: Vec<GameEvent> },

    /// A bot finished its turn; no move means its tile was discarded
    BotMoved {
        bot_id: PlayerId,
        #[serde(rename = "move")]
        bot_move: Option<BotMove>,
    },

    /// The draw pile ran out
    GameOver {
        final_scores: BTreeMap<PlayerId, u32>,
        winners: Vec<PlayerId>,
    },

    /// A request failed
    Error { code: ErrorCode, message: String },

    /// Reply to a ping
    Pong {
        timestamp: Option<i64>,
        client_id: Option<String>,
        server_time: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

/// A server message bound for one connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    #[serde(flatten)]
    pub message: ServerMessage,
    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Outbound {
    /// An unsolicited message such as a broadcast
    pub fn push(message: ServerMessage) -> Self {
        Self {
            message,
            correlation_id: None,
        }
    }

    /// A direct reply carrying the request's correlation id
    pub fn reply(message: ServerMessage, correlation_id: Option<String>) -> Self {
        Self {
            message,
            correlation_id,
        }
    }
}

/// Room information for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub game_started: bool,
    pub game_ended: bool,
    pub created_by: PlayerId,
    pub created_at: DateTime<Utc>,
}

impl RoomInfo {
    pub fn is_full(&self) -> bool {
        self.player_count >= self.max_players
    }
}

/// Machine-readable failure reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotConnected,
    NotInRoom,
    CapacityExceeded,
    AlreadyStarted,
    NotYourTurn,
    IllegalPlacement,
    IllegalMarker,
    NotFound,
    InsufficientPlayers,
    UnknownMessage,
    InvalidData,
    NotCreator,
    InvalidDifficulty,
    ColorUnavailable,
    AlreadyInRoom,
    IdentityInUse,
    GameEnded,
    InvalidAction,
}

/// Envelope decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: RequestKind, reason: String },
}

impl ProtocolError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProtocolError::UnknownType(_) => ErrorCode::UnknownMessage,
            ProtocolError::MalformedEnvelope(_) | ProtocolError::InvalidPayload { .. } => {
                ErrorCode::InvalidData
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(value: Value) -> Result<ClientMessage, ProtocolError> {
        RawEnvelope::parse(&value.to_string())?.decode()
    }

    #[test]
    fn test_request_kind_names_round_trip() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_older_type_names_accepted() {
        assert_eq!(decode(json!({"type": "GAME_START"})).unwrap(), ClientMessage::StartGame);
        assert_eq!(
            decode(json!({"type": "PLACE_MEEPLE", "payload": {"featureId": 1}})).unwrap(),
            ClientMessage::PlaceMarker(PlaceMarkerPayload { feature_index: 1 })
        );
        assert_eq!(RequestKind::StartGame.to_string(), "START_GAME");
    }

    #[test]
    fn test_decode_with_and_without_payload() {
        let msg = decode(json!({
            "type": "CONNECT",
            "payload": {"playerId": "alice", "name": "Alice", "color": "green"},
            "correlationId": "c-1"
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Connect(ConnectPayload {
                player_id: "alice".into(),
                name: "Alice".into(),
                color: PlayerColor::Green,
            })
        );

        assert_eq!(decode(json!({"type": "LIST_ROOMS"})).unwrap(), ClientMessage::ListRooms);
        assert_eq!(
            decode(json!({"type": "PING"})).unwrap(),
            ClientMessage::Ping(PingPayload::default())
        );
        assert_eq!(
            decode(json!({"type": "CREATE_ROOM", "payload": {"roomName": "Lobby"}})).unwrap(),
            ClientMessage::CreateRoom(CreateRoomPayload {
                room_name: "Lobby".into(),
                max_players: 0,
            })
        );
    }

    #[test]
    fn test_place_tile_payload() {
        let msg = decode(json!({
            "type": "PLACE_TILE",
            "payload": {"position": {"x": 1, "y": -2}, "rotation": 270}
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::PlaceTile(PlaceTilePayload {
                position: Position::new(1, -2),
                rotation: Rotation::R270,
            })
        );

        let err = decode(json!({
            "type": "PLACE_TILE",
            "payload": {"position": {"x": 1, "y": 0}, "rotation": 45}
        }))
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidData);
    }

    #[test]
    fn test_marker_accepts_feature_id_alias() {
        let msg = decode(json!({"type": "PLACE_MARKER", "payload": {"featureId": 2}})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::PlaceMarker(PlaceMarkerPayload { feature_index: 2 })
        );
    }

    #[test]
    fn test_unknown_type_and_bad_payload() {
        let err = decode(json!({"type": "TELEPORT"})).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType("TELEPORT".into()));
        assert_eq!(err.code(), ErrorCode::UnknownMessage);

        let err = decode(json!({"type": "JOIN_ROOM", "payload": {"roomId": "not-a-uuid"}}))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPayload {
                kind: RequestKind::JoinRoom,
                ..
            }
        ));

        let err = RawEnvelope::parse("{not json").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidData);
    }

    #[test]
    fn test_outbound_shape() {
        let out = Outbound::reply(
            ServerMessage::error(ErrorCode::NotYourTurn, "wait"),
            Some("abc".into()),
        );
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ERROR",
                "payload": {"code": "NOT_YOUR_TURN", "message": "wait"},
                "correlationId": "abc"
            })
        );

        let value = serde_json::to_value(Outbound::push(ServerMessage::ActionResult {
            events: vec![],
        }))
        .unwrap();
        assert_eq!(value, json!({"type": "ACTION_RESULT", "payload": {"events": []}}));
    }

    #[test]
    fn test_turn_start_field_names() {
        let msg = ServerMessage::TurnStart {
            current_player: "bob".into(),
            current_tile: None,
            valid_placements: vec![Placement::new(Position::new(0, 1), Rotation::R90)],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "TURN_START");
        assert_eq!(value["payload"]["currentPlayer"], "bob");
        assert_eq!(value["payload"]["validPlacements"][0]["rotation"], 90);
    }
}
