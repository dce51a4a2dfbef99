//! Inbound and outbound message contracts.
//!
//! Inbound frames have the shape `{ "type": string, "data"?: object }`.
//! Decoding happens in two steps so the router can tell apart "this is not
//! a message at all" (no `type`) from "I don't know this message"
//! (unrecognized `type`) from "this message is missing a field":
//!
//! 1. [`Envelope`]: just `type` plus the raw `data` value.
//! 2. [`ClientMessage::try_from`]: picks the payload struct for `type`.
//!
//! Required fields are `Option`s here and are checked by the handler that
//! needs them, so the error can name the missing field.
//!
//! Outbound messages are a single adjacently tagged enum,
//! [`ServerMessage`], serialized as `{ "type": ..., "data": {...} }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    EndReason, GameData, GameType, LeaderboardEntry, PlayerView, RoomId, RoomState, RoomSummary,
    UserId,
};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outer shape of every inbound frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    /// The message type, e.g. `"create_room"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific payload. Absent and `null` both mean "no fields".
    #[serde(default)]
    pub data: Option<Value>,
}

// ---------------------------------------------------------------------------
// Client → server payloads
// ---------------------------------------------------------------------------

/// `create_room`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    pub game_type: Option<GameType>,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub max_players: Option<usize>,
    pub is_private: Option<bool>,
    /// Round length override in milliseconds.
    pub round_duration: Option<u64>,
}

/// `join_game`: `gameId` may be a room id or an invite code.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGame {
    #[serde(alias = "roomId", alias = "inviteCode")]
    pub game_id: Option<String>,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    #[serde(default)]
    pub spectate: bool,
}

/// `find_match`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMatch {
    pub game_type: Option<GameType>,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
}

/// `cancel_match`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelMatch {
    pub game_type: Option<GameType>,
    pub user_id: Option<UserId>,
}

/// `player_ready`: `ready` defaults to `true`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReady {
    pub ready: Option<bool>,
}

/// `game_action`: the action name plus its game-specific payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameActionRequest {
    pub action: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// `game_state_update`: host-only patch of the shared game data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateUpdate {
    pub game_data: Option<Value>,
}

/// `chat`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
}

/// `list_rooms`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRooms {
    pub game_type: Option<GameType>,
}

/// Every message a client may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    CreateRoom(CreateRoom),
    JoinGame(JoinGame),
    LeaveGame,
    FindMatch(FindMatch),
    CancelMatch(CancelMatch),
    PlayerReady(PlayerReady),
    StartGame,
    GameAction(GameActionRequest),
    GameStateUpdate(GameStateUpdate),
    /// Host-only forced end of the round.
    GameResult,
    Chat(ChatRequest),
    ListRooms(ListRooms),
    Ping,
}

impl ClientMessage {
    /// The wire name of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "create_room",
            Self::JoinGame(_) => "join_game",
            Self::LeaveGame => "leave_game",
            Self::FindMatch(_) => "find_match",
            Self::CancelMatch(_) => "cancel_match",
            Self::PlayerReady(_) => "player_ready",
            Self::StartGame => "start_game",
            Self::GameAction(_) => "game_action",
            Self::GameStateUpdate(_) => "game_state_update",
            Self::GameResult => "game_result",
            Self::Chat(_) => "chat",
            Self::ListRooms(_) => "list_rooms",
            Self::Ping => "ping",
        }
    }
}

impl TryFrom<Envelope> for ClientMessage {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let Envelope { kind, data } = envelope;
        let data = match data {
            Some(Value::Null) | None => Value::Object(serde_json::Map::new()),
            Some(value) => value,
        };

        // Each arm decodes `data` into the payload struct for its type.
        macro_rules! payload {
            ($variant:ident) => {
                serde_json::from_value(data)
                    .map(Self::$variant)
                    .map_err(|source| ProtocolError::InvalidPayload { kind: kind.clone(), source })
            };
        }

        match kind.as_str() {
            "create_room" => payload!(CreateRoom),
            "join_game" => payload!(JoinGame),
            "leave_game" => Ok(Self::LeaveGame),
            "find_match" => payload!(FindMatch),
            "cancel_match" => payload!(CancelMatch),
            "player_ready" => payload!(PlayerReady),
            "start_game" => Ok(Self::StartGame),
            "game_action" => payload!(GameAction),
            "game_state_update" => payload!(GameStateUpdate),
            "game_result" => Ok(Self::GameResult),
            "chat" => payload!(Chat),
            "list_rooms" => payload!(ListRooms),
            "ping" => Ok(Self::Ping),
            _ => Err(ProtocolError::UnknownType(kind.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client messages
// ---------------------------------------------------------------------------

/// Every message the server sends.
///
/// `#[serde(tag = "type", content = "data")]` produces
/// `{ "type": "room_created", "data": { "roomId": ... } }`; unit variants
/// serialize as `{ "type": "..." }` with no `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    RoomCreated {
        room_id: RoomId,
        invite_code: String,
        game_type: GameType,
        player_count: usize,
        max_players: usize,
    },
    Joined {
        room_id: RoomId,
        invite_code: String,
        game_type: GameType,
        state: RoomState,
        host_id: Option<UserId>,
        max_players: usize,
        players: Vec<PlayerView>,
    },
    JoinedSpectator {
        room_id: RoomId,
        game_type: GameType,
        state: RoomState,
        players: Vec<PlayerView>,
    },
    PlayerJoined {
        user_id: UserId,
        username: String,
        player_count: usize,
    },
    PlayerLeft {
        user_id: UserId,
        username: String,
        player_count: usize,
    },
    LeftGame {
        room_id: RoomId,
    },
    HostChanged {
        host_id: UserId,
        username: String,
    },
    PlayerReady {
        user_id: UserId,
        players: Vec<PlayerView>,
    },
    CountdownStart {
        /// Milliseconds until the round starts.
        duration: u64,
        /// Unix epoch milliseconds at which the round starts.
        starts_at: i64,
    },
    GameStart {
        game_type: GameType,
        duration: u64,
        game_data: GameData,
        players: Vec<PlayerView>,
        started_at: i64,
    },
    ScoreUpdate {
        user_id: UserId,
        username: String,
        score: i64,
        /// Race only: distance covered so far.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<f64>,
    },
    CorrectAnswer {
        user_id: UserId,
        username: String,
        question_idx: usize,
        points: i64,
        score: i64,
    },
    WrongAnswer {
        user_id: UserId,
        username: String,
        question_idx: usize,
    },
    PlayerGuess {
        user_id: UserId,
        username: String,
        guess: String,
        correct: bool,
        score: i64,
    },
    /// An action the room's game does not score, relayed verbatim.
    GameAction {
        user_id: UserId,
        username: String,
        action: String,
        payload: Value,
    },
    GameStateUpdate {
        game_data: GameData,
    },
    GameEnd {
        reason: EndReason,
        leaderboard: Vec<LeaderboardEntry>,
        winner: Option<LeaderboardEntry>,
        /// Milliseconds between round start and end.
        duration: u64,
    },
    Chat {
        user_id: UserId,
        username: String,
        message: String,
        timestamp: i64,
    },
    RoomList {
        rooms: Vec<RoomSummary>,
    },
    QueueJoined {
        game_type: GameType,
        /// 1-based position in the queue.
        position: usize,
    },
    MatchFound {
        room_id: RoomId,
        invite_code: String,
        game_type: GameType,
        players: Vec<PlayerView>,
    },
    MatchCancelled {
        game_type: GameType,
    },
    Pong {
        timestamp: i64,
    },
    Error {
        error: String,
    },
}

impl ServerMessage {
    /// Builds an `error` reply from anything displayable.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::Error { error: err.to_string() }
    }
}
