//! Core protocol types shared by inbound and outbound messages.
//!
//! Everything in here travels on the wire, so field names follow the
//! JavaScript client's conventions: camelCase keys, camelCase game type
//! names, snake_case lifecycle values.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
///
/// Newtype over `String` so a room id can never be passed where a user id
/// or an invite code is expected. `#[serde(transparent)]` keeps the JSON
/// form a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A caller-supplied user identifier.
///
/// Connections are not authenticated: the client says who it is and the
/// server believes it. Clients send either a string or a number, so the
/// deserializer accepts both and normalizes to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => UserId(s),
            Raw::Int(n) => UserId(n.to_string()),
            Raw::Float(n) => UserId(n.to_string()),
        })
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// GameType
// ---------------------------------------------------------------------------

/// Which mini-game a room plays.
///
/// The set of real games is closed, but clients may name anything; an
/// unrecognized name becomes [`GameType::Other`] and gets the generic
/// relay behavior instead of a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameType {
    Race,
    ClickBattle,
    ReactionTime,
    Trivia,
    Scramble,
    WordGuess,
    Other(String),
}

impl GameType {
    /// The name used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Race => "race",
            Self::ClickBattle => "clickBattle",
            Self::ReactionTime => "reactionTime",
            Self::Trivia => "trivia",
            Self::Scramble => "scramble",
            Self::WordGuess => "wordGuess",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for GameType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "race" => Self::Race,
            "clickBattle" => Self::ClickBattle,
            "reactionTime" => Self::ReactionTime,
            "trivia" => Self::Trivia,
            "scramble" => Self::Scramble,
            "wordGuess" => Self::WordGuess,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for GameType {
    fn from(name: &str) -> Self {
        Self::from(name.to_owned())
    }
}

impl From<GameType> for String {
    fn from(game_type: GameType) -> Self {
        match game_type {
            GameType::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Waiting → Countdown → Playing → Finished
/// ```
///
/// - **Waiting**: accepting players, collecting ready flags.
/// - **Countdown**: start is locked in; the round begins when the
///   countdown timer fires.
/// - **Playing**: the round timer is armed and game actions are scored.
/// - **Finished**: terminal. The final leaderboard stays queryable until
///   the sweeper reclaims the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Waiting,
    Countdown,
    Playing,
    Finished,
}

impl RoomState {
    /// Returns `true` if the room accepts new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// The state this one advances to, or `None` for the terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Countdown),
            Self::Countdown => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` is allowed.
    ///
    /// Besides the forward step, a room may jump to `Finished` from
    /// `Countdown` when the host forces the end before the round starts.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (self == Self::Countdown && target == Self::Finished)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Countdown => "countdown",
            Self::Playing => "playing",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The round timer fired.
    TimeUp,
    /// A race participant crossed the finish line.
    PlayerFinished,
    /// Someone guessed the word.
    WordSolved,
    /// The host sent `game_result`.
    HostEnded,
}

// ---------------------------------------------------------------------------
// GameData: per-game shared payload, generated at round start
// ---------------------------------------------------------------------------

/// A trivia question as shipped to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options` of the right answer.
    pub correct: usize,
}

/// The shared payload every participant receives in `game_start`.
///
/// A tagged union keyed by game: each variant is the complete data
/// contract for one game type. The `kind` tag lets clients (and the
/// host-patch path) tell variants apart without knowing the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameData {
    Race { distance: u32 },
    ClickBattle,
    ReactionTime { rounds: u32 },
    Trivia { questions: Vec<TriviaQuestion> },
    Scramble { scrambled: String, word: String, length: usize },
    WordGuess { hint: String, word: String, length: usize },
    Empty,
}

impl GameData {
    /// Merges the top-level keys of `patch` into this payload.
    ///
    /// The result must still decode as the same variant; a patch that
    /// switches `kind` or breaks a field's type is rejected.
    pub fn merged(&self, patch: &serde_json::Value) -> Option<Self> {
        let serde_json::Value::Object(changes) = patch else {
            return None;
        };
        let mut current = serde_json::to_value(self).ok()?;
        let fields = current.as_object_mut()?;
        for (key, value) in changes {
            fields.insert(key.clone(), value.clone());
        }
        let merged: Self = serde_json::from_value(current).ok()?;
        (std::mem::discriminant(&merged) == std::mem::discriminant(self)).then_some(merged)
    }
}

// ---------------------------------------------------------------------------
// Views: read-only projections of room state
// ---------------------------------------------------------------------------

/// One seat as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: UserId,
    pub username: String,
    pub score: i64,
    pub ready: bool,
    pub is_host: bool,
}

/// A ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub user_id: UserId,
    pub username: String,
    pub score: i64,
}

/// A public room as listed by `list_rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub game_type: GameType,
    pub state: RoomState,
    pub player_count: usize,
    pub max_players: usize,
    pub invite_code: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}
