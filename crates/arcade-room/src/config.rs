//! Lobby-wide timings and per-room settings.

use std::time::Duration;

use arcade_protocol::GameType;

use crate::logic::default_round_duration;

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Server-wide room and matchmaking configuration.
///
/// The defaults are the production values; tests shorten them.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Seats in a room when `create_room` does not say otherwise.
    pub default_max_players: usize,

    /// Delay between the start being locked in and the round beginning.
    pub countdown: Duration,

    /// Grace period after a match is formed before the countdown starts
    /// on its own.
    pub match_grace: Duration,

    /// Entries needed in a queue before a match is formed.
    pub match_min_players: usize,

    /// Entries drained into a single matched room.
    pub match_max_players: usize,

    /// How often the sweeper runs.
    pub sweep_interval: Duration,

    /// An empty room older than this (since creation) is reclaimed.
    pub empty_room_ttl: Duration,

    /// A finished room older than this (since its round ended) is
    /// reclaimed.
    pub finished_room_ttl: Duration,

    /// A queue entry older than this is dropped.
    pub queue_entry_ttl: Duration,

    /// Chat messages are cut to this many characters.
    pub chat_max_chars: usize,

    /// Bounded command channel size of each room actor.
    pub command_buffer: usize,

    /// How long the sweeper waits for a room to answer before treating it
    /// as dead.
    pub room_probe_timeout: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            default_max_players: 10,
            countdown: Duration::from_millis(3000),
            match_grace: Duration::from_millis(2000),
            match_min_players: 2,
            match_max_players: 4,
            sweep_interval: Duration::from_secs(5 * 60),
            empty_room_ttl: Duration::from_secs(5 * 60),
            finished_room_ttl: Duration::from_secs(60),
            queue_entry_ttl: Duration::from_secs(2 * 60),
            chat_max_chars: 200,
            command_buffer: 64,
            room_probe_timeout: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// The fixed settings of one room, decided at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub max_players: usize,
    pub is_private: bool,
    pub round_duration: Duration,
    pub countdown: Duration,
    pub chat_max_chars: usize,
}

impl RoomSettings {
    /// Defaults for `game_type` under `lobby`: public, lobby seat count,
    /// the game's own round length.
    pub fn for_game(game_type: &GameType, lobby: &LobbyConfig) -> Self {
        Self {
            max_players: lobby.default_max_players,
            is_private: false,
            round_duration: default_round_duration(game_type),
            countdown: lobby.countdown,
            chat_max_chars: lobby.chat_max_chars,
        }
    }

    /// Overrides the seat count. Zero is raised to one.
    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players.max(1);
        self
    }

    pub fn with_private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Overrides the round length.
    pub fn with_round_duration(mut self, round_duration: Duration) -> Self {
        self.round_duration = round_duration;
        self
    }
}
