//! Error types for the room layer.
//!
//! Every variant's `Display` is the exact text sent back to the client in
//! an `error` reply.

use std::fmt;

use arcade_protocol::RoomId;

/// Operations reserved for the room's host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Start,
    UpdateState,
    End,
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::UpdateState => "update the game state",
            Self::End => "end the game",
        })
    }
}

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No live room matches the id or invite code.
    #[error("Room not found")]
    NotFound,

    /// Every seat is taken.
    #[error("Room is full")]
    RoomFull,

    /// The room left `waiting`; seats are locked.
    #[error("Game already started")]
    GameStarted,

    /// Starting requires at least two seated players.
    #[error("Need at least 2 players")]
    NeedPlayers,

    /// A non-host tried a host-only operation.
    #[error("Only the host can {0}")]
    NotHost(HostAction),

    /// The connection has no room association (or is not in this room).
    #[error("Not in a room")]
    NotInRoom,

    /// The operation needs the round to be running.
    #[error("Game not in progress")]
    NotPlaying,

    /// Spectators may watch and chat, nothing else.
    #[error("Spectators cannot perform game actions")]
    Spectator,

    /// The user id or the connection already holds a place in the room.
    #[error("Already in this room")]
    AlreadyInRoom,

    /// A host patch would change the game's data variant or field types.
    #[error("Invalid game data")]
    InvalidGameData,

    /// A chat message was blank after trimming.
    #[error("Message is empty")]
    EmptyMessage,

    /// A recognized game action carried a payload of the wrong shape.
    #[error("Invalid payload for action: {0}")]
    InvalidAction(String),

    /// The room's actor is gone or not answering. Clients see it as
    /// missing.
    #[error("Room not found")]
    Unavailable(RoomId),
}
