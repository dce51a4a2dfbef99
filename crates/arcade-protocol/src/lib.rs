//! Wire protocol for Arcade.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): inbound
//!   requests and outbound events/replies.
//! - **Types** ([`GameType`], [`GameData`], [`RoomState`], ids, views):
//!   the data contracts those messages carry.
//! - **Codec** ([`Codec`], [`JsonCodec`]): text frame encoding.
//! - **Errors** ([`ProtocolError`]): decoding failures, with display
//!   strings suitable for `error` replies.
//!
//! It knows nothing about connections or rooms.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use messages::{
    CancelMatch, ChatRequest, ClientMessage, CreateRoom, Envelope, FindMatch, GameActionRequest,
    GameStateUpdate, JoinGame, ListRooms, PlayerReady, ServerMessage,
};
pub use types::{
    EndReason, GameData, GameType, LeaderboardEntry, PlayerView, RoomId, RoomState, RoomSummary,
    TriviaQuestion, UserId,
};
