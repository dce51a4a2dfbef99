//! # Arcade
//!
//! Real-time mini-game rooms and matchmaking for web clients.
//!
//! Clients connect over WebSocket and exchange `{type, data}` JSON
//! frames. The server keeps every room as an isolated actor with its own
//! timers, pairs queued players into rooms, and relays game events to
//! everyone in a room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arcade::prelude::*;
//!
//! # async fn run() -> Result<(), ArcadeError> {
//! let server = ArcadeServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod logging;
mod router;
mod server;

pub use config::ServerConfig;
pub use error::ArcadeError;
pub use router::Router;
pub use server::{ArcadeServer, ArcadeServerBuilder};

/// Everything needed to run a server or drive the engine directly.
pub mod prelude {
    pub use crate::{ArcadeError, ArcadeServer, ArcadeServerBuilder, Router, ServerConfig};

    pub use arcade_protocol::{
        ClientMessage, Codec, EndReason, GameData, GameType, JsonCodec, ProtocolError, RoomId,
        RoomState, ServerMessage, UserId,
    };
    pub use arcade_room::{LobbyConfig, RoomError, RoomManager};
    pub use arcade_session::Peer;
    pub use arcade_transport::{ConnectionId, TransportError};
}
