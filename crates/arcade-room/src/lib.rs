//! Room lifecycle, game rules, and matchmaking for Arcade.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! players, spectators, scores, and timers. Everything outside talks to a
//! room through a [`RoomHandle`].
//!
//! # Key types
//!
//! - [`RoomManager`]: room registry, invite codes, connection
//!   associations, and the per-game-type match queues
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomInfo`]: a point-in-time snapshot of one room
//! - [`MatchQueue`]: FIFO of players waiting for a game
//! - [`LobbyConfig`] / [`RoomSettings`]: timings and limits
//! - [`spawn_sweeper`]: background reclamation of idle rooms and stale
//!   queue entries

mod config;
mod content;
mod error;
mod logic;
mod manager;
mod matchmaking;
mod room;
mod sweeper;

pub use config::{LobbyConfig, RoomSettings};
pub use error::{HostAction, RoomError};
pub use logic::{default_round_duration, generate_game_data, leaderboard};
pub use manager::{NewRoom, RoomManager, SweepReport};
pub use matchmaking::{MatchQueue, QueueEntry};
pub use room::{LeaveOutcome, RoomHandle, RoomInfo};
pub use sweeper::spawn_sweeper;
