//! Error types for the session layer.

use arcade_transport::ConnectionId;

/// Errors raised when looking up a connection's association.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection is not a player or spectator anywhere.
    ///
    /// Every room-scoped request starts by resolving the sender's room,
    /// so this is the error for "you have to join something first".
    #[error("Not in a room")]
    NotInRoom(ConnectionId),
}
