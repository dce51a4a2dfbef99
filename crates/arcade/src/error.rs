//! Unified error type for the Arcade server.

use arcade_protocol::ProtocolError;
use arcade_room::RoomError;
use arcade_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `Display` of the wrapped errors is passed through unchanged, so a
/// request failure can be sent to the client as-is.
#[derive(Debug, thiserror::Error)]
pub enum ArcadeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A malformed or unknown inbound message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room rejected the request.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An environment variable held an unusable value.
    #[error("invalid value {value:?} for {var}")]
    Config { var: &'static str, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
