//! Error types for the protocol layer.
//!
//! The `Display` text of each variant is exactly what the client sees in
//! an `error` reply, so keep these short and user-facing. The underlying
//! serde error is kept as the `source` for logging.

/// Errors that can occur while decoding or encoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound message failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a JSON object with a string `type`.
    #[error("Invalid message")]
    Decode(#[source] serde_json::Error),

    /// The `type` is well-formed but not one the server understands.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// The `data` object does not match the shape of its `type`
    /// (e.g. `maxPlayers: "ten"`).
    #[error("Invalid message")]
    InvalidPayload {
        /// The message type whose payload failed to decode.
        kind: String,
        /// The serde error describing the mismatch.
        #[source]
        source: serde_json::Error,
    },

    /// A field the operation cannot proceed without is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

impl ProtocolError {
    /// Unwraps an optional request field, naming it in the error if absent.
    pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T, Self> {
        value.ok_or(Self::MissingField(field))
    }
}
