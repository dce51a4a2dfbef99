//! Codec trait and the JSON implementation.
//!
//! The server speaks JSON text frames. Everything that turns Rust values
//! into frames (and back) goes through a [`Codec`], so the handler and the
//! tests never call `serde_json` directly.

use serde::{de::DeserializeOwned, Serialize};

use crate::{ClientMessage, Envelope, ProtocolError};

/// Encodes values to text frames and decodes text frames back.
///
/// `Send + Sync + 'static` because one codec is shared by every
/// connection task through the server state.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame into a value.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;

    /// Decodes an inbound frame into a [`ClientMessage`].
    ///
    /// A frame that is not an object with a string `type` fails with
    /// [`ProtocolError::Decode`]; an unrecognized `type` with
    /// [`ProtocolError::UnknownType`].
    fn decode_client(&self, text: &str) -> Result<ClientMessage, ProtocolError> {
        let envelope: Envelope = self.decode(text)?;
        ClientMessage::try_from(envelope)
    }
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use arcade_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let msg = codec.decode_client(r#"{"type":"ping"}"#).unwrap();
/// assert_eq!(msg, ClientMessage::Ping);
///
/// let frame = codec.encode(&ServerMessage::Pong { timestamp: 1 }).unwrap();
/// assert_eq!(frame, r#"{"type":"pong","data":{"timestamp":1}}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
