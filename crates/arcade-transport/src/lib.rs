//! Transport abstraction layer for Arcade.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the server
//! uses to accept clients and exchange JSON text frames with them. The
//! game engine never touches a socket directly: it only sees connection
//! ids and the outbound channels built on top of them.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{IncomingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::time::Duration;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text payload. Binary payloads arrive here as lossy UTF-8.
    Text(String),
    /// Ping, pong or other control traffic: nothing to route, but the
    /// peer is alive.
    Keepalive,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A raw accepted connection that has not finished its handshake.
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    /// The connection type produced by a completed handshake.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next raw connection.
    ///
    /// Returns before any protocol handshake, so the caller can finish it
    /// on another task and one stalled client never holds up the listener.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;
}

/// An accepted connection waiting for its protocol handshake.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Identifier the finished connection will carry.
    fn id(&self) -> ConnectionId;

    /// Completes the handshake, giving up after `limit`.
    async fn handshake(self, limit: Duration) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that exchanges text frames.
///
/// Sending and receiving must be usable concurrently from two tasks: the
/// handler reads inbound frames while room broadcasts are written out.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one text frame to the remote peer.
    async fn send(&self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Frame>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
