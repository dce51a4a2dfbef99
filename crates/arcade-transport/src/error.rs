/// Errors raised while accepting or talking to a client connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing an outbound frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading an inbound frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The client did not complete the WebSocket upgrade.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The client did not complete the WebSocket upgrade in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimedOut(std::time::Duration),
}
