//! The engine-side handle of one client connection.

use std::fmt;

use arcade_protocol::ServerMessage;
use arcade_transport::ConnectionId;
use tokio::sync::mpsc;

/// A client connection as seen by rooms and queues.
///
/// Cheap to clone: every clone feeds the same outbound channel, which the
/// connection's writer task drains onto the socket. When the connection
/// goes away the receiver is dropped and [`is_open`](Self::is_open)
/// turns false, which is how broadcasts know to skip it.
#[derive(Clone)]
pub struct Peer {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Peer {
    /// Wraps an existing outbound sender.
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { id, tx }
    }

    /// Creates a peer along with the receiving end of its outbound channel.
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    /// The connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the connection can still receive messages.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queues a message for delivery. Returns `false` if the connection is
    /// closed; the failure is otherwise swallowed so one dead recipient
    /// never interrupts a broadcast.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match self.tx.send(msg) {
            Ok(()) => true,
            Err(_) => {
                tracing::trace!(conn_id = %self.id, "dropping message for closed connection");
                false
            }
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Peer {}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish()
    }
}
