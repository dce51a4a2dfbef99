//! Which room each connection belongs to.
//!
//! The registry is the "per-connection tag" store: room handlers resolve
//! the sender's room through it instead of trusting a room id in the
//! request.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain `HashMap`. The room manager keeps it
//! behind its own `tokio::sync::Mutex`, held only for the map operation.

use std::collections::HashMap;

use arcade_protocol::RoomId;
use arcade_transport::ConnectionId;

use crate::SessionError;

/// How a connection takes part in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Occupies a seat, counts toward `maxPlayers`.
    Player,
    /// Watches only.
    Spectator,
}

/// A connection's association with a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: RoomId,
    pub role: Role,
}

/// Maps connections to the room they are in. At most one room per
/// connection.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    members: HashMap<ConnectionId, Membership>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `conn` with a room, returning the association it
    /// replaced.
    pub fn attach(&mut self, conn: ConnectionId, room_id: RoomId, role: Role) -> Option<Membership> {
        tracing::debug!(conn_id = %conn, %room_id, ?role, "connection attached");
        self.members.insert(conn, Membership { room_id, role })
    }

    /// Removes `conn`'s association, if any.
    pub fn detach(&mut self, conn: ConnectionId) -> Option<Membership> {
        self.members.remove(&conn)
    }

    /// The room `conn` is in, if any.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&Membership> {
        self.members.get(&conn)
    }

    /// Like [`room_of`](Self::room_of) but an absent association is an error.
    pub fn require(&self, conn: ConnectionId) -> Result<&Membership, SessionError> {
        self.room_of(conn).ok_or(SessionError::NotInRoom(conn))
    }

    /// Drops every association pointing at `room_id`. Returns the
    /// connections that were detached.
    pub fn detach_room(&mut self, room_id: &RoomId) -> Vec<ConnectionId> {
        let conns: Vec<ConnectionId> = self
            .members
            .iter()
            .filter(|(_, m)| &m.room_id == room_id)
            .map(|(conn, _)| *conn)
            .collect();
        for conn in &conns {
            self.members.remove(conn);
        }
        conns
    }

    /// Number of associated connections.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no connection is associated with any room.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
