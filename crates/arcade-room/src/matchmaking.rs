//! Per-game-type FIFO of players waiting for a match.
//!
//! A `MatchQueue` is plain data; the [`RoomManager`](crate::RoomManager)
//! keeps one per game type, each behind its own mutex, and turns drained
//! entries into rooms.

use std::collections::VecDeque;
use std::time::Duration;

use arcade_protocol::UserId;
use arcade_session::Peer;
use arcade_transport::ConnectionId;
use tokio::time::Instant;

/// One player waiting in a queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub peer: Peer,
    pub user_id: UserId,
    pub username: String,
    pub queued_at: Instant,
}

impl QueueEntry {
    /// An entry queued now.
    pub fn new(peer: Peer, user_id: UserId, username: String) -> Self {
        Self {
            peer,
            user_id,
            username,
            queued_at: Instant::now(),
        }
    }
}

/// FIFO of entries for one game type. At most one entry per user id and
/// one per connection, so a match never seats a connection twice.
#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<QueueEntry>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`, first dropping any earlier entry for the same user
    /// or the same connection.
    pub fn enqueue(&mut self, entry: QueueEntry) {
        let conn = entry.peer.id();
        self.entries
            .retain(|e| e.user_id != entry.user_id && e.peer.id() != conn);
        self.entries.push_back(entry);
    }

    /// Removes the entry for `user_id`. Returns `true` if one existed.
    pub fn remove(&mut self, user_id: &UserId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.user_id != user_id);
        self.entries.len() != before
    }

    /// Removes every entry queued from `conn`. Returns how many.
    pub fn remove_conn(&mut self, conn: ConnectionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.peer.id() != conn);
        before - self.entries.len()
    }

    /// Drops entries whose connection has closed. Returns how many.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.peer.is_open());
        before - self.entries.len()
    }

    /// Drops closed entries and entries older than `ttl` at `now`.
    /// Returns how many.
    pub fn prune(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.peer.is_open() && now.saturating_duration_since(e.queued_at) < ttl);
        before - self.entries.len()
    }

    /// Takes up to `max` entries from the front, but only once at least
    /// `min` are waiting. Closed connections are pruned first.
    pub fn drain_match(&mut self, min: usize, max: usize) -> Option<Vec<QueueEntry>> {
        self.prune_closed();
        if self.entries.len() < min.max(1) {
            return None;
        }
        let take = self.entries.len().min(max);
        Some(self.entries.drain(..take).collect())
    }

    /// 1-based position of `user_id`, if queued.
    pub fn position_of(&self, user_id: &UserId) -> Option<usize> {
        self.entries.iter().position(|e| &e.user_id == user_id).map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
