//! Room manager: creates, tracks, and routes connections to rooms.
//!
//! # Locking
//!
//! Three independent pieces of shared state, each behind its own
//! `tokio::sync::Mutex`:
//!
//! - the room index (handles by id, plus the invite code index),
//! - the session registry (which room each connection is in),
//! - the match queues, one mutex per game type.
//!
//! Locks are held only for map operations. Talking to a room always
//! happens on a cloned [`RoomHandle`] after the lock is released, so a
//! busy room never stalls unrelated ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arcade_protocol::{GameType, RoomId, RoomState, RoomSummary, ServerMessage, UserId};
use arcade_session::{Peer, Role, SessionRegistry};
use arcade_transport::ConnectionId;
use rand::Rng;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::room::{spawn_room, Entrant};
use crate::{LobbyConfig, MatchQueue, QueueEntry, RoomError, RoomHandle, RoomInfo, RoomSettings};

const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 5;

fn random_code(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect()
}

/// A `create_room` request with required fields already checked.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub game_type: GameType,
    pub user_id: UserId,
    pub username: String,
    pub max_players: Option<usize>,
    pub is_private: bool,
    pub round_duration: Option<Duration>,
}

/// What one sweeper pass reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rooms_reclaimed: usize,
    pub queue_entries_dropped: usize,
}

#[derive(Default)]
struct RoomIndex {
    rooms: HashMap<RoomId, RoomHandle>,
    /// Invite code → room id. Codes are unique among live rooms.
    invites: HashMap<String, RoomId>,
}

/// Manages all live rooms, connection associations, and match queues.
///
/// Shared by every connection task behind an `Arc`; all methods take
/// `&self`.
pub struct RoomManager {
    config: LobbyConfig,
    index: Mutex<RoomIndex>,
    sessions: Mutex<SessionRegistry>,
    queues: Mutex<HashMap<GameType, Arc<Mutex<MatchQueue>>>>,
    next_room: AtomicU64,
}

impl RoomManager {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            config,
            index: Mutex::new(RoomIndex::default()),
            sessions: Mutex::new(SessionRegistry::new()),
            queues: Mutex::new(HashMap::new()),
            next_room: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    // -- registry -----------------------------------------------------------

    /// Spawns a room seated with `founders` and indexes it.
    ///
    /// `announce` runs before the room becomes reachable by id or invite
    /// code, so whatever it sends arrives ahead of any room event.
    async fn register(
        &self,
        game_type: GameType,
        settings: RoomSettings,
        founders: Vec<Entrant>,
        announce: impl FnOnce(&RoomHandle, &RoomSettings),
    ) -> RoomHandle {
        let mut index = self.index.lock().await;

        let invite_code = loop {
            let code = random_code(INVITE_ALPHABET, INVITE_LEN);
            if !index.invites.contains_key(&code) {
                break code;
            }
        };
        let n = self.next_room.fetch_add(1, Ordering::Relaxed);
        let room_id = RoomId(format!("room_{n}_{}", random_code(SUFFIX_ALPHABET, SUFFIX_LEN)));

        let handle = spawn_room(
            room_id.clone(),
            invite_code.clone(),
            game_type.clone(),
            settings.clone(),
            founders,
            self.config.command_buffer,
        );
        announce(&handle, &settings);

        index.invites.insert(invite_code.clone(), room_id.clone());
        index.rooms.insert(room_id.clone(), handle.clone());
        info!(%room_id, %invite_code, %game_type, "room created");
        handle
    }

    /// Finds a room by id, or by invite code in any letter case.
    async fn resolve(&self, game_id: &str) -> Option<RoomHandle> {
        let index = self.index.lock().await;
        if let Some(handle) = index.rooms.get(&RoomId(game_id.to_owned())) {
            return Some(handle.clone());
        }
        let room_id = index.invites.get(&game_id.trim().to_ascii_uppercase())?;
        index.rooms.get(room_id).cloned()
    }

    /// Drops a room from the index and detaches every connection in it.
    async fn remove_room(&self, room_id: &RoomId) -> Option<RoomHandle> {
        let handle = {
            let mut index = self.index.lock().await;
            let handle = index.rooms.remove(room_id)?;
            index.invites.remove(handle.invite_code());
            handle
        };
        let detached = self.sessions.lock().await.detach_room(room_id);
        info!(%room_id, detached = detached.len(), "room removed");
        Some(handle)
    }

    /// Removes `conn` from the room actor, deleting the room if it was
    /// the last player. Does not touch the session registry.
    async fn depart(&self, conn: ConnectionId, room_id: &RoomId) {
        let handle = self.index.lock().await.rooms.get(room_id).cloned();
        let Some(handle) = handle else {
            return;
        };
        match handle.leave(conn).await {
            Ok(outcome) if outcome.closed => {
                self.remove_room(room_id).await;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%room_id, conn_id = %conn, %err, "room did not answer leave, removing it");
                self.remove_room(room_id).await;
            }
        }
    }

    /// Associates `conn` with `room_id` and leaves whatever room the
    /// association replaced.
    ///
    /// The swap happens under one lock, so when a join and a match race for
    /// the same connection the later attach wins and the seat it displaced
    /// is released.
    async fn attach(&self, conn: ConnectionId, room_id: &RoomId, role: Role) {
        let replaced = self.sessions.lock().await.attach(conn, room_id.clone(), role);
        if let Some(replaced) = replaced.filter(|m| &m.room_id != room_id) {
            debug!(conn_id = %conn, from = %replaced.room_id, to = %room_id, "association replaced");
            self.depart(conn, &replaced.room_id).await;
        }
    }

    /// The handle of the room `conn` is associated with.
    async fn room_for(&self, conn: ConnectionId) -> Result<RoomHandle, RoomError> {
        let room_id = self
            .sessions
            .lock()
            .await
            .require(conn)
            .map_err(|_| RoomError::NotInRoom)?
            .room_id
            .clone();
        self.index
            .lock()
            .await
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::NotFound)
    }

    // -- membership ---------------------------------------------------------

    /// Creates a room with the sender as host and sole player, and replies
    /// `room_created`. A connection already in a room leaves it first.
    pub async fn create_room(&self, peer: &Peer, req: NewRoom) -> Result<RoomId, RoomError> {
        let conn = peer.id();
        let previous = self.sessions.lock().await.detach(conn);
        if let Some(previous) = previous {
            self.depart(conn, &previous.room_id).await;
        }

        let mut settings = RoomSettings::for_game(&req.game_type, &self.config)
            .with_private(req.is_private);
        if let Some(max) = req.max_players {
            settings = settings.with_max_players(max);
        }
        if let Some(round) = req.round_duration {
            settings = settings.with_round_duration(round);
        }

        let founder = Entrant {
            peer: peer.clone(),
            user_id: req.user_id,
            username: req.username,
        };
        let game_type = req.game_type;
        let handle = self
            .register(game_type.clone(), settings, vec![founder], |handle, settings| {
                peer.send(ServerMessage::RoomCreated {
                    room_id: handle.room_id().clone(),
                    invite_code: handle.invite_code().to_owned(),
                    game_type: game_type.clone(),
                    player_count: 1,
                    max_players: settings.max_players,
                });
            })
            .await;

        let room_id = handle.room_id().clone();
        self.attach(conn, &room_id, Role::Player).await;
        Ok(room_id)
    }

    /// Joins a room by id or invite code, as a player or a spectator.
    ///
    /// The room replies `joined`/`joined_spectator` itself. If the
    /// connection was in another room it leaves that one once the join
    /// has succeeded; a failed join leaves it where it was.
    pub async fn join_room(
        &self,
        peer: &Peer,
        game_id: &str,
        user_id: UserId,
        username: String,
        spectate: bool,
    ) -> Result<RoomId, RoomError> {
        let conn = peer.id();
        let handle = self.resolve(game_id).await.ok_or(RoomError::NotFound)?;
        let room_id = handle.room_id().clone();

        let current = self.sessions.lock().await.room_of(conn).map(|m| m.room_id.clone());
        if current.as_ref() == Some(&room_id) {
            return Err(RoomError::AlreadyInRoom);
        }

        let entrant = Entrant {
            peer: peer.clone(),
            user_id,
            username,
        };
        let role = if spectate {
            handle.spectate(entrant).await?;
            Role::Spectator
        } else {
            handle.join(entrant).await?;
            Role::Player
        };

        self.attach(conn, &room_id, role).await;
        Ok(room_id)
    }

    /// Leaves the connection's room. Returns the room it left.
    pub async fn leave(&self, conn: ConnectionId) -> Result<RoomId, RoomError> {
        let membership = self
            .sessions
            .lock()
            .await
            .detach(conn)
            .ok_or(RoomError::NotInRoom)?;
        self.depart(conn, &membership.room_id).await;
        Ok(membership.room_id)
    }

    /// The connection-closed hook: drops its queue entries and leaves its
    /// room without replying.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let queues: Vec<Arc<Mutex<MatchQueue>>> = self.queues.lock().await.values().cloned().collect();
        let mut dequeued = 0;
        for queue in queues {
            dequeued += queue.lock().await.remove_conn(conn);
        }
        let left = self.leave(conn).await.ok();
        debug!(conn_id = %conn, dequeued, left = ?left, "connection cleaned up");
    }

    // -- room-scoped operations ----------------------------------------------

    pub async fn ready(&self, conn: ConnectionId, ready: bool) -> Result<(), RoomError> {
        self.room_for(conn).await?.ready(conn, ready).await
    }

    pub async fn start(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.room_for(conn).await?.start(conn).await
    }

    pub async fn action(
        &self,
        conn: ConnectionId,
        action: String,
        payload: Value,
    ) -> Result<(), RoomError> {
        self.room_for(conn).await?.action(conn, action, payload).await
    }

    pub async fn patch_state(&self, conn: ConnectionId, patch: Value) -> Result<(), RoomError> {
        self.room_for(conn).await?.patch_state(conn, patch).await
    }

    pub async fn force_end(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.room_for(conn).await?.force_end(conn).await
    }

    pub async fn chat(&self, conn: ConnectionId, message: String) -> Result<(), RoomError> {
        self.room_for(conn).await?.chat(conn, message).await
    }

    // -- queries ------------------------------------------------------------

    /// Public, unfinished rooms, optionally of one game type, oldest first.
    ///
    /// Rooms that fail to answer are skipped.
    pub async fn list_rooms(&self, game_type: Option<&GameType>) -> Vec<RoomSummary> {
        let handles: Vec<RoomHandle> = self.index.lock().await.rooms.values().cloned().collect();
        let mut rooms = Vec::with_capacity(handles.len());
        for handle in handles {
            let Ok(info) = handle.info().await else {
                continue;
            };
            let listed = !info.is_private
                && info.state != RoomState::Finished
                && game_type.is_none_or(|wanted| &info.game_type == wanted);
            if listed {
                rooms.push(info.summary());
            }
        }
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        rooms
    }

    /// Snapshot of a room by id or invite code.
    pub async fn room_info(&self, game_id: &str) -> Result<RoomInfo, RoomError> {
        self.resolve(game_id).await.ok_or(RoomError::NotFound)?.info().await
    }

    /// The room `conn` is in, if any.
    pub async fn room_of(&self, conn: ConnectionId) -> Option<RoomId> {
        self.sessions
            .lock()
            .await
            .room_of(conn)
            .map(|m| m.room_id.clone())
    }

    pub async fn room_count(&self) -> usize {
        self.index.lock().await.rooms.len()
    }

    // -- matchmaking --------------------------------------------------------

    async fn queue(&self, game_type: &GameType) -> Arc<Mutex<MatchQueue>> {
        let mut queues = self.queues.lock().await;
        Arc::clone(
            queues
                .entry(game_type.clone())
                .or_insert_with(|| Arc::new(Mutex::new(MatchQueue::new()))),
        )
    }

    /// Entries waiting in `game_type`'s queue.
    pub async fn queue_len(&self, game_type: &GameType) -> usize {
        let queue = self.queues.lock().await.get(game_type).cloned();
        match queue {
            Some(queue) => queue.lock().await.len(),
            None => 0,
        }
    }

    /// Queues the sender and replies `queue_joined`. When enough live
    /// entries are waiting, forms a room from the front of the queue and
    /// returns its id.
    pub async fn find_match(
        &self,
        peer: &Peer,
        game_type: GameType,
        user_id: UserId,
        username: String,
    ) -> Option<RoomId> {
        let queue = self.queue(&game_type).await;
        let drained = {
            let mut queue = queue.lock().await;
            queue.prune_closed();
            queue.enqueue(QueueEntry::new(peer.clone(), user_id.clone(), username));
            let position = queue.position_of(&user_id).unwrap_or_else(|| queue.len());
            peer.send(ServerMessage::QueueJoined {
                game_type: game_type.clone(),
                position,
            });
            debug!(%game_type, position, "queued for match");
            queue.drain_match(self.config.match_min_players, self.config.match_max_players)
        }?;
        Some(self.form_match(game_type, drained).await)
    }

    /// Turns drained queue entries into a public room, first entry as
    /// host, and arms its auto-start grace timer.
    async fn form_match(&self, game_type: GameType, entries: Vec<QueueEntry>) -> RoomId {
        for entry in &entries {
            let conn = entry.peer.id();
            let previous = self.sessions.lock().await.detach(conn);
            if let Some(previous) = previous {
                self.depart(conn, &previous.room_id).await;
            }
        }

        let founders: Vec<Entrant> = entries
            .iter()
            .map(|e| Entrant {
                peer: e.peer.clone(),
                user_id: e.user_id.clone(),
                username: e.username.clone(),
            })
            .collect();
        let settings = RoomSettings::for_game(&game_type, &self.config);
        let handle = self
            .register(game_type.clone(), settings, founders, |_, _| {})
            .await;
        let room_id = handle.room_id().clone();

        for entry in &entries {
            self.attach(entry.peer.id(), &room_id, Role::Player).await;
        }

        let players = match handle.info().await {
            Ok(info) => info.players,
            Err(_) => Vec::new(),
        };
        for entry in &entries {
            entry.peer.send(ServerMessage::MatchFound {
                room_id: room_id.clone(),
                invite_code: handle.invite_code().to_owned(),
                game_type: game_type.clone(),
                players: players.clone(),
            });
        }
        if let Err(err) = handle.schedule_auto_start(self.config.match_grace).await {
            warn!(%room_id, %err, "could not arm match auto-start");
        }

        info!(%room_id, %game_type, players = entries.len(), "match formed");
        room_id
    }

    /// Removes `user_id` from `game_type`'s queue if present and replies
    /// `match_cancelled` either way. Returns whether an entry was removed.
    pub async fn cancel_match(&self, peer: &Peer, game_type: GameType, user_id: &UserId) -> bool {
        let queue = self.queues.lock().await.get(&game_type).cloned();
        let removed = match queue {
            Some(queue) => queue.lock().await.remove(user_id),
            None => false,
        };
        debug!(%game_type, %user_id, removed, "match cancelled");
        peer.send(ServerMessage::MatchCancelled { game_type });
        removed
    }

    // -- sweeping -----------------------------------------------------------

    /// One cleanup pass: reclaims idle empty rooms, expired finished rooms,
    /// and rooms whose actor no longer answers; drops stale or closed queue
    /// entries.
    pub async fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let cfg = &self.config;
        let mut report = SweepReport::default();

        let handles: Vec<RoomHandle> = self.index.lock().await.rooms.values().cloned().collect();
        for handle in handles {
            let reclaim = match timeout(cfg.room_probe_timeout, handle.info()).await {
                Ok(Ok(info)) => {
                    let idle_empty = info.players.is_empty()
                        && now.saturating_duration_since(info.created) >= cfg.empty_room_ttl;
                    let expired = info.state == RoomState::Finished
                        && info
                            .ended
                            .is_some_and(|ended| now.saturating_duration_since(ended) >= cfg.finished_room_ttl);
                    idle_empty || expired
                }
                Ok(Err(_)) | Err(_) => true,
            };
            if !reclaim {
                continue;
            }
            if let Some(handle) = self.remove_room(handle.room_id()).await {
                let _ = timeout(cfg.room_probe_timeout, handle.shutdown()).await;
                report.rooms_reclaimed += 1;
            }
        }

        let queues: Vec<Arc<Mutex<MatchQueue>>> = self.queues.lock().await.values().cloned().collect();
        for queue in queues {
            report.queue_entries_dropped += queue.lock().await.prune(now, cfg.queue_entry_ttl);
        }

        if report != SweepReport::default() {
            info!(
                rooms = report.rooms_reclaimed,
                queue_entries = report.queue_entries_dropped,
                "sweep reclaimed resources"
            );
        }
        report
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(LobbyConfig::default())
    }
}
