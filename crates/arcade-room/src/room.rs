//! Room actor: an isolated Tokio task that owns one game instance.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Commands are processed one at a time to
//! completion, and timer expiries are branches of the same `select!` loop,
//! so nothing else can observe a room halfway through a transition.
//!
//! ```text
//! Waiting ──(all ready / host start / match grace)──→ Countdown
//! Countdown ──(countdown timer)──→ Playing
//! Playing ──(round timer / early end / host end)──→ Finished
//! ```
//!
//! While `Waiting` only the match grace timer may be armed; leaving
//! `Waiting` cancels it.

use std::ops::ControlFlow;
use std::time::Duration;

use arcade_protocol::{
    EndReason, GameData, GameType, LeaderboardEntry, PlayerView, RoomId, RoomState, RoomSummary,
    ServerMessage, UserId,
};
use arcade_session::Peer;
use arcade_timer::Timer;
use arcade_transport::ConnectionId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::logic::{self, Resolution, Tally};
use crate::{HostAction, RoomError, RoomSettings};

/// Fewest seated players a round can start with.
const MIN_PLAYERS: usize = 2;

/// Wall-clock Unix epoch milliseconds, for timestamps on the wire.
pub(crate) fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Someone entering a room, as a player or a spectator.
#[derive(Debug, Clone)]
pub(crate) struct Entrant {
    pub peer: Peer,
    pub user_id: UserId,
    pub username: String,
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in most variants is the reply channel: the
/// caller sends a command and waits for the verdict on it.
pub(crate) enum RoomCommand {
    Join { entrant: Entrant, reply: Reply<()> },
    Spectate { entrant: Entrant, reply: Reply<()> },
    Leave { conn: ConnectionId, reply: oneshot::Sender<LeaveOutcome> },
    Ready { conn: ConnectionId, ready: bool, reply: Reply<()> },
    Start { conn: ConnectionId, reply: Reply<()> },
    Action { conn: ConnectionId, action: String, payload: Value, reply: Reply<()> },
    PatchState { conn: ConnectionId, patch: Value, reply: Reply<()> },
    ForceEnd { conn: ConnectionId, reply: Reply<()> },
    Chat { conn: ConnectionId, message: String, reply: Reply<()> },
    /// Arm the matchmaking grace timer.
    ScheduleAutoStart { after: Duration },
    GetInfo { reply: oneshot::Sender<RoomInfo> },
    Shutdown,
}

/// What a leave did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The connection was a player or spectator of the room.
    pub was_member: bool,
    /// Seated players after the leave.
    pub remaining_players: usize,
    /// The last player left and the actor has stopped.
    pub closed: bool,
}

/// A snapshot of one room.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub invite_code: String,
    pub game_type: GameType,
    pub state: RoomState,
    pub host_id: Option<UserId>,
    /// Seated players in seat order.
    pub players: Vec<PlayerView>,
    pub spectator_count: usize,
    pub max_players: usize,
    pub is_private: bool,
    pub game_data: GameData,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Monotonic creation time, for idle checks.
    pub created: Instant,
    /// Monotonic time the round ended, once finished.
    pub ended: Option<Instant>,
}

impl RoomInfo {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Current standings, highest score first.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        logic::leaderboard(&self.players)
    }

    /// The public listing row for this room.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.room_id.clone(),
            game_type: self.game_type.clone(),
            state: self.state,
            player_count: self.players.len(),
            max_players: self.max_players,
            invite_code: self.invite_code.clone(),
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone; the `RoomManager` keeps one per room and hands out
/// clones so callers never hold the registry lock while talking to a room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    invite_code: String,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn invite_code(&self) -> &str {
        &self.invite_code
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    pub(crate) async fn join(&self, entrant: Entrant) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join { entrant, reply }).await?
    }

    pub(crate) async fn spectate(&self, entrant: Entrant) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Spectate { entrant, reply }).await?
    }

    /// Removes a player or spectator.
    pub async fn leave(&self, conn: ConnectionId) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { conn, reply }).await
    }

    /// Sets the sender's ready flag.
    pub async fn ready(&self, conn: ConnectionId, ready: bool) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Ready { conn, ready, reply }).await?
    }

    /// Host-only explicit start.
    pub async fn start(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start { conn, reply }).await?
    }

    /// A game action from a seated player.
    pub async fn action(
        &self,
        conn: ConnectionId,
        action: String,
        payload: Value,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Action { conn, action, payload, reply })
            .await?
    }

    /// Host-only merge into the round's game data.
    pub async fn patch_state(&self, conn: ConnectionId, patch: Value) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::PatchState { conn, patch, reply })
            .await?
    }

    /// Host-only forced end of the round.
    pub async fn force_end(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::ForceEnd { conn, reply }).await?
    }

    pub async fn chat(&self, conn: ConnectionId, message: String) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Chat { conn, message, reply }).await?
    }

    /// Starts the countdown after `after` if the room is then still
    /// waiting with enough players (fire-and-forget).
    pub async fn schedule_auto_start(&self, after: Duration) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::ScheduleAutoStart { after })
            .await
            .map_err(|_| self.unavailable())
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Stops the actor. Its timers are dropped with it.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Who receives a room event.
enum Recipient {
    All,
    AllExcept(ConnectionId),
    Only(ConnectionId),
}

impl Recipient {
    fn includes(&self, conn: ConnectionId) -> bool {
        match self {
            Self::All => true,
            Self::AllExcept(excluded) => *excluded != conn,
            Self::Only(target) => *target == conn,
        }
    }
}

struct Seat {
    peer: Peer,
    user_id: UserId,
    username: String,
    ready: bool,
    tally: Tally,
}

impl From<Entrant> for Seat {
    fn from(entrant: Entrant) -> Self {
        Self {
            peer: entrant.peer,
            user_id: entrant.user_id,
            username: entrant.username,
            ready: false,
            tally: Tally::default(),
        }
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    invite_code: String,
    game_type: GameType,
    settings: RoomSettings,
    state: RoomState,
    /// Seat order is join order; it breaks leaderboard ties and picks the
    /// next host.
    seats: Vec<Seat>,
    spectators: Vec<Entrant>,
    host: Option<ConnectionId>,
    game_data: GameData,
    created: Instant,
    created_at: i64,
    started: Option<Instant>,
    ended: Option<Instant>,
    countdown: Timer,
    round: Timer,
    auto_start: Timer,
    rng: StdRng,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until the room empties or is shut down.
    async fn run(mut self) {
        info!(room_id = %self.room_id, game_type = %self.game_type, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd).is_break() {
                        break;
                    }
                }
                () = self.countdown.fired() => self.begin_round(),
                () = self.round.fired() => self.end(EndReason::TimeUp),
                () = self.auto_start.fired() => self.auto_start_fired(),
            }
        }

        info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join { entrant, reply } => {
                let _ = reply.send(self.handle_join(entrant));
            }
            RoomCommand::Spectate { entrant, reply } => {
                let _ = reply.send(self.handle_spectate(entrant));
            }
            RoomCommand::Leave { conn, reply } => {
                let outcome = self.handle_leave(conn);
                let _ = reply.send(outcome);
                if outcome.closed {
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::Ready { conn, ready, reply } => {
                let _ = reply.send(self.handle_ready(conn, ready));
            }
            RoomCommand::Start { conn, reply } => {
                let _ = reply.send(self.handle_start(conn));
            }
            RoomCommand::Action { conn, action, payload, reply } => {
                let _ = reply.send(self.handle_action(conn, action, payload));
            }
            RoomCommand::PatchState { conn, patch, reply } => {
                let _ = reply.send(self.handle_patch(conn, &patch));
            }
            RoomCommand::ForceEnd { conn, reply } => {
                let _ = reply.send(self.handle_force_end(conn));
            }
            RoomCommand::Chat { conn, message, reply } => {
                let _ = reply.send(self.handle_chat(conn, &message));
            }
            RoomCommand::ScheduleAutoStart { after } => {
                if self.state == RoomState::Waiting {
                    self.auto_start.arm(after);
                }
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                info!(room_id = %self.room_id, state = %self.state, "room shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // -- membership ---------------------------------------------------------

    fn handle_join(&mut self, entrant: Entrant) -> Result<(), RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::GameStarted);
        }
        let conn = entrant.peer.id();
        if self.is_member(conn) || self.seats.iter().any(|s| s.user_id == entrant.user_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        if self.seats.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull);
        }

        let user_id = entrant.user_id.clone();
        let username = entrant.username.clone();
        self.seats.push(Seat::from(entrant));
        self.host.get_or_insert(conn);
        info!(
            room_id = %self.room_id,
            %user_id,
            players = self.seats.len(),
            "player joined"
        );

        self.dispatch(Recipient::Only(conn), self.joined_message());
        self.dispatch(
            Recipient::AllExcept(conn),
            ServerMessage::PlayerJoined {
                user_id,
                username,
                player_count: self.seats.len(),
            },
        );
        Ok(())
    }

    fn handle_spectate(&mut self, entrant: Entrant) -> Result<(), RoomError> {
        let conn = entrant.peer.id();
        if self.is_member(conn) {
            return Err(RoomError::AlreadyInRoom);
        }
        debug!(room_id = %self.room_id, user_id = %entrant.user_id, "spectator joined");
        self.spectators.push(entrant);
        self.dispatch(
            Recipient::Only(conn),
            ServerMessage::JoinedSpectator {
                room_id: self.room_id.clone(),
                game_type: self.game_type.clone(),
                state: self.state,
                players: self.player_views(),
            },
        );
        Ok(())
    }

    fn handle_leave(&mut self, conn: ConnectionId) -> LeaveOutcome {
        if let Some(idx) = self.spectators.iter().position(|w| w.peer.id() == conn) {
            self.spectators.remove(idx);
            debug!(room_id = %self.room_id, conn_id = %conn, "spectator left");
            return self.leave_outcome(true);
        }
        let Some(idx) = self.seats.iter().position(|s| s.peer.id() == conn) else {
            return self.leave_outcome(false);
        };

        let seat = self.seats.remove(idx);
        info!(
            room_id = %self.room_id,
            user_id = %seat.user_id,
            players = self.seats.len(),
            "player left"
        );

        if self.seats.is_empty() {
            self.host = None;
            self.countdown.cancel();
            self.round.cancel();
            self.auto_start.cancel();
            self.dispatch(
                Recipient::All,
                ServerMessage::LeftGame {
                    room_id: self.room_id.clone(),
                },
            );
            return LeaveOutcome {
                was_member: true,
                remaining_players: 0,
                closed: true,
            };
        }

        self.dispatch(
            Recipient::All,
            ServerMessage::PlayerLeft {
                user_id: seat.user_id,
                username: seat.username,
                player_count: self.seats.len(),
            },
        );

        if self.host == Some(conn) {
            let next = &self.seats[0];
            self.host = Some(next.peer.id());
            info!(room_id = %self.room_id, host = %next.user_id, "host migrated");
            let msg = ServerMessage::HostChanged {
                host_id: next.user_id.clone(),
                username: next.username.clone(),
            };
            self.dispatch(Recipient::All, msg);
        }

        self.leave_outcome(true)
    }

    fn leave_outcome(&self, was_member: bool) -> LeaveOutcome {
        LeaveOutcome {
            was_member,
            remaining_players: self.seats.len(),
            closed: false,
        }
    }

    // -- lifecycle ----------------------------------------------------------

    fn handle_ready(&mut self, conn: ConnectionId, ready: bool) -> Result<(), RoomError> {
        let idx = self.seat_index(conn)?;
        if self.state != RoomState::Waiting {
            return Err(RoomError::GameStarted);
        }

        self.seats[idx].ready = ready;
        let user_id = self.seats[idx].user_id.clone();
        self.dispatch(
            Recipient::All,
            ServerMessage::PlayerReady {
                user_id,
                players: self.player_views(),
            },
        );

        if self.seats.iter().all(|s| s.ready) {
            if self.seats.len() < MIN_PLAYERS {
                return Err(RoomError::NeedPlayers);
            }
            self.begin_countdown();
        }
        Ok(())
    }

    fn handle_start(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        self.seat_index(conn)?;
        if self.state != RoomState::Waiting {
            return Err(RoomError::GameStarted);
        }
        if self.host != Some(conn) {
            return Err(RoomError::NotHost(HostAction::Start));
        }
        if self.seats.len() < MIN_PLAYERS {
            return Err(RoomError::NeedPlayers);
        }
        self.begin_countdown();
        Ok(())
    }

    fn auto_start_fired(&mut self) {
        if self.state == RoomState::Waiting && self.seats.len() >= MIN_PLAYERS {
            info!(room_id = %self.room_id, "match grace elapsed, starting");
            self.begin_countdown();
        } else {
            debug!(
                room_id = %self.room_id,
                state = %self.state,
                players = self.seats.len(),
                "match grace elapsed, not starting"
            );
        }
    }

    fn begin_countdown(&mut self) {
        debug_assert!(self.state.can_transition_to(RoomState::Countdown));
        self.state = RoomState::Countdown;
        self.auto_start.cancel();
        self.countdown.arm(self.settings.countdown);

        let duration = millis(self.settings.countdown);
        info!(room_id = %self.room_id, duration_ms = duration, "countdown started");
        self.dispatch(
            Recipient::All,
            ServerMessage::CountdownStart {
                duration,
                starts_at: unix_millis().saturating_add_unsigned(duration),
            },
        );
    }

    fn begin_round(&mut self) {
        if self.state != RoomState::Countdown {
            warn!(room_id = %self.room_id, state = %self.state, "countdown fired outside countdown");
            return;
        }
        self.state = RoomState::Playing;
        for seat in &mut self.seats {
            seat.tally = Tally::default();
        }
        self.started = Some(Instant::now());
        self.game_data = logic::generate_game_data(&self.game_type, &mut self.rng);
        self.round.arm(self.settings.round_duration);

        let duration = millis(self.settings.round_duration);
        info!(
            room_id = %self.room_id,
            players = self.seats.len(),
            duration_ms = duration,
            "round started"
        );
        self.dispatch(
            Recipient::All,
            ServerMessage::GameStart {
                game_type: self.game_type.clone(),
                duration,
                game_data: self.game_data.clone(),
                players: self.player_views(),
                started_at: unix_millis(),
            },
        );
    }

    /// Finishes the round. A second call is a no-op.
    fn end(&mut self, reason: EndReason) {
        if self.state == RoomState::Finished {
            return;
        }
        if !self.state.can_transition_to(RoomState::Finished) {
            warn!(room_id = %self.room_id, state = %self.state, ?reason, "end requested before start");
            return;
        }
        self.state = RoomState::Finished;
        self.countdown.cancel();
        self.round.cancel();
        self.auto_start.cancel();

        let now = Instant::now();
        self.ended = Some(now);
        let duration = self
            .started
            .map(|started| millis(now.duration_since(started)))
            .unwrap_or(0);
        let leaderboard = logic::leaderboard(&self.player_views());
        let winner = leaderboard.first().cloned();

        info!(
            room_id = %self.room_id,
            ?reason,
            duration_ms = duration,
            winner = ?winner.as_ref().map(|w| &w.user_id),
            "round ended"
        );
        self.dispatch(
            Recipient::All,
            ServerMessage::GameEnd {
                reason,
                leaderboard,
                winner,
                duration,
            },
        );
    }

    // -- gameplay -----------------------------------------------------------

    fn handle_action(
        &mut self,
        conn: ConnectionId,
        action: String,
        payload: Value,
    ) -> Result<(), RoomError> {
        let idx = self.seat_index(conn)?;
        if self.state != RoomState::Playing {
            return Err(RoomError::NotPlaying);
        }

        let resolution = logic::resolve(
            &self.game_type,
            &self.game_data,
            &mut self.seats[idx].tally,
            &action,
            &payload,
            &mut self.rng,
        )?;

        let seat = &self.seats[idx];
        let user_id = seat.user_id.clone();
        let username = seat.username.clone();
        let score = seat.tally.score;

        match resolution {
            Resolution::Scored { position, finished } => {
                self.dispatch(
                    Recipient::All,
                    ServerMessage::ScoreUpdate { user_id, username, score, position },
                );
                if finished {
                    self.end(EndReason::PlayerFinished);
                }
            }
            Resolution::Answered { question_idx, correct: true, points } => {
                self.dispatch(
                    Recipient::All,
                    ServerMessage::CorrectAnswer { user_id, username, question_idx, points, score },
                );
            }
            Resolution::Answered { question_idx, correct: false, .. } => {
                self.dispatch(
                    Recipient::All,
                    ServerMessage::WrongAnswer { user_id, username, question_idx },
                );
            }
            Resolution::Guessed { guess, correct } => {
                self.dispatch(
                    Recipient::All,
                    ServerMessage::PlayerGuess { user_id, username, guess, correct, score },
                );
                if correct {
                    self.end(EndReason::WordSolved);
                }
            }
            Resolution::Relay => {
                debug!(room_id = %self.room_id, %action, "relaying action");
                self.dispatch(
                    Recipient::AllExcept(conn),
                    ServerMessage::GameAction { user_id, username, action, payload },
                );
            }
        }
        Ok(())
    }

    fn handle_patch(&mut self, conn: ConnectionId, patch: &Value) -> Result<(), RoomError> {
        self.seat_index(conn)?;
        if self.host != Some(conn) {
            return Err(RoomError::NotHost(HostAction::UpdateState));
        }
        if self.state != RoomState::Playing {
            return Err(RoomError::NotPlaying);
        }
        self.game_data = self.game_data.merged(patch).ok_or(RoomError::InvalidGameData)?;
        self.dispatch(
            Recipient::All,
            ServerMessage::GameStateUpdate {
                game_data: self.game_data.clone(),
            },
        );
        Ok(())
    }

    fn handle_force_end(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        self.seat_index(conn)?;
        if self.host != Some(conn) {
            return Err(RoomError::NotHost(HostAction::End));
        }
        match self.state {
            RoomState::Waiting => Err(RoomError::NotPlaying),
            RoomState::Finished => Ok(()),
            RoomState::Countdown | RoomState::Playing => {
                self.end(EndReason::HostEnded);
                Ok(())
            }
        }
    }

    fn handle_chat(&mut self, conn: ConnectionId, message: &str) -> Result<(), RoomError> {
        let (user_id, username) = self
            .seats
            .iter()
            .map(|s| (&s.peer, &s.user_id, &s.username))
            .chain(self.spectators.iter().map(|w| (&w.peer, &w.user_id, &w.username)))
            .find(|(peer, _, _)| peer.id() == conn)
            .map(|(_, user_id, username)| (user_id.clone(), username.clone()))
            .ok_or(RoomError::NotInRoom)?;

        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(RoomError::EmptyMessage);
        }
        let message: String = trimmed.chars().take(self.settings.chat_max_chars).collect();

        self.dispatch(
            Recipient::All,
            ServerMessage::Chat {
                user_id,
                username,
                message,
                timestamp: unix_millis(),
            },
        );
        Ok(())
    }

    // -- helpers ------------------------------------------------------------

    fn is_member(&self, conn: ConnectionId) -> bool {
        self.seats.iter().any(|s| s.peer.id() == conn)
            || self.spectators.iter().any(|w| w.peer.id() == conn)
    }

    /// The seat of `conn`, or why it has none.
    fn seat_index(&self, conn: ConnectionId) -> Result<usize, RoomError> {
        if let Some(idx) = self.seats.iter().position(|s| s.peer.id() == conn) {
            return Ok(idx);
        }
        if self.spectators.iter().any(|w| w.peer.id() == conn) {
            Err(RoomError::Spectator)
        } else {
            Err(RoomError::NotInRoom)
        }
    }

    fn player_views(&self) -> Vec<PlayerView> {
        self.seats
            .iter()
            .map(|s| PlayerView {
                user_id: s.user_id.clone(),
                username: s.username.clone(),
                score: s.tally.score,
                ready: s.ready,
                is_host: self.host == Some(s.peer.id()),
            })
            .collect()
    }

    fn host_id(&self) -> Option<UserId> {
        let host = self.host?;
        self.seats
            .iter()
            .find(|s| s.peer.id() == host)
            .map(|s| s.user_id.clone())
    }

    fn joined_message(&self) -> ServerMessage {
        ServerMessage::Joined {
            room_id: self.room_id.clone(),
            invite_code: self.invite_code.clone(),
            game_type: self.game_type.clone(),
            state: self.state,
            host_id: self.host_id(),
            max_players: self.settings.max_players,
            players: self.player_views(),
        }
    }

    /// Sends `msg` to every matching player and spectator. Closed
    /// connections are skipped; a failed send only affects its recipient.
    fn dispatch(&self, to: Recipient, msg: ServerMessage) {
        let peers = self
            .seats
            .iter()
            .map(|s| &s.peer)
            .chain(self.spectators.iter().map(|w| &w.peer));
        for peer in peers {
            if to.includes(peer.id()) && peer.is_open() {
                peer.send(msg.clone());
            }
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            invite_code: self.invite_code.clone(),
            game_type: self.game_type.clone(),
            state: self.state,
            host_id: self.host_id(),
            players: self.player_views(),
            spectator_count: self.spectators.len(),
            max_players: self.settings.max_players,
            is_private: self.settings.is_private,
            game_data: self.game_data.clone(),
            created_at: self.created_at,
            created: self.created,
            ended: self.ended,
        }
    }
}

/// Spawns a new room actor seated with `founders` (the first is host) and
/// returns a handle to it.
///
/// `buffer` bounds the command channel; senders wait when it is full.
pub(crate) fn spawn_room(
    room_id: RoomId,
    invite_code: String,
    game_type: GameType,
    settings: RoomSettings,
    founders: Vec<Entrant>,
    buffer: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(buffer.max(1));

    let seats: Vec<Seat> = founders.into_iter().map(Seat::from).collect();
    let host = seats.first().map(|s| s.peer.id());

    let actor = RoomActor {
        room_id: room_id.clone(),
        invite_code: invite_code.clone(),
        game_type,
        settings,
        state: RoomState::Waiting,
        seats,
        spectators: Vec::new(),
        host,
        game_data: GameData::Empty,
        created: Instant::now(),
        created_at: unix_millis(),
        started: None,
        ended: None,
        countdown: Timer::new("countdown"),
        round: Timer::new("round"),
        auto_start: Timer::new("auto_start"),
        rng: StdRng::from_rng(&mut rand::rng()),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        invite_code,
        sender: tx,
    }
}
