//! Integration tests for rooms, matchmaking, and the sweeper.
//!
//! Every client is an in-memory `Peer` whose outbound channel the test
//! reads. Tests run with a paused clock: awaiting a message that only a
//! timer will produce advances virtual time straight to that timer.

use std::time::Duration;

use arcade_protocol::{EndReason, GameData, GameType, RoomId, RoomState, ServerMessage, UserId};
use arcade_room::{HostAction, LobbyConfig, NewRoom, RoomError, RoomManager};
use arcade_session::Peer;
use arcade_transport::ConnectionId;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    name: &'static str,
    peer: Peer,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Client {
    fn new(conn: u64, name: &'static str) -> Self {
        let (peer, rx) = Peer::channel(ConnectionId::new(conn));
        Self { name, peer, rx }
    }

    fn conn(&self) -> ConnectionId {
        self.peer.id()
    }

    fn user(&self) -> UserId {
        UserId::from(self.name)
    }

    async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(600), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("outbound channel closed")
    }

    /// Skips messages until one matches.
    async fn wait_for(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let msg = self.next().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    /// Everything already queued, without waiting.
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }
}

fn new_room(owner: &Client, game_type: GameType) -> NewRoom {
    NewRoom {
        game_type,
        user_id: owner.user(),
        username: owner.name.to_uppercase(),
        max_players: None,
        is_private: false,
        round_duration: None,
    }
}

async fn create(mgr: &RoomManager, owner: &Client, game_type: GameType) -> RoomId {
    mgr.create_room(&owner.peer, new_room(owner, game_type))
        .await
        .expect("create should succeed")
}

async fn join(mgr: &RoomManager, client: &Client, game_id: &str) -> Result<RoomId, RoomError> {
    mgr.join_room(&client.peer, game_id, client.user(), client.name.to_uppercase(), false)
        .await
}

/// Creates a room for `a`, seats `b`, and runs the countdown so the
/// round is playing. Clears both inboxes.
async fn playing_room(mgr: &RoomManager, a: &mut Client, b: &mut Client, game_type: GameType) -> RoomId {
    let room = create(mgr, a, game_type).await;
    join(mgr, b, &room.0).await.unwrap();
    mgr.start(a.conn()).await.unwrap();
    a.wait_for(|m| matches!(m, ServerMessage::GameStart { .. })).await;
    b.wait_for(|m| matches!(m, ServerMessage::GameStart { .. })).await;
    a.drain();
    b.drain();
    room
}

fn is_game_end(m: &ServerMessage) -> bool {
    matches!(m, ServerMessage::GameEnd { .. })
}

// =========================================================================
// Room creation and joining
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_created_room_waits_with_creator_as_host() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");

    let room = create(&mgr, &a, GameType::ClickBattle).await;

    let ServerMessage::RoomCreated { room_id, invite_code, game_type, player_count, max_players } = a.next().await
    else {
        panic!("expected room_created first");
    };
    assert_eq!(room_id, room);
    assert!(room_id.0.starts_with("room_"));
    assert_eq!(invite_code.len(), 6);
    assert!(invite_code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(game_type, GameType::ClickBattle);
    assert_eq!((player_count, max_players), (1, 10));

    let info = mgr.room_info(&room.0).await.unwrap();
    assert_eq!(info.state, RoomState::Waiting);
    assert_eq!(info.host_id, Some(a.user()));
    assert_eq!(info.player_count(), 1);
    assert!(info.players[0].is_host);
    assert_eq!(mgr.room_of(a.conn()).await, Some(room));
}

#[tokio::test(start_paused = true)]
async fn test_invite_code_joins_like_room_id() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let mut c = Client::new(3, "cat");

    let room = create(&mgr, &a, GameType::Race).await;
    let code = mgr.room_info(&room.0).await.unwrap().invite_code;
    a.drain();

    let via_code = join(&mgr, &b, &code.to_lowercase()).await.unwrap();
    let via_id = join(&mgr, &c, &room.0).await.unwrap();
    assert_eq!(via_code, room);
    assert_eq!(via_id, room);

    let ServerMessage::Joined { room_id, host_id, players, state, .. } = b.next().await else {
        panic!("expected joined");
    };
    assert_eq!(room_id, room);
    assert_eq!(host_id, Some(a.user()));
    assert_eq!(players.len(), 2);
    assert_eq!(state, RoomState::Waiting);

    assert_eq!(
        a.next().await,
        ServerMessage::PlayerJoined { user_id: b.user(), username: "BOB".into(), player_count: 2 }
    );
    assert_eq!(
        a.next().await,
        ServerMessage::PlayerJoined { user_id: c.user(), username: "CAT".into(), player_count: 3 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_room_not_found() {
    let mgr = RoomManager::default();
    let b = Client::new(2, "bob");
    let err = join(&mgr, &b, "ZZZZZZ").await.unwrap_err();
    assert_eq!(err.to_string(), "Room not found");
}

#[tokio::test(start_paused = true)]
async fn test_full_room_rejects_join() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");

    let room = mgr
        .create_room(&a.peer, NewRoom { max_players: Some(1), ..new_room(&a, GameType::Race) })
        .await
        .unwrap();

    let err = join(&mgr, &b, &room.0).await.unwrap_err();
    assert_eq!(err, RoomError::RoomFull);
    assert_eq!(err.to_string(), "Room is full");
    assert_eq!(mgr.room_of(b.conn()).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_join_after_start_rejected() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");
    let c = Client::new(3, "cat");

    let room = create(&mgr, &a, GameType::Race).await;
    join(&mgr, &b, &room.0).await.unwrap();
    mgr.start(a.conn()).await.unwrap();

    let err = join(&mgr, &c, &room.0).await.unwrap_err();
    assert_eq!(err.to_string(), "Game already started");
}

#[tokio::test(start_paused = true)]
async fn test_same_user_cannot_take_two_seats() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let room = create(&mgr, &a, GameType::Race).await;

    // Different connection, same claimed identity.
    let imposter = Client::new(2, "ann");
    let err = join(&mgr, &imposter, &room.0).await.unwrap_err();
    assert_eq!(err.to_string(), "Already in this room");

    // Same connection, same room.
    let err = join(&mgr, &a, &room.0).await.unwrap_err();
    assert_eq!(err, RoomError::AlreadyInRoom);
}

#[tokio::test(start_paused = true)]
async fn test_joining_another_room_leaves_the_old_one() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let b = Client::new(2, "bob");
    let c = Client::new(3, "cat");

    let first = create(&mgr, &a, GameType::Race).await;
    let second = create(&mgr, &c, GameType::Trivia).await;
    join(&mgr, &b, &first.0).await.unwrap();
    a.drain();

    join(&mgr, &b, &second.0).await.unwrap();

    assert_eq!(mgr.room_of(b.conn()).await, Some(second));
    let left = a.wait_for(|m| matches!(m, ServerMessage::PlayerLeft { .. })).await;
    assert_eq!(
        left,
        ServerMessage::PlayerLeft { user_id: b.user(), username: "BOB".into(), player_count: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_join_keeps_current_room() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");

    let full = mgr
        .create_room(&a.peer, NewRoom { max_players: Some(1), ..new_room(&a, GameType::Race) })
        .await
        .unwrap();
    let home = create(&mgr, &b, GameType::Race).await;

    assert!(join(&mgr, &b, &full.0).await.is_err());
    assert_eq!(mgr.room_of(b.conn()).await, Some(home));
    assert_eq!(mgr.room_count().await, 2);
}

// =========================================================================
// Ready / start / countdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_click_battle_full_round() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");

    let room = create(&mgr, &a, GameType::ClickBattle).await;
    join(&mgr, &b, &room.0).await.unwrap();

    mgr.ready(a.conn(), true).await.unwrap();
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Waiting);
    mgr.ready(b.conn(), true).await.unwrap();
    let t0 = Instant::now();

    let countdown = a.wait_for(|m| matches!(m, ServerMessage::CountdownStart { .. })).await;
    assert!(matches!(countdown, ServerMessage::CountdownStart { duration: 3000, .. }));
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Countdown);

    let ServerMessage::GameStart { game_type, duration, players, game_data, .. } =
        a.wait_for(|m| matches!(m, ServerMessage::GameStart { .. })).await
    else {
        unreachable!()
    };
    assert!(t0.elapsed() >= Duration::from_millis(3000));
    assert_eq!(game_type, GameType::ClickBattle);
    assert_eq!(duration, 5000);
    assert_eq!(game_data, GameData::ClickBattle);
    assert!(players.iter().all(|p| p.score == 0));
    b.wait_for(|m| matches!(m, ServerMessage::GameStart { .. })).await;
    let started = Instant::now();

    for _ in 0..3 {
        mgr.action(a.conn(), "click".into(), Value::Null).await.unwrap();
    }
    mgr.action(b.conn(), "click".into(), Value::Null).await.unwrap();

    let ServerMessage::GameEnd { reason, leaderboard, winner, duration } = a.wait_for(is_game_end).await else {
        unreachable!()
    };
    assert!(started.elapsed() >= Duration::from_millis(5000));
    assert_eq!(reason, EndReason::TimeUp);
    assert!((5000..5100).contains(&duration));
    let ranked: Vec<(&str, i64)> = leaderboard.iter().map(|e| (e.user_id.0.as_str(), e.score)).collect();
    assert_eq!(ranked, [("ann", 3), ("bob", 1)]);
    assert_eq!(winner.map(|w| w.user_id), Some(a.user()));
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_lone_ready_player_needs_two() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let room = create(&mgr, &a, GameType::Race).await;
    a.drain();

    let err = mgr.ready(a.conn(), true).await.unwrap_err();
    assert_eq!(err.to_string(), "Need at least 2 players");

    // The ready flag itself was still recorded and broadcast.
    let ServerMessage::PlayerReady { user_id, players } = a.next().await else {
        panic!("expected player_ready");
    };
    assert_eq!(user_id, a.user());
    assert!(players[0].ready);
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_non_host_cannot_start() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");
    let room = create(&mgr, &a, GameType::Race).await;
    join(&mgr, &b, &room.0).await.unwrap();

    let err = mgr.start(b.conn()).await.unwrap_err();
    assert_eq!(err, RoomError::NotHost(HostAction::Start));
    assert_eq!(err.to_string(), "Only the host can start");
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_host_start_alone_rejected() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let room = create(&mgr, &a, GameType::Race).await;

    assert_eq!(mgr.start(a.conn()).await.unwrap_err(), RoomError::NeedPlayers);
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_room_operations_without_room() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");

    assert_eq!(mgr.ready(a.conn(), true).await.unwrap_err().to_string(), "Not in a room");
    assert_eq!(mgr.start(a.conn()).await.unwrap_err(), RoomError::NotInRoom);
    assert_eq!(mgr.leave(a.conn()).await.unwrap_err(), RoomError::NotInRoom);
}

#[tokio::test(start_paused = true)]
async fn test_custom_round_duration() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let req = NewRoom {
        round_duration: Some(Duration::from_millis(1234)),
        ..new_room(&a, GameType::ClickBattle)
    };
    let room = mgr.create_room(&a.peer, req).await.unwrap();
    join(&mgr, &b, &room.0).await.unwrap();
    mgr.start(a.conn()).await.unwrap();

    let start = a.wait_for(|m| matches!(m, ServerMessage::GameStart { .. })).await;
    assert!(matches!(start, ServerMessage::GameStart { duration: 1234, .. }));
    let ServerMessage::GameEnd { reason, .. } = b.wait_for(is_game_end).await else {
        unreachable!()
    };
    assert_eq!(reason, EndReason::TimeUp);
}

// =========================================================================
// Game types
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_race_finish_ends_before_timer() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    playing_room(&mgr, &mut a, &mut b, GameType::Race).await;
    let started = Instant::now();

    mgr.action(b.conn(), "tap".into(), Value::Null).await.unwrap();
    let mut taps = 0;
    loop {
        match mgr.action(a.conn(), "tap".into(), Value::Null).await {
            Ok(()) => taps += 1,
            Err(RoomError::NotPlaying) => break,
            Err(other) => panic!("unexpected error {other}"),
        }
        assert!(taps <= 34, "each tap covers at least 3");
    }

    let msgs = a.drain();
    let last_score = msgs
        .iter()
        .filter_map(|m| match m {
            ServerMessage::ScoreUpdate { user_id, position: Some(position), .. } if *user_id == a.user() => {
                Some(*position)
            }
            _ => None,
        })
        .last()
        .unwrap();
    assert!(last_score >= 100.0);

    let ServerMessage::GameEnd { reason, winner, leaderboard, .. } =
        msgs.into_iter().find(is_game_end).expect("game_end broadcast")
    else {
        unreachable!()
    };
    assert!(started.elapsed() < Duration::from_millis(15_000));
    assert_eq!(reason, EndReason::PlayerFinished);
    let winner = winner.unwrap();
    assert_eq!(winner.user_id, a.user());
    assert!(winner.score >= 100);
    assert_eq!(leaderboard.len(), 2);
    assert!(leaderboard[0].score >= leaderboard[1].score);

    // No second game_end when the round timer would have fired.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(b.drain().iter().filter(|m| is_game_end(m)).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reaction_time_scores_client_reported_timing() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    playing_room(&mgr, &mut a, &mut b, GameType::ReactionTime).await;

    // A physically impossible 0ms reaction is accepted as reported.
    mgr.action(a.conn(), "react".into(), json!({"reactionMs": 0})).await.unwrap();
    assert_eq!(
        b.next().await,
        ServerMessage::ScoreUpdate { user_id: a.user(), username: "ANN".into(), score: 1000, position: None }
    );

    mgr.action(a.conn(), "react".into(), json!({"reactionMs": 250})).await.unwrap();
    assert!(matches!(b.next().await, ServerMessage::ScoreUpdate { score: 1750, .. }));

    let err = mgr.action(a.conn(), "react".into(), json!({})).await.unwrap_err();
    assert_eq!(err, RoomError::InvalidAction("react".into()));
}

#[tokio::test(start_paused = true)]
async fn test_extreme_client_timings_keep_the_room_alive() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let room = playing_room(&mgr, &mut a, &mut b, GameType::ReactionTime).await;

    for _ in 0..3 {
        mgr.action(a.conn(), "react".into(), json!({"reactionMs": -1e300})).await.unwrap();
    }
    let update = b
        .wait_for(|m| matches!(m, ServerMessage::ScoreUpdate { score: i64::MAX, .. }))
        .await;
    assert!(matches!(update, ServerMessage::ScoreUpdate { position: None, .. }));

    // Everyone else keeps playing.
    mgr.action(b.conn(), "react".into(), json!({"reactionMs": 1e300})).await.unwrap();
    a.wait_for(|m| matches!(m, ServerMessage::ScoreUpdate { score: 0, .. })).await;
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_trivia_answers_judged_against_questions() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let room = playing_room(&mgr, &mut a, &mut b, GameType::Trivia).await;

    let GameData::Trivia { questions } = mgr.room_info(&room.0).await.unwrap().game_data else {
        panic!("expected trivia data");
    };
    assert_eq!(questions.len(), 3);
    let right = questions[1].correct;
    let wrong = (right + 1) % questions[1].options.len();

    mgr.action(a.conn(), "answer".into(), json!({"questionIdx": 1, "answerIdx": right, "timeMs": 1500}))
        .await
        .unwrap();
    assert_eq!(
        b.next().await,
        ServerMessage::CorrectAnswer { user_id: a.user(), username: "ANN".into(), question_idx: 1, points: 95, score: 95 }
    );

    mgr.action(b.conn(), "answer".into(), json!({"questionIdx": 1, "answerIdx": wrong, "timeMs": 10}))
        .await
        .unwrap();
    assert_eq!(
        a.wait_for(|m| matches!(m, ServerMessage::WrongAnswer { .. })).await,
        ServerMessage::WrongAnswer { user_id: b.user(), username: "BOB".into(), question_idx: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_scramble_trusts_client_correct_flag() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    playing_room(&mgr, &mut a, &mut b, GameType::Scramble).await;

    // The guess is nowhere near the word; the client says it is right.
    mgr.action(b.conn(), "guess".into(), json!({"guess": "nonsense", "correct": true, "timeMs": 4000}))
        .await
        .unwrap();

    assert_eq!(
        a.next().await,
        ServerMessage::PlayerGuess {
            user_id: b.user(),
            username: "BOB".into(),
            guess: "nonsense".into(),
            correct: true,
            score: 480,
        }
    );
    let ServerMessage::GameEnd { reason, winner, .. } = a.next().await else {
        panic!("expected game_end right after the guess");
    };
    assert_eq!(reason, EndReason::WordSolved);
    assert_eq!(winner.unwrap().user_id, b.user());
}

#[tokio::test(start_paused = true)]
async fn test_word_guess_wrong_guess_keeps_playing() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let room = playing_room(&mgr, &mut a, &mut b, GameType::WordGuess).await;

    mgr.action(a.conn(), "guess".into(), json!({"guess": "tree", "correct": false}))
        .await
        .unwrap();
    assert!(matches!(b.next().await, ServerMessage::PlayerGuess { correct: false, score: 0, .. }));
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_unscored_actions_relay_to_others() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    playing_room(&mgr, &mut a, &mut b, GameType::Other("pictionary".into())).await;

    let stroke = json!({"x": 10, "y": 20});
    mgr.action(a.conn(), "draw".into(), stroke.clone()).await.unwrap();

    assert_eq!(
        b.next().await,
        ServerMessage::GameAction { user_id: a.user(), username: "ANN".into(), action: "draw".into(), payload: stroke }
    );
    assert!(a.drain().is_empty(), "sender does not get its own relay");
}

#[tokio::test(start_paused = true)]
async fn test_actions_outside_round_rejected() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    create(&mgr, &a, GameType::ClickBattle).await;

    let err = mgr.action(a.conn(), "click".into(), Value::Null).await.unwrap_err();
    assert_eq!(err.to_string(), "Game not in progress");
}

#[tokio::test(start_paused = true)]
async fn test_host_patches_game_data() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    playing_room(&mgr, &mut a, &mut b, GameType::ReactionTime).await;

    mgr.patch_state(a.conn(), json!({"rounds": 5})).await.unwrap();
    assert_eq!(
        b.next().await,
        ServerMessage::GameStateUpdate { game_data: GameData::ReactionTime { rounds: 5 } }
    );

    let err = mgr.patch_state(a.conn(), json!({"kind": "race", "distance": 1})).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid game data");

    let err = mgr.patch_state(b.conn(), json!({"rounds": 1})).await.unwrap_err();
    assert_eq!(err.to_string(), "Only the host can update the game state");
}

#[tokio::test(start_paused = true)]
async fn test_host_forced_end_is_idempotent() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let room = create(&mgr, &a, GameType::Trivia).await;
    join(&mgr, &b, &room.0).await.unwrap();

    assert_eq!(mgr.force_end(a.conn()).await.unwrap_err(), RoomError::NotPlaying);
    mgr.start(a.conn()).await.unwrap();
    assert_eq!(
        mgr.force_end(b.conn()).await.unwrap_err().to_string(),
        "Only the host can end the game"
    );

    // Ending during the countdown skips the round entirely.
    mgr.force_end(a.conn()).await.unwrap();
    mgr.force_end(a.conn()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    let msgs = b.drain();
    let ends: Vec<&ServerMessage> = msgs.iter().filter(|m| is_game_end(m)).collect();
    assert_eq!(ends.len(), 1);
    assert!(matches!(ends[0], ServerMessage::GameEnd { reason: EndReason::HostEnded, duration: 0, .. }));
    assert!(!msgs.iter().any(|m| matches!(m, ServerMessage::GameStart { .. })));
    a.drain();
}

// =========================================================================
// Spectators and chat
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_spectator_watches_and_chats_but_cannot_play() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let b = Client::new(2, "bob");
    let mut viewer = Client::new(3, "viewer");

    let room = create(&mgr, &a, GameType::ClickBattle).await;
    join(&mgr, &b, &room.0).await.unwrap();
    mgr.join_room(&viewer.peer, &room.0, viewer.user(), "Viewer".into(), true)
        .await
        .unwrap();

    let ServerMessage::JoinedSpectator { players, state, .. } = viewer.next().await else {
        panic!("expected joined_spectator");
    };
    assert_eq!(players.len(), 2);
    assert_eq!(state, RoomState::Waiting);
    assert_eq!(mgr.room_info(&room.0).await.unwrap().player_count(), 2, "not seated");

    assert_eq!(mgr.ready(viewer.conn(), true).await.unwrap_err(), RoomError::Spectator);
    assert_eq!(
        mgr.action(viewer.conn(), "click".into(), Value::Null).await.unwrap_err().to_string(),
        "Spectators cannot perform game actions"
    );

    a.drain();
    mgr.chat(viewer.conn(), "  gl hf  ".into()).await.unwrap();
    let ServerMessage::Chat { user_id, message, .. } = a.next().await else {
        panic!("expected chat");
    };
    assert_eq!(user_id, viewer.user());
    assert_eq!(message, "gl hf");

    mgr.start(a.conn()).await.unwrap();
    viewer.wait_for(|m| matches!(m, ServerMessage::GameStart { .. })).await;
}

#[tokio::test(start_paused = true)]
async fn test_chat_is_trimmed_capped_and_not_empty() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    create(&mgr, &a, GameType::Race).await;
    a.drain();

    assert_eq!(mgr.chat(a.conn(), "   ".into()).await.unwrap_err().to_string(), "Message is empty");

    mgr.chat(a.conn(), "x".repeat(300)).await.unwrap();
    let ServerMessage::Chat { message, timestamp, .. } = a.next().await else {
        panic!("expected chat");
    };
    assert_eq!(message.chars().count(), 200);
    assert!(timestamp > 0);
}

// =========================================================================
// Leaving and host migration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_host_leaving_migrates_host() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let mut c = Client::new(3, "cat");

    let room = create(&mgr, &a, GameType::Race).await;
    join(&mgr, &b, &room.0).await.unwrap();
    join(&mgr, &c, &room.0).await.unwrap();
    b.drain();
    c.drain();

    assert_eq!(mgr.leave(a.conn()).await.unwrap(), room);

    assert_eq!(
        c.next().await,
        ServerMessage::PlayerLeft { user_id: a.user(), username: "ANN".into(), player_count: 2 }
    );
    assert_eq!(c.next().await, ServerMessage::HostChanged { host_id: b.user(), username: "BOB".into() });
    b.wait_for(|m| matches!(m, ServerMessage::HostChanged { .. })).await;

    let info = mgr.room_info(&room.0).await.unwrap();
    assert_eq!(info.host_id, Some(b.user()));
    assert!(info.players[0].is_host);

    // The new host can start.
    mgr.start(b.conn()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_last_player_leaving_deletes_room_and_its_timers() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");
    let mut viewer = Client::new(3, "viewer");

    let room = create(&mgr, &a, GameType::Race).await;
    join(&mgr, &b, &room.0).await.unwrap();
    mgr.join_room(&viewer.peer, &room.0, viewer.user(), "V".into(), true).await.unwrap();
    mgr.start(a.conn()).await.unwrap();

    mgr.leave(a.conn()).await.unwrap();
    mgr.leave(b.conn()).await.unwrap();

    assert_eq!(mgr.room_count().await, 0);
    assert_eq!(mgr.room_info(&room.0).await.unwrap_err(), RoomError::NotFound);
    assert_eq!(mgr.room_of(viewer.conn()).await, None);

    // Long past both the countdown and the round: nothing fires.
    a.drain();
    b.drain();
    viewer.drain();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(a.drain().is_empty());
    assert!(b.drain().is_empty());
    assert!(viewer.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_leaves_room_and_queue() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let b = Client::new(2, "bob");

    let room = create(&mgr, &a, GameType::Race).await;
    join(&mgr, &b, &room.0).await.unwrap();
    mgr.find_match(&b.peer, GameType::Trivia, b.user(), "BOB".into()).await;
    assert_eq!(mgr.queue_len(&GameType::Trivia).await, 1);
    a.drain();

    mgr.disconnect(b.conn()).await;

    assert_eq!(mgr.queue_len(&GameType::Trivia).await, 0);
    assert_eq!(mgr.room_of(b.conn()).await, None);
    assert!(matches!(a.next().await, ServerMessage::PlayerLeft { player_count: 1, .. }));
}

// =========================================================================
// Matchmaking
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_matchmaking_dedupes_and_pairs() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let mut b = Client::new(2, "bob");

    assert!(mgr.find_match(&a.peer, GameType::Trivia, a.user(), "ANN".into()).await.is_none());
    assert!(mgr.find_match(&a.peer, GameType::Trivia, a.user(), "ANN".into()).await.is_none());
    assert_eq!(mgr.queue_len(&GameType::Trivia).await, 1, "re-queue replaces");
    assert_eq!(
        a.next().await,
        ServerMessage::QueueJoined { game_type: GameType::Trivia, position: 1 }
    );
    a.drain();

    let room = mgr
        .find_match(&b.peer, GameType::Trivia, b.user(), "BOB".into())
        .await
        .expect("second player forms a match");
    assert_eq!(mgr.queue_len(&GameType::Trivia).await, 0);

    let ServerMessage::MatchFound { room_id, players, game_type, .. } = a.next().await else {
        panic!("expected match_found");
    };
    assert_eq!(room_id, room);
    assert_eq!(game_type, GameType::Trivia);
    let ids: Vec<&str> = players.iter().map(|p| p.user_id.0.as_str()).collect();
    assert_eq!(ids, ["ann", "bob"]);
    assert!(players[0].is_host);

    b.wait_for(|m| matches!(m, ServerMessage::MatchFound { room_id, .. } if *room_id == room)).await;
    assert_eq!(mgr.room_of(a.conn()).await, Some(room.clone()));
    assert_eq!(mgr.room_of(b.conn()).await, Some(room));
}

#[tokio::test(start_paused = true)]
async fn test_one_connection_queued_under_two_ids_takes_one_seat() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");

    assert!(mgr.find_match(&a.peer, GameType::Race, UserId::from("u1"), "U1".into()).await.is_none());
    assert!(mgr.find_match(&a.peer, GameType::Race, UserId::from("u2"), "U2".into()).await.is_none());
    assert_eq!(mgr.queue_len(&GameType::Race).await, 1);

    let room = mgr.find_match(&b.peer, GameType::Race, b.user(), "BOB".into()).await.unwrap();
    let info = mgr.room_info(&room.0).await.unwrap();
    let ids: Vec<&str> = info.players.iter().map(|p| p.user_id.0.as_str()).collect();
    assert_eq!(ids, ["u2", "bob"]);

    // Both connections leaving empties the room; no seat is left behind.
    mgr.disconnect(a.conn()).await;
    mgr.disconnect(b.conn()).await;
    assert_eq!(mgr.room_count().await, 0);
    assert!(mgr.room_info(&room.0).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_join_racing_a_match_leaves_one_seat() {
    let mgr = RoomManager::default();
    let host = Client::new(1, "hal");
    let a = Client::new(2, "ann");
    let b = Client::new(3, "bob");

    let room = create(&mgr, &host, GameType::Race).await;
    mgr.find_match(&a.peer, GameType::Race, a.user(), "ANN".into()).await;

    // ann's join is in flight while bob's entry drains ann into a match.
    let (joined, matched) = tokio::join!(
        join(&mgr, &a, &room.0),
        mgr.find_match(&b.peer, GameType::Race, b.user(), "BOB".into()),
    );
    joined.unwrap();
    let matched = matched.expect("bob pairs with ann");

    let mut seated = Vec::new();
    for id in [&room, &matched] {
        let info = mgr.room_info(&id.0).await.unwrap();
        if info.players.iter().any(|p| p.user_id == a.user()) {
            seated.push(id.clone());
        }
    }
    assert_eq!(seated.len(), 1, "ann holds exactly one seat");
    assert_eq!(mgr.room_of(a.conn()).await, seated.pop());

    mgr.disconnect(a.conn()).await;
    for id in [&room, &matched] {
        let info = mgr.room_info(&id.0).await.unwrap();
        assert!(info.players.iter().all(|p| p.user_id != a.user()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_matched_room_auto_starts_after_grace() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");
    let b = Client::new(2, "bob");

    mgr.find_match(&a.peer, GameType::Trivia, a.user(), "ANN".into()).await;
    mgr.find_match(&b.peer, GameType::Trivia, b.user(), "BOB".into()).await;
    let matched = Instant::now();

    // Nobody sends player_ready.
    a.wait_for(|m| matches!(m, ServerMessage::CountdownStart { .. })).await;
    assert!(matched.elapsed() >= Duration::from_millis(2000));

    let start = a.wait_for(|m| matches!(m, ServerMessage::GameStart { .. })).await;
    assert!(matches!(start, ServerMessage::GameStart { game_type: GameType::Trivia, duration: 30_000, .. }));
    assert!(matched.elapsed() >= Duration::from_millis(5000));
}

#[tokio::test(start_paused = true)]
async fn test_matched_room_does_not_auto_start_alone() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");

    let room = mgr.find_match(&a.peer, GameType::Race, a.user(), "ANN".into()).await;
    assert!(room.is_none());
    let room = mgr.find_match(&b.peer, GameType::Race, b.user(), "BOB".into()).await.unwrap();
    mgr.leave(b.conn()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mgr.room_info(&room.0).await.unwrap().state, RoomState::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_match_drains_at_most_four() {
    let mgr = RoomManager::new(LobbyConfig {
        match_min_players: 5,
        ..LobbyConfig::default()
    });
    let clients: Vec<Client> = (1..=5)
        .map(|n| Client::new(n, ["p1", "p2", "p3", "p4", "p5"][n as usize - 1]))
        .collect();

    let mut formed = None;
    for c in &clients {
        formed = mgr.find_match(&c.peer, GameType::ClickBattle, c.user(), c.name.into()).await;
    }
    let room = formed.expect("fifth entry forms a match");

    let info = mgr.room_info(&room.0).await.unwrap();
    let ids: Vec<&str> = info.players.iter().map(|p| p.user_id.0.as_str()).collect();
    assert_eq!(ids, ["p1", "p2", "p3", "p4"]);
    assert_eq!(info.host_id, Some(UserId::from("p1")));
    assert!(!info.is_private);
    assert_eq!(mgr.queue_len(&GameType::ClickBattle).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_connections_are_not_matched() {
    let mgr = RoomManager::default();
    let gone = Client::new(1, "gone");
    let b = Client::new(2, "bob");

    mgr.find_match(&gone.peer, GameType::Race, gone.user(), "G".into()).await;
    let Client { peer, rx, .. } = gone;
    drop(rx);

    assert!(mgr.find_match(&b.peer, GameType::Race, b.user(), "B".into()).await.is_none());
    assert_eq!(mgr.queue_len(&GameType::Race).await, 1);
    drop(peer);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_match() {
    let mgr = RoomManager::default();
    let mut a = Client::new(1, "ann");

    mgr.find_match(&a.peer, GameType::Scramble, a.user(), "ANN".into()).await;
    a.drain();

    assert!(mgr.cancel_match(&a.peer, GameType::Scramble, &a.user()).await);
    assert_eq!(a.next().await, ServerMessage::MatchCancelled { game_type: GameType::Scramble });
    assert_eq!(mgr.queue_len(&GameType::Scramble).await, 0);

    // Absence is not an error.
    assert!(!mgr.cancel_match(&a.peer, GameType::Scramble, &a.user()).await);
    assert_eq!(a.next().await, ServerMessage::MatchCancelled { game_type: GameType::Scramble });
}

// =========================================================================
// Listing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_list_rooms_public_unfinished_filtered() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");
    let c = Client::new(3, "cat");
    let d = Client::new(4, "dan");
    let e = Client::new(5, "eve");

    let race = create(&mgr, &a, GameType::Race).await;
    mgr.create_room(&b.peer, NewRoom { is_private: true, ..new_room(&b, GameType::Race) })
        .await
        .unwrap();
    let trivia = create(&mgr, &c, GameType::Trivia).await;
    let done = create(&mgr, &d, GameType::Race).await;
    join(&mgr, &e, &done.0).await.unwrap();
    mgr.start(d.conn()).await.unwrap();
    mgr.force_end(d.conn()).await.unwrap();

    let all: Vec<RoomId> = mgr.list_rooms(None).await.into_iter().map(|r| r.id).collect();
    assert_eq!(all.len(), 2);
    assert!(all.contains(&race) && all.contains(&trivia));

    let races = mgr.list_rooms(Some(&GameType::Race)).await;
    assert_eq!(races.len(), 1);
    assert_eq!(races[0].id, race);
    assert_eq!(races[0].player_count, 1);
    assert_eq!(races[0].state, RoomState::Waiting);
}

// =========================================================================
// Sweeper
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sweep_reclaims_finished_rooms_after_ttl() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    let b = Client::new(2, "bob");

    let room = create(&mgr, &a, GameType::Race).await;
    join(&mgr, &b, &room.0).await.unwrap();
    mgr.start(a.conn()).await.unwrap();
    mgr.force_end(a.conn()).await.unwrap();

    assert_eq!(mgr.sweep().await.rooms_reclaimed, 0, "finished just now");

    tokio::time::advance(Duration::from_secs(61)).await;
    let report = mgr.sweep().await;
    assert_eq!(report.rooms_reclaimed, 1);
    assert_eq!(mgr.room_count().await, 0);
    assert_eq!(mgr.room_of(a.conn()).await, None);
    assert_eq!(mgr.room_of(b.conn()).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_keeps_active_rooms() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    create(&mgr, &a, GameType::Race).await;

    tokio::time::advance(Duration::from_secs(3600)).await;
    assert_eq!(mgr.sweep().await.rooms_reclaimed, 0);
    assert_eq!(mgr.room_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_drops_stale_queue_entries() {
    let mgr = RoomManager::default();
    let a = Client::new(1, "ann");
    mgr.find_match(&a.peer, GameType::Race, a.user(), "ANN".into()).await;

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(mgr.sweep().await.queue_entries_dropped, 0);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(mgr.sweep().await.queue_entries_dropped, 1);
    assert_eq!(mgr.queue_len(&GameType::Race).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_sweeper_runs_on_interval() {
    let mgr = std::sync::Arc::new(RoomManager::new(LobbyConfig {
        sweep_interval: Duration::from_secs(30),
        queue_entry_ttl: Duration::from_secs(10),
        ..LobbyConfig::default()
    }));
    let a = Client::new(1, "ann");
    mgr.find_match(&a.peer, GameType::Race, a.user(), "ANN".into()).await;

    let sweeper = arcade_room::spawn_sweeper(std::sync::Arc::clone(&mgr));
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(mgr.queue_len(&GameType::Race).await, 0);
    sweeper.abort();
}
