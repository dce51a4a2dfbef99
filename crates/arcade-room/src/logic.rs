//! Game-type rules: round lengths, shared data generation, and action
//! scoring.
//!
//! Everything here is synchronous and free of room state; the room actor
//! hands in the acting seat's tally and applies the returned
//! [`Resolution`].
//!
//! # Trust boundary
//!
//! `reactionTime` scores the client-reported `reactionMs`, and
//! `scramble`/`wordGuess` take the client's word for `correct`. Neither is
//! checked against anything server-side. Trivia answers are checked
//! against the generated questions.

use std::time::Duration;

use arcade_protocol::{GameData, GameType, LeaderboardEntry, PlayerView, TriviaQuestion};
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

use crate::content::{TRIVIA, WORDS};
use crate::RoomError;

/// Race finish line when the game data does not say otherwise.
const RACE_DISTANCE: u32 = 100;
const REACTION_ROUNDS: u32 = 3;
const TRIVIA_QUESTIONS: usize = 3;

/// Round length for `game_type` when the room creator does not pick one.
pub fn default_round_duration(game_type: &GameType) -> Duration {
    let ms = match game_type {
        GameType::Race => 15_000,
        GameType::ClickBattle => 5_000,
        GameType::ReactionTime => 10_000,
        GameType::Trivia => 30_000,
        GameType::Scramble => 60_000,
        GameType::WordGuess => 90_000,
        GameType::Other(_) => 30_000,
    };
    Duration::from_millis(ms)
}

/// Builds the shared payload every participant receives at round start.
pub fn generate_game_data<R: Rng + ?Sized>(game_type: &GameType, rng: &mut R) -> GameData {
    match game_type {
        GameType::Race => GameData::Race { distance: RACE_DISTANCE },
        GameType::ClickBattle => GameData::ClickBattle,
        GameType::ReactionTime => GameData::ReactionTime { rounds: REACTION_ROUNDS },
        GameType::Trivia => GameData::Trivia {
            questions: TRIVIA
                .choose_multiple(rng, TRIVIA_QUESTIONS)
                .map(|(question, options, correct)| TriviaQuestion {
                    question: (*question).to_owned(),
                    options: options.iter().map(|o| (*o).to_owned()).collect(),
                    correct: *correct,
                })
                .collect(),
        },
        GameType::Scramble => {
            let word = pick_word(rng);
            GameData::Scramble {
                scrambled: scramble(word, rng),
                word: word.to_owned(),
                length: word.chars().count(),
            }
        }
        GameType::WordGuess => {
            let word = pick_word(rng);
            GameData::WordGuess {
                hint: hint(word),
                word: word.to_owned(),
                length: word.chars().count(),
            }
        }
        GameType::Other(_) => GameData::Empty,
    }
}

fn pick_word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or("ARCADE")
}

/// Shuffles the letters of `word`, retrying a few times so the result
/// differs from the original whenever that is possible.
fn scramble<R: Rng + ?Sized>(word: &str, rng: &mut R) -> String {
    let mut letters: Vec<char> = word.chars().collect();
    for _ in 0..8 {
        letters.shuffle(rng);
        let candidate: String = letters.iter().collect();
        if candidate != word {
            return candidate;
        }
    }
    letters.into_iter().collect()
}

/// First letter shown, the rest masked: `STREAM` → `S_____`.
fn hint(word: &str) -> String {
    word.chars()
        .enumerate()
        .map(|(i, c)| if i == 0 { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// Action resolution
// ---------------------------------------------------------------------------

/// Per-seat game-local state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Tally {
    pub score: i64,
    /// Race distance covered.
    pub position: f64,
}

/// What an action did, for the room to broadcast.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolution {
    /// The seat's score moved; `position` for races. `finished` means the
    /// acting player crossed the line.
    Scored { position: Option<f64>, finished: bool },
    /// A trivia answer was judged.
    Answered { question_idx: usize, correct: bool, points: i64 },
    /// A word guess; a `correct` guess ends the round.
    Guessed { guess: String, correct: bool },
    /// Not an action this game scores; pass it on untouched.
    Relay,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct React {
    reaction_ms: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Answer {
    question_idx: usize,
    answer_idx: usize,
    #[serde(default)]
    time_ms: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Guess {
    #[serde(default)]
    guess: String,
    #[serde(default)]
    correct: bool,
    #[serde(default)]
    time_ms: f64,
}

fn parse<T: for<'de> Deserialize<'de>>(action: &str, payload: &Value) -> Result<T, RoomError> {
    T::deserialize(payload).map_err(|_| RoomError::InvalidAction(action.to_owned()))
}

/// Saturates at the `i64` bounds; client timings are unchecked.
fn rounded(x: f64) -> i64 {
    x.round() as i64
}

/// Applies `action` to `tally` under the rules of `game_type`.
pub(crate) fn resolve<R: Rng + ?Sized>(
    game_type: &GameType,
    game_data: &GameData,
    tally: &mut Tally,
    action: &str,
    payload: &Value,
    rng: &mut R,
) -> Result<Resolution, RoomError> {
    match (game_type, action) {
        (GameType::Race, "tap") => {
            tally.position += rng.random_range(3.0..8.0);
            tally.score = rounded(tally.position);
            let distance = match game_data {
                GameData::Race { distance } => *distance,
                _ => RACE_DISTANCE,
            };
            Ok(Resolution::Scored {
                position: Some(tally.position),
                finished: tally.position >= f64::from(distance),
            })
        }
        (GameType::ClickBattle, "click") => {
            tally.score = tally.score.saturating_add(1);
            Ok(Resolution::Scored { position: None, finished: false })
        }
        (GameType::ReactionTime, "react") => {
            let React { reaction_ms } = parse(action, payload)?;
            tally.score = tally.score.saturating_add(rounded(1000.0 - reaction_ms).max(0));
            Ok(Resolution::Scored { position: None, finished: false })
        }
        (GameType::Trivia, "answer") => {
            let answer: Answer = parse(action, payload)?;
            let GameData::Trivia { questions } = game_data else {
                return Err(RoomError::InvalidAction(action.to_owned()));
            };
            let question = questions
                .get(answer.question_idx)
                .ok_or_else(|| RoomError::InvalidAction(action.to_owned()))?;
            let correct = answer.answer_idx == question.correct;
            let points = if correct {
                rounded(100.0 - answer.time_ms / 300.0).max(10)
            } else {
                0
            };
            tally.score = tally.score.saturating_add(points);
            Ok(Resolution::Answered {
                question_idx: answer.question_idx,
                correct,
                points,
            })
        }
        (GameType::Scramble | GameType::WordGuess, "guess") => {
            let Guess { guess, correct, time_ms } = parse(action, payload)?;
            if correct {
                tally.score = tally.score.saturating_add(rounded(500.0 - time_ms / 200.0).max(10));
            }
            Ok(Resolution::Guessed { guess, correct })
        }
        _ => Ok(Resolution::Relay),
    }
}

/// Ranks players by score, highest first. Ties keep seat order.
pub fn leaderboard(players: &[PlayerView]) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&PlayerView> = players.iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i + 1,
            user_id: p.user_id.clone(),
            username: p.username.clone(),
            score: p.score,
        })
        .collect()
}
