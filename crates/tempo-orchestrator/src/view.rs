//! Presentation-layer outputs
//!
//! The coordinator publishes a fresh [`GameView`] after every event it
//! processes and broadcasts each [`Notification`] once, at the moment the
//! state machine detects it.

use serde::Serialize;
use std::time::Duration;

use tempo_core::error::InputError;
use tempo_core::types::{Color, GameOutcome};
use tempo_protocol::{EngineMove, SessionId};

/// Coarse turn state, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingSession,
    PlayerToMove,
    EngineToMove,
    Terminal,
    Halted,
}

/// Snapshot of everything a front end renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    /// Current position
    pub fen: String,
    /// Side to move in `fen`
    pub turn: Color,
    /// Colour the human controls
    pub human: Color,
    /// Colour drawn at the bottom of the board
    pub orientation: Color,
    pub phase: Phase,
    pub white_remaining: Duration,
    pub black_remaining: Duration,
    /// Side whose clock is (or was last) counting down
    pub side_on_clock: Option<Color>,
    pub clock_running: bool,
    /// Sides below the low-time threshold, indexed by [`Color::index`]
    pub low_time: [bool; 2],
    pub outcome: Option<GameOutcome>,
    pub session: Option<SessionId>,
}

impl GameView {
    /// Remaining time for `side`
    pub fn remaining(&self, side: Color) -> Duration {
        match side {
            Color::White => self.white_remaining,
            Color::Black => self.black_remaining,
        }
    }
}

/// One-time user-visible events
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The game reached a terminal state
    GameOver(GameOutcome),
    /// User input was rejected without any state change
    Rejected(InputError),
    /// The engine sent a move the rules oracle refused; the game is frozen
    ProtocolViolation { mv: EngineMove, reason: String },
    /// The engine did not answer; the game waits until reset
    EngineUnavailable(String),
    /// Starting a session failed; retrying after `retry_in`
    SessionUnavailable { reason: String, retry_in: Duration },
}
