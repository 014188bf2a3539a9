//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::InputError;

/// Side of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Array index (white = 0, black = 1)
    pub fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    /// Parse from a colour name or FEN side-to-move letter
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "white" => Some(Color::White),
            "b" | "black" => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "White"),
            Color::Black => write!(f, "Black"),
        }
    }
}

/// Why a game ended in a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawReason::Stalemate => write!(f, "stalemate"),
            DrawReason::InsufficientMaterial => write!(f, "insufficient material"),
            DrawReason::FiftyMoveRule => write!(f, "fifty-move rule"),
            DrawReason::ThreefoldRepetition => write!(f, "threefold repetition"),
        }
    }
}

/// How a session ended. Set at most once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameOutcome {
    Checkmate { winner: Color },
    Draw { reason: DrawReason },
    Resignation { winner: Color },
    Timeout { winner: Color },
}

impl GameOutcome {
    /// Winning side, if the game was decisive
    pub fn winner(&self) -> Option<Color> {
        match self {
            GameOutcome::Checkmate { winner }
            | GameOutcome::Resignation { winner }
            | GameOutcome::Timeout { winner } => Some(*winner),
            GameOutcome::Draw { .. } => None,
        }
    }
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::Checkmate { winner } => write!(f, "Checkmate! {} wins!", winner),
            GameOutcome::Draw { reason } => write!(f, "Draw by {}!", reason),
            GameOutcome::Resignation { winner } => {
                write!(f, "{} resigned. {} wins!", winner.opposite(), winner)
            }
            GameOutcome::Timeout { winner } => write!(f, "{} wins on time!", winner),
        }
    }
}

/// Base time per side plus the per-move increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    /// Starting time for each side
    pub base: Duration,
    /// Time added after each completed move
    pub increment: Duration,
}

impl TimeControl {
    /// Create a time control from exact durations
    pub fn new(base: Duration, increment: Duration) -> Self {
        Self { base, increment }
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3 * 60),
            increment: Duration::ZERO,
        }
    }
}

/// Parse a non-negative decimal number of minutes, e.g. `3` or `0.5`
pub fn parse_minutes(value: &str) -> Result<Duration, InputError> {
    parse_decimal(value).and_then(|minutes| to_duration(value, minutes * 60.0))
}

/// Parse a non-negative decimal number of seconds
pub fn parse_seconds(value: &str) -> Result<Duration, InputError> {
    parse_decimal(value).and_then(|secs| to_duration(value, secs))
}

/// Accepts digits with at most one decimal point and nothing else
fn parse_decimal(value: &str) -> Result<f64, InputError> {
    let value = value.trim();
    let digits_only = value.chars().all(|c| c.is_ascii_digit() || c == '.')
        && value.chars().filter(|c| *c == '.').count() <= 1;

    if !digits_only || !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(InputError::InvalidTimeValue(value.to_string()));
    }

    value
        .parse::<f64>()
        .map_err(|_| InputError::InvalidTimeValue(value.to_string()))
}

fn to_duration(raw: &str, secs: f64) -> Result<Duration, InputError> {
    duration_from_secs(secs).ok_or_else(|| InputError::InvalidTimeValue(raw.trim().to_string()))
}

/// Largest time value accepted for a base time or increment, in seconds.
/// Keeps clock arithmetic (base plus many increments) far from overflow.
pub const MAX_TIME_SECS: u64 = u64::MAX / 4;

/// Non-negative, finite and at most [`MAX_TIME_SECS`]
pub fn duration_from_secs(secs: f64) -> Option<Duration> {
    if !(0.0..=MAX_TIME_SECS as f64).contains(&secs) {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Format a duration as `MM:SS`, truncating fractional seconds
pub fn format_clock(remaining: Duration) -> String {
    let total = remaining.as_secs();
    format!("{:02}:{:02}", total / 60, total % 60)
}
