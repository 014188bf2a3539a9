//! Core error types for tempo

use std::path::PathBuf;
use tempo_protocol::ProtocolError;
use thiserror::Error;

/// Top-level error type for the tempo ecosystem
#[derive(Error, Debug)]
pub enum TempoError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Engine service error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Rejected user input
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the remote engine service
#[derive(Error, Debug)]
pub enum EngineError {
    /// Service unreachable or the request could not be sent
    #[error("Transport failure on {endpoint}: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },

    /// Service answered with a non-success status
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// Service answered with a body we cannot interpret
    #[error("Malformed reply from {endpoint}: {message}")]
    MalformedReply {
        endpoint: &'static str,
        message: String,
    },
}

impl EngineError {
    /// Endpoint the failing call was addressed to
    pub fn endpoint(&self) -> &'static str {
        match self {
            EngineError::Transport { endpoint, .. }
            | EngineError::Status { endpoint, .. }
            | EngineError::MalformedReply { endpoint, .. } => endpoint,
        }
    }
}

/// Session lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No remote session has been established yet
    #[error("No active session")]
    NoActiveSession,

    /// A newer session request replaced this one
    #[error("Session request superseded")]
    Superseded,
}

/// Invalid user input, rejected locally with no side effects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Move is not legal in the current position
    #[error("Illegal move: {0}")]
    IllegalMove(String),

    /// Square or move text could not be parsed
    #[error("Unrecognised move: {0}")]
    UnrecognisedMove(String),

    /// It is not the human's turn
    #[error("Not your turn")]
    NotYourTurn,

    /// The game has already ended
    #[error("Game is over")]
    GameOver,

    /// The game is waiting for the engine service
    #[error("Game not ready: waiting for the engine service")]
    NotReady,

    /// Position descriptor is empty or malformed
    #[error("Invalid FEN, please enter a valid FEN string: {0}")]
    InvalidFen(String),

    /// Time control value is not a non-negative decimal number
    #[error("Invalid time value: {0:?}")]
    InvalidTimeValue(String),

    /// Side name is neither white nor black
    #[error("Unknown colour {0:?}, expected white or black")]
    UnknownColor(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
