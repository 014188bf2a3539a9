//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding engine service messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Move text is not in long algebraic form
    #[error("Malformed move text: {0:?}")]
    MalformedMove(String),

    /// Start descriptor body could not be understood
    #[error("Malformed start descriptor: {0:?}")]
    MalformedDescriptor(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
