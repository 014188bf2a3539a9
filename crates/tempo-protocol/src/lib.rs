//! tempo-protocol: Wire types for the remote engine service
//!
//! This crate defines the request and response shapes exchanged with the
//! remote move-generation service over HTTP: session tokens, game start
//! descriptors, clock budgets and move text.

pub mod endpoint;
pub mod error;
pub mod message;
pub mod session;

pub use error::ProtocolError;
pub use message::{ClockBudget, EngineMove, NewGameResponse, StartDescriptor};
pub use session::SessionId;
