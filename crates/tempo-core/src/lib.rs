//! tempo-core: Core abstractions and configuration for tempo
//!
//! This crate provides the domain types, error taxonomy, configuration
//! structures and the remote engine service trait shared by the
//! orchestrator and its front ends.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::TempoError;
pub use traits::EngineService;
pub use types::{Color, DrawReason, GameOutcome, TimeControl};
