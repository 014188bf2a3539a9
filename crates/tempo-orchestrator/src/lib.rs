//! tempo-orchestrator: Game-session orchestrator for timed engine games
//!
//! Keeps a two-clock timed game, a local rules oracle and a remote
//! move-generation service consistent despite overlapping asynchronous
//! operations. The [`machine::Game`] state machine is the only writer of
//! the position and clocks; the [`coordinator::Coordinator`] feeds it user
//! commands, clock ticks and network completions one at a time.

pub mod clock;
pub mod command;
pub mod coordinator;
pub mod engine;
pub mod machine;
pub mod render;
pub mod rules;
pub mod session;
pub mod sync;
pub mod view;

pub use coordinator::{Coordinator, CoordinatorHandle};
pub use machine::{Game, GameSettings};
pub use rules::{RulesOracle, StandardRules};
