//! Trait definitions for external collaborators

mod engine;

pub use engine::EngineService;
