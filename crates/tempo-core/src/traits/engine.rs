//! Remote engine service trait

use async_trait::async_trait;

use crate::error::EngineError;
use tempo_protocol::{ClockBudget, EngineMove, SessionId, StartDescriptor};

/// The remote move-generation service.
///
/// Every call may fail over an unreliable transport. Implementations report
/// failures as [`EngineError`] and never panic.
#[async_trait]
pub trait EngineService: Send + Sync {
    /// Open a new session for the given starting position
    async fn start_session(&self, descriptor: &StartDescriptor) -> Result<SessionId, EngineError>;

    /// Ask the engine for its move in the session's current position
    async fn best_move(
        &self,
        session: SessionId,
        budget: ClockBudget,
    ) -> Result<EngineMove, EngineError>;

    /// Tell the engine a move was applied, from either side
    async fn report_move(&self, session: SessionId, mv: &EngineMove) -> Result<(), EngineError>;

    /// Abandon a session
    async fn end_session(&self, session: SessionId) -> Result<(), EngineError>;

    /// Liveness ping. Stale or unassigned ids are tolerated remotely.
    async fn keep_alive(&self, session: SessionId) -> Result<(), EngineError>;
}
