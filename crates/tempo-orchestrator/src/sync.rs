//! Move synchronization with the engine service
//!
//! Two operations keep the remote position in step with the local one:
//! reporting every applied move, and asking for the engine's reply.
//!
//! Reports are fire-and-forget but delivered in order through a single
//! [`MoveReporter`] queue, so the service never sees a later move before an
//! earlier one. Engine requests carry a [`RequestToken`]; the state machine
//! only accepts a reply whose token matches the half-move it is waiting on.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::session::Generation;
use tempo_core::error::EngineError;
use tempo_core::EngineService;
use tempo_protocol::{ClockBudget, EngineMove, SessionId};

/// Identifies one engine request: the session generation and the ply the
/// engine is asked to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    pub generation: Generation,
    pub ply: u32,
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/ply-{}", self.generation, self.ply)
    }
}

/// Ordered, fire-and-forget move reports
#[derive(Clone)]
pub struct MoveReporter {
    tx: mpsc::UnboundedSender<(SessionId, EngineMove)>,
}

impl MoveReporter {
    /// Spawn the reporting task
    pub fn spawn(engine: Arc<dyn EngineService>, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_reporter(engine, rx, cancel));
        Self { tx }
    }

    /// Queue a move report. Failures are logged by the reporting task and
    /// never affect local state.
    pub fn report(&self, session: SessionId, mv: EngineMove) {
        if self.tx.send((session, mv)).is_err() {
            tracing::warn!("Move reporter stopped; report for {} dropped", session);
        }
    }
}

async fn run_reporter(
    engine: Arc<dyn EngineService>,
    mut rx: mpsc::UnboundedReceiver<(SessionId, EngineMove)>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some((session, mv)) = next else { break };
                match engine.report_move(session, &mv).await {
                    Ok(()) => tracing::debug!("Reported {} for {}", mv, session),
                    Err(e) => tracing::warn!("Failed to report {} for {}: {}", mv, session, e),
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// Ask the engine for its move, logging the outcome
pub async fn request_engine_move(
    engine: &dyn EngineService,
    token: RequestToken,
    session: SessionId,
    budget: ClockBudget,
) -> Result<EngineMove, EngineError> {
    tracing::debug!("Requesting engine move {} for {} ({:?})", token, session, budget);
    let result = engine.best_move(session, budget).await;
    match &result {
        Ok(mv) => tracing::info!("Engine move {} for {}", mv, token),
        Err(e) => tracing::error!("Engine move request {} failed: {}", token, e),
    }
    result
}
