//! Keep-alive task
//!
//! Pings the engine service on a fixed interval for the lifetime of the
//! process so the service can reap sessions whose client went away. The
//! ping is sent whether or not a session is active; before the first
//! session exists it carries [`SessionId::UNASSIGNED`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use tempo_core::EngineService;
use tempo_protocol::SessionId;

/// Run the keep-alive loop until cancelled.
///
/// # Arguments
///
/// * `engine` - The engine service to ping
/// * `session` - Latest session token, published by the session manager
/// * `period` - Interval between pings; the first ping is one period in
/// * `cancel` - Cancellation token for graceful shutdown
pub async fn run_keepalive(
    engine: Arc<dyn EngineService>,
    session: watch::Receiver<Option<SessionId>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    // A slow ping pushes the schedule back instead of queueing catch-up pings
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Last id the service assigned, kept across resets while a new one is pending
    let mut last_known = SessionId::UNASSIGNED;

    tracing::info!("Starting keep-alive task (interval: {:?})", period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = *session.borrow();
                if let Some(id) = current {
                    last_known = id;
                }
                match engine.keep_alive(last_known).await {
                    Ok(()) => tracing::debug!("Keep-alive for {} acknowledged", last_known),
                    Err(e) => tracing::warn!("Keep-alive for {} failed: {}", last_known, e),
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Keep-alive task shutting down");
                break;
            }
        }
    }
}
