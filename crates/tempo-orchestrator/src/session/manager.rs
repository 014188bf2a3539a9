//! Session manager implementation

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;

use super::backoff::ExponentialBackoff;
use tempo_core::config::BackoffConfig;
use tempo_core::error::SessionError;
use tempo_protocol::{SessionId, StartDescriptor};

/// Local counter identifying one session request.
///
/// Every asynchronous call made on behalf of a session carries the
/// generation it was issued under; a mismatch marks the result as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Result of beginning a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    /// Generation the new session request was issued under
    pub generation: Generation,
    /// Previously active session, to be ended remotely (best effort)
    pub retire: Option<SessionId>,
}

/// Tracks the single active remote session
pub struct SessionManager {
    generation: Generation,
    /// Confirmed session for the current generation
    active: Option<SessionId>,
    /// Descriptor of a start request still waiting for confirmation
    pending: Option<StartDescriptor>,
    backoff: ExponentialBackoff,
    /// Latest session token, read by the keep-alive task
    id_tx: watch::Sender<Option<SessionId>>,
}

impl SessionManager {
    /// Create a session manager with no session
    pub fn new(backoff: &BackoffConfig) -> Self {
        let (id_tx, _) = watch::channel(None);
        Self {
            generation: Generation(0),
            active: None,
            pending: None,
            backoff: ExponentialBackoff::from_config(backoff),
            id_tx,
        }
    }

    /// Invalidate the current session and request a new one
    pub fn begin(&mut self, descriptor: StartDescriptor) -> SessionTransition {
        self.generation = Generation(self.generation.0 + 1);
        let retire = self.active.take();
        self.pending = Some(descriptor);
        self.backoff.reset();
        self.id_tx.send_replace(None);

        tracing::debug!(
            "Session {} requested (retiring {:?})",
            self.generation,
            retire
        );

        SessionTransition {
            generation: self.generation,
            retire,
        }
    }

    /// Adopt the id the service assigned for `generation`.
    ///
    /// Fails with [`SessionError::Superseded`] if a newer request has been
    /// made since; the caller should end `id` remotely.
    pub fn confirm(&mut self, generation: Generation, id: SessionId) -> Result<(), SessionError> {
        if !self.is_current(generation) || self.pending.is_none() {
            return Err(SessionError::Superseded);
        }
        self.pending = None;
        self.active = Some(id);
        self.id_tx.send_replace(Some(id));
        tracing::info!("Session {} established as {}", generation, id);
        Ok(())
    }

    /// Delay and descriptor for retrying a failed start, if `generation`
    /// is still the one waiting for a session
    pub fn retry(&mut self, generation: Generation) -> Option<(Duration, StartDescriptor)> {
        if !self.is_current(generation) {
            return None;
        }
        let descriptor = self.pending.clone()?;
        Some((self.backoff.next_delay(), descriptor))
    }

    /// The confirmed session, if any
    pub fn active(&self) -> Option<SessionId> {
        self.active
    }

    /// Active session or [`SessionError::NoActiveSession`]
    pub fn require_active(&self) -> Result<SessionId, SessionError> {
        self.active.ok_or(SessionError::NoActiveSession)
    }

    /// Current generation
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether `generation` is the latest request
    fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Watch the session token as it changes
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionId>> {
        self.id_tx.subscribe()
    }
}
