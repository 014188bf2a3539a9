//! Scripted in-memory engine for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tempo_core::error::EngineError;
use tempo_core::EngineService;
use tempo_protocol::{ClockBudget, EngineMove, SessionId, StartDescriptor};

/// A call received by [`FakeEngine`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(StartDescriptor),
    BestMove(SessionId, ClockBudget),
    Report(SessionId, String),
    End(SessionId),
    KeepAlive(SessionId),
}

/// Engine that answers from a script.
///
/// Session ids count up from 1. `best_move` pops the next scripted reply
/// after `reply_delay`; with the script exhausted it never answers.
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    replies: Mutex<VecDeque<String>>,
    reply_delay: Duration,
    failing_starts: AtomicU32,
    slow_first_ping: Mutex<Option<Duration>>,
}

impl FakeEngine {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            reply_delay: Duration::ZERO,
            failing_starts: AtomicU32::new(0),
            slow_first_ping: Mutex::new(None),
        }
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Fail the next `count` session starts
    pub fn with_failing_starts(self, count: u32) -> Self {
        self.failing_starts.store(count, Ordering::SeqCst);
        self
    }

    /// Hold the first keep-alive for `delay` before acknowledging it
    pub fn with_slow_first_ping(self, delay: Duration) -> Self {
        *self.slow_first_ping.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Report(_, mv) => Some(mv),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EngineService for FakeEngine {
    async fn start_session(&self, descriptor: &StartDescriptor) -> Result<SessionId, EngineError> {
        self.record(Call::Start(descriptor.clone()));
        let failing = self.failing_starts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_starts.store(failing - 1, Ordering::SeqCst);
            return Err(EngineError::Transport {
                endpoint: "newgame",
                message: "connection refused".to_string(),
            });
        }
        Ok(SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn best_move(
        &self,
        session: SessionId,
        budget: ClockBudget,
    ) -> Result<EngineMove, EngineError> {
        self.record(Call::BestMove(session, budget));
        tokio::time::sleep(self.reply_delay).await;
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(text) => EngineMove::parse(&text).map_err(|e| EngineError::MalformedReply {
                endpoint: "bestmove",
                message: e.to_string(),
            }),
            None => std::future::pending().await,
        }
    }

    async fn report_move(&self, session: SessionId, mv: &EngineMove) -> Result<(), EngineError> {
        self.record(Call::Report(session, mv.to_string()));
        Ok(())
    }

    async fn end_session(&self, session: SessionId) -> Result<(), EngineError> {
        self.record(Call::End(session));
        Ok(())
    }

    async fn keep_alive(&self, session: SessionId) -> Result<(), EngineError> {
        self.record(Call::KeepAlive(session));
        let delay = self.slow_first_ping.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}
