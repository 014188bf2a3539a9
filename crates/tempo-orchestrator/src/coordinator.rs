//! Event loop driving the game state machine
//!
//! The [`Coordinator`] owns the [`Game`] and is the only task that touches
//! it. Everything that can change game state arrives here as an [`Event`]:
//! user commands from the [`CoordinatorHandle`], clock ticks from the local
//! ticker, and completions of the network calls the coordinator spawned.
//! Events are processed strictly one at a time.
//!
//! Network calls never run on the loop itself. Each [`Effect`] that needs
//! I/O is spawned as its own task, which reports back through the
//! completions channel with the token it was issued under.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval_at, sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::machine::{Effect, Event, Game, GameSettings};
use crate::rules::RulesOracle;
use crate::session::run_keepalive;
use crate::sync::{request_engine_move, MoveReporter};
use crate::view::{GameView, Notification};
use tempo_core::config::ClientConfig;
use tempo_core::{EngineService, TempoError};
use tempo_protocol::SessionId;

/// Buffered user commands before senders wait
const COMMAND_BUFFER: usize = 32;

/// Buffered notifications per subscriber
const NOTIFICATION_BUFFER: usize = 64;

/// Errors surfaced through the [`CoordinatorHandle`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The coordinator loop has exited
    #[error("Coordinator stopped")]
    Stopped,
}

/// Front-end side of the coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<GameView>,
    notifications: broadcast::Sender<Notification>,
}

impl CoordinatorHandle {
    /// Queue a user command
    pub async fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoordinatorError::Stopped)
    }

    /// Latest published view
    pub fn current_view(&self) -> GameView {
        self.view.borrow().clone()
    }

    /// Watch the view as it changes
    pub fn view(&self) -> watch::Receiver<GameView> {
        self.view.clone()
    }

    /// Receive notifications raised from now on
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }
}

/// Owns the game and serializes every event applied to it
pub struct Coordinator<R: RulesOracle> {
    game: Game<R>,
    engine: Arc<dyn EngineService>,
    tick_interval: Duration,
    keepalive_interval: Duration,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions_rx: mpsc::UnboundedReceiver<Event>,
    view_tx: watch::Sender<GameView>,
    notify_tx: broadcast::Sender<Notification>,
}

impl<R: RulesOracle> Coordinator<R> {
    /// Create a coordinator and its handle
    pub fn new(
        rules: R,
        engine: Arc<dyn EngineService>,
        settings: GameSettings,
        keepalive_interval: Duration,
    ) -> (Self, CoordinatorHandle) {
        let tick_interval = settings.tick_unit;
        let game = Game::new(rules, settings);

        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(game.view());
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_BUFFER);

        let handle = CoordinatorHandle {
            commands: commands_tx,
            view,
            notifications: notify_tx.clone(),
        };

        let coordinator = Self {
            game,
            engine,
            tick_interval,
            keepalive_interval,
            commands,
            completions_tx,
            completions_rx,
            view_tx,
            notify_tx,
        };

        (coordinator, handle)
    }

    /// Create a coordinator from the client configuration
    pub fn from_config(
        rules: R,
        engine: Arc<dyn EngineService>,
        config: &ClientConfig,
    ) -> Result<(Self, CoordinatorHandle), TempoError> {
        config.validate()?;
        let settings = GameSettings::from_config(config)?;
        Ok(Self::new(rules, engine, settings, config.keepalive_interval))
    }

    /// Run until cancelled or every handle is dropped.
    ///
    /// Background tasks (keep-alive, move reporting, pending requests) are
    /// cancelled on exit and the active session is ended best effort.
    pub async fn run(mut self, cancel: CancellationToken) {
        let shutdown = cancel.child_token();

        let reporter = MoveReporter::spawn(self.engine.clone(), shutdown.clone());
        tokio::spawn(run_keepalive(
            self.engine.clone(),
            self.game.sessions().subscribe(),
            self.keepalive_interval,
            shutdown.clone(),
        ));

        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        let mut epoch = self.game.clock().epoch();

        tracing::info!("Coordinator started (tick: {:?})", self.tick_interval);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(event) = self.completions_rx.recv() => event,
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => {
                        tracing::info!("All handles dropped");
                        break;
                    }
                },
                _ = ticker.tick() => Event::Tick,
            };

            self.dispatch(event, &reporter, &shutdown);

            // The clock restarted or stopped: count the next tick from now
            let current = self.game.clock().epoch();
            if current != epoch {
                epoch = current;
                ticker.reset();
            }
        }

        shutdown.cancel();
        if let Some(session) = self.game.sessions().active() {
            end_session(self.engine.as_ref(), session).await;
        }
        tracing::info!("Coordinator stopped");
    }

    fn dispatch(&mut self, event: Event, reporter: &MoveReporter, shutdown: &CancellationToken) {
        for effect in self.game.handle(event) {
            self.execute(effect, reporter, shutdown);
        }
        self.view_tx.send_replace(self.game.view());
    }

    fn execute(&self, effect: Effect, reporter: &MoveReporter, shutdown: &CancellationToken) {
        match effect {
            Effect::StartSession {
                generation,
                descriptor,
                retire,
                delay,
            } => {
                if let Some(session) = retire {
                    self.spawn_end_session(session);
                }
                let engine = self.engine.clone();
                let tx = self.completions_tx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.cancelled() => return,
                    }
                    let result = engine.start_session(&descriptor).await;
                    let _ = tx.send(Event::SessionStarted { generation, result });
                });
            }
            Effect::EndSession(session) => self.spawn_end_session(session),
            Effect::ReportMove { session, mv } => reporter.report(session, mv),
            Effect::ScheduleEngineRequest { token, delay } => {
                let tx = self.completions_tx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = sleep(delay) => {
                            let _ = tx.send(Event::SettleElapsed(token));
                        }
                        _ = shutdown.cancelled() => {}
                    }
                });
            }
            Effect::RequestEngineMove {
                token,
                session,
                budget,
            } => {
                let engine = self.engine.clone();
                let tx = self.completions_tx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        result = request_engine_move(engine.as_ref(), token, session, budget) => {
                            let _ = tx.send(Event::EngineReplied { token, result });
                        }
                        _ = shutdown.cancelled() => {}
                    }
                });
            }
            Effect::Notify(notification) => {
                // No subscribers is fine
                let _ = self.notify_tx.send(notification);
            }
        }
    }

    fn spawn_end_session(&self, session: SessionId) {
        let engine = self.engine.clone();
        tokio::spawn(async move { end_session(engine.as_ref(), session).await });
    }
}

async fn end_session(engine: &dyn EngineService, session: SessionId) {
    match engine.end_session(session).await {
        Ok(()) => tracing::debug!("Ended session {}", session),
        Err(e) => tracing::warn!("Failed to end session {}: {}", session, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MoveAttempt;
    use crate::engine::fake::{Call, FakeEngine};
    use crate::rules::StandardRules;
    use crate::view::Phase;
    use tempo_core::config::BackoffConfig;
    use tempo_core::error::ConfigError;
    use tempo_core::types::{Color, GameOutcome, TimeControl};
    use tempo_protocol::{ClockBudget, StartDescriptor};

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn settings(base_secs: u64) -> GameSettings {
        GameSettings {
            time_control: TimeControl::new(Duration::from_secs(base_secs), Duration::ZERO),
            tick_unit: Duration::from_secs(1),
            settle_delay: Duration::from_millis(500),
            start_backoff: BackoffConfig {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(4),
                multiplier: 2.0,
                jitter: 0.0,
            },
            low_time_threshold: Duration::from_secs(30),
        }
    }

    fn spawn(engine: Arc<FakeEngine>, base_secs: u64) -> (CoordinatorHandle, CancellationToken) {
        let (coordinator, handle) = Coordinator::new(
            StandardRules::new(),
            engine,
            settings(base_secs),
            Duration::from_secs(30),
        );
        let cancel = CancellationToken::new();
        tokio::spawn(coordinator.run(cancel.clone()));
        (handle, cancel)
    }

    async fn wait_until(
        handle: &CoordinatorHandle,
        condition: impl FnMut(&GameView) -> bool,
    ) -> GameView {
        let mut view = handle.view();
        let seen = view.wait_for(condition).await.unwrap().clone();
        seen
    }

    fn mv(text: &str) -> Command {
        Command::Move(MoveAttempt::parse(text).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_move_cycle() {
        let engine = Arc::new(FakeEngine::new(&["e7e5"]));
        let (handle, cancel) = spawn(engine.clone(), 180);

        handle.send(Command::NewGame).await.unwrap();
        let view = wait_until(&handle, |v| v.phase == Phase::PlayerToMove).await;
        assert_eq!(view.session, Some(SessionId::new(1)));
        assert_eq!(view.fen, START_FEN);

        handle.send(mv("e2e4")).await.unwrap();
        let view = wait_until(&handle, |v| {
            v.phase == Phase::PlayerToMove && v.fen != START_FEN
        })
        .await;
        assert_eq!(view.turn, Color::White);
        assert_eq!(view.side_on_clock, Some(Color::White));
        assert!(view.clock_running);

        assert_eq!(
            engine.calls()[..4],
            [
                Call::Start(StartDescriptor::StartPos),
                Call::Report(SessionId::new(1), "e2e4".to_string()),
                Call::BestMove(
                    SessionId::new(1),
                    ClockBudget {
                        white_ms: 180_000,
                        white_inc_ms: 0,
                        black_ms: 180_000,
                        black_inc_ms: 0,
                    }
                ),
                Call::Report(SessionId::new(1), "e7e5".to_string()),
            ]
        );
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_new_game_is_discarded() {
        let engine = Arc::new(FakeEngine::new(&["e7e5"]).with_reply_delay(Duration::from_secs(5)));
        let (handle, cancel) = spawn(engine.clone(), 180);

        handle.send(Command::NewGame).await.unwrap();
        wait_until(&handle, |v| v.phase == Phase::PlayerToMove).await;
        handle.send(mv("e2e4")).await.unwrap();

        // Past the settle delay: the request is in flight
        sleep(Duration::from_secs(1)).await;
        assert!(matches!(engine.calls().last(), Some(Call::BestMove(..))));

        handle.send(Command::NewGame).await.unwrap();
        wait_until(&handle, |v| {
            v.phase == Phase::PlayerToMove && v.session == Some(SessionId::new(2))
        })
        .await;

        // Let the stale reply land
        sleep(Duration::from_secs(10)).await;
        let view = handle.current_view();
        assert_eq!(view.fen, START_FEN);
        assert_eq!(view.phase, Phase::PlayerToMove);
        assert_eq!(engine.reports(), vec!["e2e4".to_string()]);
        assert!(engine.calls().contains(&Call::End(SessionId::new(1))));
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_clock_runs_out() {
        // No scripted replies: the engine never answers
        let engine = Arc::new(FakeEngine::new(&[]));
        let (handle, cancel) = spawn(engine, 3);
        let mut notifications = handle.notifications();

        handle.send(Command::PlayAs(Color::Black)).await.unwrap();
        let notification = notifications.recv().await.unwrap();
        assert_eq!(
            notification,
            Notification::GameOver(GameOutcome::Timeout {
                winner: Color::Black
            })
        );

        let view = handle.current_view();
        assert_eq!(view.phase, Phase::Terminal);
        assert_eq!(view.white_remaining, Duration::ZERO);
        assert_eq!(view.black_remaining, Duration::from_secs(3));
        assert!(!view.clock_running);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_before_any_session() {
        let engine = Arc::new(FakeEngine::new(&[]));
        let (_handle, cancel) = spawn(engine.clone(), 180);

        sleep(Duration::from_secs(31)).await;
        assert_eq!(engine.calls(), vec![Call::KeepAlive(SessionId::UNASSIGNED)]);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_start_retried() {
        let engine = Arc::new(FakeEngine::new(&[]).with_failing_starts(2));
        let (handle, cancel) = spawn(engine.clone(), 180);
        let mut notifications = handle.notifications();

        handle.send(Command::NewGame).await.unwrap();
        assert!(matches!(
            notifications.recv().await.unwrap(),
            Notification::SessionUnavailable { retry_in, .. } if retry_in == Duration::from_secs(1)
        ));

        let view = wait_until(&handle, |v| v.phase == Phase::PlayerToMove).await;
        assert_eq!(view.session, Some(SessionId::new(1)));
        let starts = engine
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Start(_)))
            .count();
        assert_eq!(starts, 3);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_input_is_notified() {
        let engine = Arc::new(FakeEngine::new(&[]));
        let (handle, cancel) = spawn(engine, 180);
        let mut notifications = handle.notifications();

        handle.send(mv("e2e4")).await.unwrap();
        assert!(matches!(
            notifications.recv().await.unwrap(),
            Notification::Rejected(_)
        ));
        assert_eq!(handle.current_view().phase, Phase::Idle);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_active_session() {
        let engine = Arc::new(FakeEngine::new(&[]));
        let (coordinator, handle) = Coordinator::new(
            StandardRules::new(),
            engine.clone(),
            settings(180),
            Duration::from_secs(30),
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(coordinator.run(cancel.clone()));

        handle.send(Command::NewGame).await.unwrap();
        wait_until(&handle, |v| v.phase == Phase::PlayerToMove).await;
        drop(handle);
        task.await.unwrap();

        assert_eq!(engine.calls().last(), Some(&Call::End(SessionId::new(1))));
    }

    #[tokio::test]
    async fn test_send_after_stop_fails() {
        let (coordinator, handle) = Coordinator::new(
            StandardRules::new(),
            Arc::new(FakeEngine::new(&[])),
            settings(180),
            Duration::from_secs(30),
        );
        drop(coordinator);
        assert_eq!(
            handle.send(Command::NewGame).await,
            Err(CoordinatorError::Stopped)
        );
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let config = ClientConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        let result =
            Coordinator::from_config(StandardRules::new(), Arc::new(FakeEngine::new(&[])), &config);
        assert!(matches!(
            result.err(),
            Some(TempoError::Config(ConfigError::Invalid(_)))
        ));

        let result = Coordinator::from_config(
            StandardRules::new(),
            Arc::new(FakeEngine::new(&[])),
            &ClientConfig::default(),
        );
        assert!(result.is_ok());
    }
}
