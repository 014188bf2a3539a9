//! Turn state machine
//!
//! [`Game`] is the sole owner of the canonical position and clocks. It
//! consumes one [`Event`] at a time and answers with the [`Effect`]s the
//! coordinator must carry out. It never performs I/O and never waits, so a
//! transition can't be interleaved with another.
//!
//! # States
//!
//! ```text
//! Idle -> AwaitingSessionStart -> PlayerToMove(c) <-> EngineToMove(c) -> Terminal(outcome)
//! ```
//!
//! Resignation and timeout enter `Terminal` from any non-idle state. An
//! engine move the rules oracle rejects freezes the game in `Halted` until
//! the next reset.
//!
//! # Stale results
//!
//! Every asynchronous result carries the [`Generation`] or [`RequestToken`]
//! it was issued under. A result is applied only if the machine is still
//! waiting on exactly that token; anything else is dropped silently.

use std::time::Duration;

use crate::clock::Clock;
use crate::command::{Command, MoveAttempt};
use crate::rules::{Classification, RulesOracle};
use crate::session::{Generation, SessionManager};
use crate::sync::RequestToken;
use crate::view::{GameView, Notification, Phase};
use tempo_core::config::{BackoffConfig, ClientConfig};
use tempo_core::error::{EngineError, InputError};
use tempo_core::types::{parse_minutes, parse_seconds, Color, GameOutcome, TimeControl};
use tempo_protocol::{ClockBudget, EngineMove, SessionId, StartDescriptor};

/// Fixed parameters of the state machine
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Time control applied at the first session start
    pub time_control: TimeControl,
    /// Time removed from the running side per tick
    pub tick_unit: Duration,
    /// Pause between a move handing the turn to the engine and the request
    pub settle_delay: Duration,
    /// Retry policy for failed session starts
    pub start_backoff: BackoffConfig,
    /// Remaining time below which a side is flagged as low
    pub low_time_threshold: Duration,
}

impl GameSettings {
    /// Derive settings from the client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, InputError> {
        Ok(Self {
            time_control: config.time_control()?,
            tick_unit: config.tick_interval,
            settle_delay: config.settle_delay,
            start_backoff: config.start_backoff.clone(),
            low_time_threshold: config.low_time_threshold,
        })
    }
}

/// Progress of the engine's half-move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRequest {
    /// Waiting out the settle delay
    Settling(RequestToken),
    /// Request sent, waiting for the reply
    InFlight(RequestToken),
}

/// Authoritative turn state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No game has been started
    Idle,
    /// Position is set up; waiting for the service to assign a session
    AwaitingSessionStart,
    /// The human, playing this colour, is to move
    PlayerToMove(Color),
    /// The engine, playing `color`, is to move
    EngineToMove { color: Color, request: EngineRequest },
    /// Game over; only a new game leaves this state
    Terminal(GameOutcome),
    /// The engine broke protocol; frozen until a new game
    Halted,
}

/// Inputs to the state machine
#[derive(Debug)]
pub enum Event {
    /// User action from the presentation layer
    Command(Command),
    /// One clock tick interval elapsed
    Tick,
    /// A session start request completed
    SessionStarted {
        generation: Generation,
        result: Result<SessionId, EngineError>,
    },
    /// The settle delay before an engine request elapsed
    SettleElapsed(RequestToken),
    /// An engine move request completed
    EngineReplied {
        token: RequestToken,
        result: Result<EngineMove, EngineError>,
    },
}

/// Work the coordinator performs on the state machine's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// End `retire` (best effort), then start a session after `delay`
    StartSession {
        generation: Generation,
        descriptor: StartDescriptor,
        retire: Option<SessionId>,
        delay: Duration,
    },
    /// End a session nobody will use (best effort)
    EndSession(SessionId),
    /// Tell the service about an applied move (fire-and-forget)
    ReportMove { session: SessionId, mv: EngineMove },
    /// Deliver [`Event::SettleElapsed`] after `delay`
    ScheduleEngineRequest { token: RequestToken, delay: Duration },
    /// Ask the engine for its move and deliver [`Event::EngineReplied`]
    RequestEngineMove {
        token: RequestToken,
        session: SessionId,
        budget: ClockBudget,
    },
    /// Surface to the user immediately
    Notify(Notification),
}

/// The game-session state machine
pub struct Game<R: RulesOracle> {
    rules: R,
    settings: GameSettings,
    position: R::Position,
    clock: Clock,
    sessions: SessionManager,
    state: TurnState,
    /// Colour the human controls this session
    human: Color,
    /// Colour drawn at the bottom; picks the human's colour for new games
    orientation: Color,
    /// Time control for the next session start
    staged: TimeControl,
    /// Half-moves applied this session
    ply: u32,
}

impl<R: RulesOracle> Game<R> {
    /// Create an idle game showing the initial position
    pub fn new(rules: R, settings: GameSettings) -> Self {
        let position = rules.initial_position();
        let clock = Clock::new(settings.time_control, settings.tick_unit);
        let sessions = SessionManager::new(&settings.start_backoff);
        let staged = settings.time_control;

        Self {
            rules,
            settings,
            position,
            clock,
            sessions,
            state: TurnState::Idle,
            human: Color::White,
            orientation: Color::White,
            staged,
            ply: 0,
        }
    }

    /// Current turn state
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Canonical position
    pub fn position(&self) -> &R::Position {
        &self.position
    }

    /// Clock state
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Session bookkeeping
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Colour the human controls
    pub fn human(&self) -> Color {
        self.human
    }

    /// Colour at the bottom of the board
    pub fn orientation(&self) -> Color {
        self.orientation
    }

    /// Apply one event and return the effects it requires
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            Event::Command(command) => self.on_command(command, &mut fx),
            Event::Tick => self.on_tick(&mut fx),
            Event::SessionStarted { generation, result } => {
                self.on_session_started(generation, result, &mut fx)
            }
            Event::SettleElapsed(token) => self.on_settle_elapsed(token, &mut fx),
            Event::EngineReplied { token, result } => {
                self.on_engine_replied(token, result, &mut fx)
            }
        }
        fx
    }

    /// Snapshot for the presentation layer
    pub fn view(&self) -> GameView {
        let white = self.clock.remaining(Color::White);
        let black = self.clock.remaining(Color::Black);
        let low = |remaining: Duration| remaining < self.settings.low_time_threshold;

        GameView {
            fen: self.rules.fen(&self.position),
            turn: self.rules.turn_of(&self.position),
            human: self.human,
            orientation: self.orientation,
            phase: self.phase(),
            white_remaining: white,
            black_remaining: black,
            side_on_clock: self.clock.side_on_clock(),
            clock_running: self.clock.is_running(),
            low_time: [low(white), low(black)],
            outcome: match self.state {
                TurnState::Terminal(outcome) => Some(outcome),
                _ => None,
            },
            session: self.sessions.active(),
        }
    }

    fn phase(&self) -> Phase {
        match self.state {
            TurnState::Idle => Phase::Idle,
            TurnState::AwaitingSessionStart => Phase::AwaitingSession,
            TurnState::PlayerToMove(_) => Phase::PlayerToMove,
            TurnState::EngineToMove { .. } => Phase::EngineToMove,
            TurnState::Terminal(_) => Phase::Terminal,
            TurnState::Halted => Phase::Halted,
        }
    }

    fn on_command(&mut self, command: Command, fx: &mut Vec<Effect>) {
        match command {
            Command::Move(attempt) => self.on_move(attempt, fx),
            Command::NewGame => {
                let position = self.rules.initial_position();
                self.start_game(position, StartDescriptor::StartPos, self.orientation, fx);
            }
            Command::PlayAs(color) => {
                self.orientation = color;
                let position = self.rules.initial_position();
                self.start_game(position, StartDescriptor::StartPos, color, fx);
            }
            Command::FlipBoard => {
                self.orientation = self.orientation.opposite();
            }
            Command::Resign => self.on_resign(fx),
            Command::LoadPosition(fen) => match self.rules.parse_position(&fen) {
                Ok(position) => {
                    let descriptor = StartDescriptor::Fen(self.rules.fen(&position));
                    self.start_game(position, descriptor, self.orientation, fx);
                }
                Err(e) => reject(e, fx),
            },
            Command::SetTimeControl(minutes) => match parse_minutes(&minutes) {
                Ok(base) => {
                    self.staged.base = base;
                    self.apply_staged_when_not_playing();
                }
                Err(e) => reject(e, fx),
            },
            Command::SetIncrement(seconds) => match parse_seconds(&seconds) {
                Ok(increment) => {
                    self.staged.increment = increment;
                    self.apply_staged_when_not_playing();
                }
                Err(e) => reject(e, fx),
            },
        }
    }

    /// A game in progress keeps its time control; otherwise show the new one
    fn apply_staged_when_not_playing(&mut self) {
        if matches!(
            self.state,
            TurnState::Idle | TurnState::Terminal(_) | TurnState::Halted
        ) {
            self.clock.reconfigure(self.staged);
        }
    }

    /// Discard the current game and request a fresh session for `position`
    fn start_game(
        &mut self,
        position: R::Position,
        descriptor: StartDescriptor,
        human: Color,
        fx: &mut Vec<Effect>,
    ) {
        self.clock.stop();
        self.position = position;
        self.human = human;
        self.ply = 0;
        self.clock.reconfigure(self.staged);

        let transition = self.sessions.begin(descriptor.clone());
        self.state = TurnState::AwaitingSessionStart;

        tracing::info!(
            "New game {} ({}), human plays {}",
            transition.generation,
            descriptor,
            human
        );

        fx.push(Effect::StartSession {
            generation: transition.generation,
            descriptor,
            retire: transition.retire,
            delay: Duration::ZERO,
        });
    }

    fn on_session_started(
        &mut self,
        generation: Generation,
        result: Result<SessionId, EngineError>,
        fx: &mut Vec<Effect>,
    ) {
        match result {
            Ok(id) => {
                if self.sessions.confirm(generation, id).is_err() {
                    tracing::debug!("Ending superseded session {} from {}", id, generation);
                    fx.push(Effect::EndSession(id));
                    return;
                }
                if self.state == TurnState::AwaitingSessionStart {
                    self.begin_play(fx);
                }
            }
            Err(e) => {
                if self.state != TurnState::AwaitingSessionStart {
                    tracing::debug!("Ignoring session failure for {}: {}", generation, e);
                    return;
                }
                if let Some((delay, descriptor)) = self.sessions.retry(generation) {
                    tracing::warn!("Session start failed: {}. Retrying in {:?}", e, delay);
                    fx.push(Effect::Notify(Notification::SessionUnavailable {
                        reason: e.to_string(),
                        retry_in: delay,
                    }));
                    fx.push(Effect::StartSession {
                        generation,
                        descriptor,
                        retire: None,
                        delay,
                    });
                } else {
                    tracing::debug!("Ignoring session failure for stale {}: {}", generation, e);
                }
            }
        }
    }

    /// Session is live: start the clock for the side to move
    fn begin_play(&mut self, fx: &mut Vec<Effect>) {
        if self.check_terminal(fx) {
            return;
        }
        let to_move = self.rules.turn_of(&self.position);
        self.clock.start(to_move);
        self.enter_turn(to_move, fx);
    }

    /// Enter the turn of `to_move`, scheduling the engine if it's not the human
    fn enter_turn(&mut self, to_move: Color, fx: &mut Vec<Effect>) {
        if to_move == self.human {
            self.state = TurnState::PlayerToMove(to_move);
            return;
        }

        let token = RequestToken {
            generation: self.sessions.generation(),
            ply: self.ply,
        };
        self.state = TurnState::EngineToMove {
            color: to_move,
            request: EngineRequest::Settling(token),
        };
        fx.push(Effect::ScheduleEngineRequest {
            token,
            delay: self.settings.settle_delay,
        });
    }

    fn on_move(&mut self, attempt: MoveAttempt, fx: &mut Vec<Effect>) {
        let mover = match self.state {
            TurnState::PlayerToMove(color) => color,
            TurnState::EngineToMove { .. } => return reject(InputError::NotYourTurn, fx),
            TurnState::Terminal(_) | TurnState::Halted => return reject(InputError::GameOver, fx),
            TurnState::Idle | TurnState::AwaitingSessionStart => {
                return reject(InputError::NotReady, fx)
            }
        };

        let (position, mv) = match self.rules.apply_move(&self.position, &attempt) {
            Ok(applied) => applied,
            Err(e) => return reject(e, fx),
        };

        tracing::info!("{} played {}", mover, mv);
        if self.complete_half_move(mover, position, mv, fx) {
            return;
        }
        self.enter_turn(mover.opposite(), fx);
    }

    fn on_settle_elapsed(&mut self, token: RequestToken, fx: &mut Vec<Effect>) {
        let color = match self.state {
            TurnState::EngineToMove {
                color,
                request: EngineRequest::Settling(pending),
            } if pending == token => color,
            _ => {
                tracing::debug!("Discarding stale settle timer {}", token);
                return;
            }
        };

        let session = match self.sessions.require_active() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Cannot request engine move {}: {}", token, e);
                return;
            }
        };

        self.state = TurnState::EngineToMove {
            color,
            request: EngineRequest::InFlight(token),
        };
        fx.push(Effect::RequestEngineMove {
            token,
            session,
            budget: self.clock.budget(),
        });
    }

    fn on_engine_replied(
        &mut self,
        token: RequestToken,
        result: Result<EngineMove, EngineError>,
        fx: &mut Vec<Effect>,
    ) {
        let color = match self.state {
            TurnState::EngineToMove {
                color,
                request: EngineRequest::InFlight(pending),
            } if pending == token => color,
            _ => {
                tracing::debug!("Discarding stale engine reply {}", token);
                return;
            }
        };

        let mv = match result {
            Ok(mv) => mv,
            Err(e) => {
                // No retry: the game waits here until the user starts over
                fx.push(Effect::Notify(Notification::EngineUnavailable(e.to_string())));
                return;
            }
        };

        match self.rules.apply_engine_move(&self.position, &mv) {
            Ok(position) => {
                tracing::info!("{} (engine) played {}", color, mv);
                if self.complete_half_move(color, position, mv, fx) {
                    return;
                }
                self.enter_turn(color.opposite(), fx);
            }
            Err(e) => {
                tracing::error!("Engine sent move {} rejected by rules: {}", mv, e);
                self.clock.stop();
                self.state = TurnState::Halted;
                fx.push(Effect::Notify(Notification::ProtocolViolation {
                    mv,
                    reason: e.to_string(),
                }));
            }
        }
    }

    /// Commit a move by `mover`. Returns true if the game ended.
    fn complete_half_move(
        &mut self,
        mover: Color,
        position: R::Position,
        mv: EngineMove,
        fx: &mut Vec<Effect>,
    ) -> bool {
        self.position = position;
        self.ply += 1;
        self.clock.stop();
        self.clock.apply_increment(mover);
        self.clock.hand_over(mover.opposite());

        if let Some(session) = self.sessions.active() {
            fx.push(Effect::ReportMove { session, mv });
        }

        if self.check_terminal(fx) {
            return true;
        }
        self.clock.start(mover.opposite());
        false
    }

    fn on_tick(&mut self, fx: &mut Vec<Effect>) {
        if !matches!(
            self.state,
            TurnState::PlayerToMove(_) | TurnState::EngineToMove { .. }
        ) {
            return;
        }
        if let Some(side) = self.clock.tick() {
            self.finish(
                GameOutcome::Timeout {
                    winner: side.opposite(),
                },
                fx,
            );
        }
    }

    fn on_resign(&mut self, fx: &mut Vec<Effect>) {
        match self.state {
            TurnState::Idle | TurnState::Terminal(_) | TurnState::Halted => {
                tracing::debug!("Ignoring resignation in {:?}", self.state);
            }
            _ => self.finish(
                GameOutcome::Resignation {
                    winner: self.human.opposite(),
                },
                fx,
            ),
        }
    }

    /// Enter `Terminal` if the position is game over
    fn check_terminal(&mut self, fx: &mut Vec<Effect>) -> bool {
        let outcome = match self.rules.classify(&self.position) {
            Classification::Ongoing => return false,
            Classification::Checkmate { winner } => GameOutcome::Checkmate { winner },
            Classification::Draw(reason) => GameOutcome::Draw { reason },
        };
        self.finish(outcome, fx);
        true
    }

    /// Set the outcome. The first caller wins; later ones are no-ops.
    fn finish(&mut self, outcome: GameOutcome, fx: &mut Vec<Effect>) {
        if matches!(self.state, TurnState::Terminal(_)) {
            return;
        }
        self.clock.stop();
        self.state = TurnState::Terminal(outcome);
        tracing::info!("Game over: {}", outcome);
        fx.push(Effect::Notify(Notification::GameOver(outcome)));
    }
}

fn reject(error: InputError, fx: &mut Vec<Effect>) {
    tracing::debug!("Rejected input: {}", error);
    fx.push(Effect::Notify(Notification::Rejected(error)));
}
