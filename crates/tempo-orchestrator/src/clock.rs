//! Two-sided countdown clock
//!
//! The clock never decides anything on its own. The turn state machine
//! starts, stops and hands it over; the coordinator calls [`Clock::tick`]
//! once per tick interval and forwards any timeout it reports.

use std::time::Duration;

use tempo_core::types::{Color, TimeControl};
use tempo_protocol::ClockBudget;

/// Per-side remaining time and the side currently running
#[derive(Debug, Clone)]
pub struct Clock {
    /// Remaining time indexed by [`Color::index`]
    remaining: [Duration; 2],
    /// Added to a side after each of its moves
    increment: Duration,
    /// Amount removed per tick
    unit: Duration,
    /// Side whose time is (or was last) counting down
    side_on_clock: Option<Color>,
    running: bool,
    /// Whether a timeout has already been reported for each side
    flagged: [bool; 2],
    /// Bumped whenever the clock starts or stops running
    epoch: u64,
}

impl Clock {
    /// Create a stopped clock with both sides at the base time
    pub fn new(time_control: TimeControl, unit: Duration) -> Self {
        Self {
            remaining: [time_control.base; 2],
            increment: time_control.increment,
            unit,
            side_on_clock: None,
            running: false,
            flagged: [false; 2],
            epoch: 0,
        }
    }

    /// Start counting down for `side`. No-op if already running for it.
    pub fn start(&mut self, side: Color) {
        if self.running && self.side_on_clock == Some(side) {
            return;
        }
        self.side_on_clock = Some(side);
        self.running = true;
        self.epoch += 1;
    }

    /// Stop counting down. Idempotent.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.epoch += 1;
        }
    }

    /// Mark `side` as next on the clock without starting it
    pub fn hand_over(&mut self, side: Color) {
        self.stop();
        self.side_on_clock = Some(side);
    }

    /// Remove one unit from the running side.
    ///
    /// Returns the side that just ran out of time, at most once per side
    /// until the clock is reconfigured. A side runs out on the tick that
    /// brings it to exactly zero, not on the tick after. Ticks while
    /// stopped are discarded.
    pub fn tick(&mut self) -> Option<Color> {
        if !self.running {
            return None;
        }
        let side = self.side_on_clock?;
        let slot = &mut self.remaining[side.index()];
        *slot = slot.saturating_sub(self.unit);

        if slot.is_zero() && !self.flagged[side.index()] {
            self.flagged[side.index()] = true;
            return Some(side);
        }
        None
    }

    /// Add the configured increment to `side`
    pub fn apply_increment(&mut self, side: Color) {
        let slot = &mut self.remaining[side.index()];
        *slot = slot.saturating_add(self.increment);
    }

    /// Reset both sides to a new time control and stop the clock
    pub fn reconfigure(&mut self, time_control: TimeControl) {
        self.stop();
        self.remaining = [time_control.base; 2];
        self.increment = time_control.increment;
        self.side_on_clock = None;
        self.flagged = [false; 2];
    }

    /// Remaining time for `side`
    pub fn remaining(&self, side: Color) -> Duration {
        self.remaining[side.index()]
    }

    /// Side whose time is counting down, if any
    pub fn side_on_clock(&self) -> Option<Color> {
        self.side_on_clock
    }

    /// Whether time is currently counting down
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Changes whenever the clock starts or stops; the coordinator uses it
    /// to realign its ticker
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Snapshot in the form the engine service expects
    pub fn budget(&self) -> ClockBudget {
        let inc = millis(self.increment);
        ClockBudget {
            white_ms: millis(self.remaining(Color::White)),
            white_inc_ms: inc,
            black_ms: millis(self.remaining(Color::Black)),
            black_inc_ms: inc,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(base_secs: u64, inc_secs: u64) -> Clock {
        Clock::new(
            TimeControl::new(Duration::from_secs(base_secs), Duration::from_secs(inc_secs)),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_tick_only_affects_side_on_clock() {
        let mut clock = clock(60, 0);
        clock.start(Color::White);
        clock.tick();
        clock.tick();

        assert_eq!(clock.remaining(Color::White), Duration::from_secs(58));
        assert_eq!(clock.remaining(Color::Black), Duration::from_secs(60));
    }

    #[test]
    fn test_tick_after_stop_is_discarded() {
        let mut clock = clock(60, 0);
        clock.start(Color::Black);
        clock.stop();
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.remaining(Color::Black), Duration::from_secs(60));
    }

    #[test]
    fn test_timeout_reported_once() {
        let mut clock = clock(2, 0);
        clock.start(Color::Black);
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.tick(), Some(Color::Black));
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.remaining(Color::Black), Duration::ZERO);
    }

    #[test]
    fn test_flag_falls_on_reaching_zero() {
        let mut clock = Clock::new(
            TimeControl::new(Duration::from_millis(300), Duration::ZERO),
            Duration::from_millis(100),
        );
        clock.start(Color::White);
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.remaining(Color::White), Duration::from_millis(100));

        assert_eq!(clock.tick(), Some(Color::White));
        assert_eq!(clock.remaining(Color::White), Duration::ZERO);
    }

    #[test]
    fn test_remaining_clamped_at_zero() {
        let mut clock = Clock::new(
            TimeControl::new(Duration::from_millis(500), Duration::ZERO),
            Duration::from_secs(1),
        );
        clock.start(Color::White);
        assert_eq!(clock.tick(), Some(Color::White));
        assert_eq!(clock.remaining(Color::White), Duration::ZERO);
    }

    #[test]
    fn test_start_is_noop_for_running_side() {
        let mut clock = clock(60, 0);
        clock.start(Color::White);
        let epoch = clock.epoch();
        clock.start(Color::White);
        assert_eq!(clock.epoch(), epoch);

        clock.start(Color::Black);
        assert_ne!(clock.epoch(), epoch);
        assert_eq!(clock.side_on_clock(), Some(Color::Black));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut clock = clock(60, 0);
        clock.start(Color::White);
        clock.stop();
        let epoch = clock.epoch();
        clock.stop();
        assert_eq!(clock.epoch(), epoch);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_increment_applied() {
        let mut clock = clock(60, 3);
        clock.apply_increment(Color::White);
        assert_eq!(clock.remaining(Color::White), Duration::from_secs(63));
        assert_eq!(clock.remaining(Color::Black), Duration::from_secs(60));
    }

    #[test]
    fn test_increment_saturates() {
        let mut clock = Clock::new(
            TimeControl::new(Duration::MAX - Duration::from_secs(1), Duration::from_secs(5)),
            Duration::from_secs(1),
        );
        clock.apply_increment(Color::White);
        clock.apply_increment(Color::White);
        assert_eq!(clock.remaining(Color::White), Duration::MAX);
        assert_eq!(clock.budget().white_ms, u64::MAX);
    }

    #[test]
    fn test_reconfigure_resets_flags() {
        let mut clock = clock(1, 0);
        clock.start(Color::White);
        assert_eq!(clock.tick(), Some(Color::White));

        clock.reconfigure(TimeControl::new(Duration::from_secs(1), Duration::ZERO));
        assert!(!clock.is_running());
        assert_eq!(clock.side_on_clock(), None);
        clock.start(Color::White);
        assert_eq!(clock.tick(), Some(Color::White));
    }

    #[test]
    fn test_budget_in_millis() {
        let mut clock = clock(180, 2);
        clock.start(Color::White);
        clock.tick();
        let budget = clock.budget();
        assert_eq!(budget.white_ms, 179_000);
        assert_eq!(budget.black_ms, 180_000);
        assert_eq!(budget.white_inc_ms, 2_000);
        assert_eq!(budget.black_inc_ms, 2_000);
    }
}
