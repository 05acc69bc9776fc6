//! Stopwatch state machine.
//!
//! Elapsed time is derived from wall-clock deltas, never summed from tick
//! intervals. The caller is responsible for calling `tick()` periodically;
//! the timer itself owns no thread or task.
//!
//! ## State Transitions
//!
//! ```text
//! NotStarted -> Running <-> Paused
//! Running | Paused -> NotStarted   (stop)
//! any -> Running with elapsed 0    (reset)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = Timer::new(TimerKind::Focus, clock);
//! timer.start()?;
//! // In a loop:
//! if let Some(elapsed_ms) = timer.tick() { /* persist progress */ }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::error::TimerError;
use crate::events::Event;

/// Which clock a timer represents. Only used for labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    /// Wall-clock time since the page became active.
    Countup,
    /// Time the page has had the user's attention.
    Focus,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::Countup => f.write_str("countup"),
            TimerKind::Focus => f.write_str("focus"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    NotStarted,
    Running,
    Paused,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerState::NotStarted => f.write_str("not started"),
            TimerState::Running => f.write_str("running"),
            TimerState::Paused => f.write_str("paused"),
        }
    }
}

/// Point-in-time view of a timer, as handed to display code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub elapsed_ms: u64,
    pub state: TimerState,
}

/// Pausable stopwatch with millisecond resolution.
#[derive(Debug, Clone)]
pub struct Timer {
    kind: TimerKind,
    state: TimerState,
    /// Last computed elapsed value. Frozen while paused.
    elapsed_ms: u64,
    /// Epoch of the current run (ms since Unix epoch).
    start_ms: u64,
    /// When the current pause began. Only set while paused.
    pause_started_ms: Option<u64>,
    /// Total time spent paused since `start_ms`.
    accumulated_pause_ms: u64,
    clock: SharedClock,
}

impl Timer {
    /// Create a timer in the `NotStarted` state.
    pub fn new(kind: TimerKind, clock: SharedClock) -> Self {
        Self {
            kind,
            state: TimerState::NotStarted,
            elapsed_ms: 0,
            start_ms: 0,
            pause_started_ms: None,
            accumulated_pause_ms: 0,
            clock,
        }
    }

    /// Create a timer that is already running.
    pub fn started(kind: TimerKind, clock: SharedClock) -> Self {
        let mut timer = Self::new(kind, clock);
        timer.begin();
        timer
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Whether the periodic tick should be delivered to this timer.
    pub fn is_ticking(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Live elapsed time while running, the frozen value otherwise.
    pub fn elapsed_ms(&self) -> u64 {
        match self.state {
            TimerState::Running => self.compute_elapsed(self.clock.now_ms()),
            TimerState::Paused | TimerState::NotStarted => self.elapsed_ms,
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            elapsed_ms: self.elapsed_ms(),
            state: self.state,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a run. A no-op while running; a defect while paused.
    ///
    /// # Errors
    /// Returns [`TimerError::InvalidTransition`] when the timer is paused.
    pub fn start(&mut self) -> Result<Option<Event>, TimerError> {
        match self.state {
            TimerState::NotStarted => Ok(Some(self.begin())),
            TimerState::Running => {
                debug!(kind = %self.kind, "start ignored, already running");
                Ok(None)
            }
            TimerState::Paused => Err(TimerError::InvalidTransition {
                kind: self.kind,
                from: self.state,
                operation: "start",
            }),
        }
    }

    /// Freeze elapsed time. Redundant calls are tolerated.
    pub fn pause(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                let now = self.clock.now_ms();
                self.elapsed_ms = self.compute_elapsed(now);
                self.pause_started_ms = Some(now);
                self.state = TimerState::Paused;
                debug!(kind = %self.kind, elapsed_ms = self.elapsed_ms, "paused");
                Some(Event::TimerPaused {
                    kind: self.kind,
                    elapsed_ms: self.elapsed_ms,
                    at: self.clock.now(),
                })
            }
            TimerState::Paused | TimerState::NotStarted => {
                warn!(kind = %self.kind, state = %self.state, "pause ignored");
                None
            }
        }
    }

    /// Resume after a pause; the paused interval never counts as elapsed.
    pub fn unpause(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Paused => {
                let now = self.clock.now_ms();
                let paused_ms = self
                    .pause_started_ms
                    .take()
                    .map(|since| now.saturating_sub(since))
                    .unwrap_or(0);
                self.accumulated_pause_ms += paused_ms;
                self.state = TimerState::Running;
                self.elapsed_ms = self.compute_elapsed(now);
                debug!(kind = %self.kind, elapsed_ms = self.elapsed_ms, paused_ms, "resumed");
                Some(Event::TimerResumed {
                    kind: self.kind,
                    elapsed_ms: self.elapsed_ms,
                    paused_ms,
                    at: self.clock.now(),
                })
            }
            TimerState::Running | TimerState::NotStarted => {
                warn!(kind = %self.kind, state = %self.state, "unpause ignored");
                None
            }
        }
    }

    /// Return to `NotStarted` and zero all bookkeeping.
    pub fn stop(&mut self) -> Option<Event> {
        if self.state == TimerState::NotStarted {
            return None;
        }
        let elapsed_ms = self.elapsed_ms();
        self.state = TimerState::NotStarted;
        self.elapsed_ms = 0;
        self.start_ms = 0;
        self.pause_started_ms = None;
        self.accumulated_pause_ms = 0;
        debug!(kind = %self.kind, elapsed_ms, "stopped");
        Some(Event::TimerStopped {
            kind: self.kind,
            elapsed_ms,
            at: self.clock.now(),
        })
    }

    /// Stop and immediately start again; always ends `Running` at zero.
    pub fn reset(&mut self) -> Option<Event> {
        self.stop();
        self.begin();
        Some(Event::TimerReset {
            kind: self.kind,
            at: self.clock.now(),
        })
    }

    /// Call periodically. Returns the fresh elapsed value while running.
    pub fn tick(&mut self) -> Option<u64> {
        if self.state != TimerState::Running {
            return None;
        }
        self.elapsed_ms = self.compute_elapsed(self.clock.now_ms());
        Some(self.elapsed_ms)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin(&mut self) -> Event {
        self.start_ms = self.clock.now_ms();
        self.elapsed_ms = 0;
        self.pause_started_ms = None;
        self.accumulated_pause_ms = 0;
        self.state = TimerState::Running;
        debug!(kind = %self.kind, "started");
        Event::TimerStarted {
            kind: self.kind,
            at: self.clock.now(),
        }
    }

    fn compute_elapsed(&self, now_ms: u64) -> u64 {
        now_ms
            .saturating_sub(self.start_ms)
            .saturating_sub(self.accumulated_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn focus_timer() -> (Timer, ManualClock) {
        let clock = ManualClock::at_ms(1_700_000_000_000);
        (Timer::new(TimerKind::Focus, clock.shared()), clock)
    }

    #[test]
    fn start_pause_unpause() {
        let (mut timer, _clock) = focus_timer();
        assert_eq!(timer.state(), TimerState::NotStarted);

        assert!(timer.start().unwrap().is_some());
        assert_eq!(timer.state(), TimerState::Running);

        assert!(timer.pause().is_some());
        assert_eq!(timer.state(), TimerState::Paused);

        assert!(timer.unpause().is_some());
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[test]
    fn pause_interval_is_excluded_from_elapsed() {
        let (mut timer, clock) = focus_timer();
        timer.start().unwrap();

        clock.advance_ms(5_000);
        timer.pause();
        clock.advance_ms(4_000);
        timer.unpause();
        clock.advance_ms(1_000);

        assert_eq!(timer.tick(), Some(6_000));
    }

    #[test]
    fn elapsed_is_frozen_while_paused() {
        let (mut timer, clock) = focus_timer();
        timer.start().unwrap();
        clock.advance_ms(2_500);
        timer.pause();
        clock.advance_ms(60_000);
        assert_eq!(timer.elapsed_ms(), 2_500);
        assert_eq!(timer.tick(), None);
    }

    #[test]
    fn start_while_running_is_noop() {
        let (mut timer, clock) = focus_timer();
        timer.start().unwrap();
        clock.advance_ms(1_000);
        assert_eq!(timer.start(), Ok(None));
        assert_eq!(timer.elapsed_ms(), 1_000);
    }

    #[test]
    fn start_while_paused_is_invalid() {
        let (mut timer, _clock) = focus_timer();
        timer.start().unwrap();
        timer.pause();
        let err = timer.start().unwrap_err();
        assert_eq!(
            err,
            TimerError::InvalidTransition {
                kind: TimerKind::Focus,
                from: TimerState::Paused,
                operation: "start",
            }
        );
        assert_eq!(timer.state(), TimerState::Paused);
    }

    #[test]
    fn redundant_pause_and_unpause_are_noops() {
        let (mut timer, clock) = focus_timer();
        timer.start().unwrap();
        clock.advance_ms(3_000);
        assert!(timer.pause().is_some());
        clock.advance_ms(1_000);
        assert!(timer.pause().is_none());
        clock.advance_ms(1_000);
        assert!(timer.unpause().is_some());
        assert!(timer.unpause().is_none());
        assert_eq!(timer.elapsed_ms(), 3_000);
    }

    #[test]
    fn pause_before_start_is_noop() {
        let (mut timer, _clock) = focus_timer();
        assert!(timer.pause().is_none());
        assert!(timer.unpause().is_none());
        assert_eq!(timer.state(), TimerState::NotStarted);
    }

    #[test]
    fn stop_zeroes_everything() {
        let (mut timer, clock) = focus_timer();
        timer.start().unwrap();
        clock.advance_ms(7_000);
        timer.pause();
        match timer.stop() {
            Some(Event::TimerStopped { elapsed_ms, .. }) => assert_eq!(elapsed_ms, 7_000),
            other => panic!("Expected TimerStopped, got {other:?}"),
        }
        assert_eq!(timer.state(), TimerState::NotStarted);
        assert_eq!(timer.elapsed_ms(), 0);
        assert!(timer.stop().is_none());
    }

    #[test]
    fn reset_restarts_from_every_state() {
        let (mut timer, clock) = focus_timer();

        timer.reset();
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.elapsed_ms(), 0);

        clock.advance_ms(4_000);
        timer.reset();
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.elapsed_ms(), 0);

        clock.advance_ms(4_000);
        timer.pause();
        clock.advance_ms(4_000);
        timer.reset();
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.elapsed_ms(), 0);

        clock.advance_ms(1_500);
        assert_eq!(timer.tick(), Some(1_500));
    }

    #[test]
    fn snapshot_reports_state() {
        let (mut timer, clock) = focus_timer();
        timer.start().unwrap();
        clock.advance_ms(900);
        let snap = timer.snapshot();
        assert_eq!(snap.elapsed_ms, 900);
        assert_eq!(snap.state, TimerState::Running);
    }
}
