use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerKind;

/// Every state change in the system produces an Event.
/// The CLI prints them; tests assert on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        kind: TimerKind,
        at: DateTime<Utc>,
    },
    TimerPaused {
        kind: TimerKind,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        kind: TimerKind,
        elapsed_ms: u64,
        /// Length of the pause that just ended.
        paused_ms: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        kind: TimerKind,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        kind: TimerKind,
        at: DateTime<Utc>,
    },
    /// A focus delta was durably added to the daily total.
    FocusFlushed {
        delta_ms: u64,
        total_ms: u64,
        at: DateTime<Utc>,
    },
    /// A tick reported less than the last checkpoint and was ignored.
    TickDiscarded {
        elapsed_ms: u64,
        checkpoint_ms: u64,
        at: DateTime<Utc>,
    },
    DailyReset {
        reason: ResetReason,
        /// Daily total right before it was zeroed.
        closing_total_ms: u64,
        next_deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetReason {
    /// The local-midnight deadline passed.
    Midnight,
    /// The user asked for it.
    Manual,
}
