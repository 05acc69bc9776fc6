//! Focus/countup timer pair and its persistence policy.
//!
//! The focus timer reports absolute elapsed values; [`Model::reconcile`]
//! turns them into additive updates of the persisted daily total. The
//! checkpoint only moves after a confirmed write, so a failed or skipped
//! flush is picked up again by a later tick.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::error::StorageError;
use crate::events::{Event, ResetReason};
use crate::lifecycle::LifecycleSignal;
use crate::storage::{roll_over_stale_total, stamped_day, Config, Storage, StorageKey};
use crate::timer::{Timer, TimerKind, TimerSnapshot, TimerState};

/// Runtime knobs for a [`Model`], usually taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub tick_interval: Duration,
    /// Minimum spacing between two successful flushes.
    pub min_flush_spacing_ms: u64,
    pub reset_poll: Duration,
    pub key_prefix: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ModelSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.timer.tick_interval_ms),
            min_flush_spacing_ms: config.sync.min_flush_spacing_ms,
            reset_poll: Duration::from_secs(config.sync.reset_poll_secs),
            key_prefix: config.storage.key_prefix.clone(),
        }
    }
}

/// Focus progress that has been durably flushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Focus elapsed value at the last successful flush.
    pub last_flushed_elapsed_ms: u64,
    /// Wall-clock time of that flush (ms since epoch).
    pub last_flush_at_ms: Option<u64>,
}

/// Result of one reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// `delta_ms` was added; the stored total is now `total_ms`.
    Flushed { delta_ms: u64, total_ms: u64 },
    /// Too soon after the previous flush; `pending_ms` stays queued.
    RateLimited { pending_ms: u64 },
    /// Nothing new since the checkpoint.
    Unchanged,
    /// Elapsed value was behind the checkpoint and was ignored.
    Discarded { elapsed_ms: u64, checkpoint_ms: u64 },
}

impl FlushOutcome {
    /// Event worth publishing for this outcome, if any.
    pub fn to_event(self, at: DateTime<Utc>) -> Option<Event> {
        match self {
            FlushOutcome::Flushed { delta_ms, total_ms } => Some(Event::FocusFlushed {
                delta_ms,
                total_ms,
                at,
            }),
            FlushOutcome::Discarded {
                elapsed_ms,
                checkpoint_ms,
            } => Some(Event::TickDiscarded {
                elapsed_ms,
                checkpoint_ms,
                at,
            }),
            FlushOutcome::RateLimited { .. } | FlushOutcome::Unchanged => None,
        }
    }
}

/// What the badge reads every refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedSnapshot {
    pub countup: TimerSnapshot,
    pub focus: TimerSnapshot,
    /// Persisted daily total plus focus time not flushed yet.
    pub today: TimerSnapshot,
}

/// Per-page timer context.
///
/// Owns the countup and focus timers; shares the daily total with every other
/// page of the same site through `storage`.
pub struct Model<S> {
    countup: Timer,
    focus: Timer,
    storage: S,
    key: StorageKey,
    checkpoint: Checkpoint,
    reset_deadline: DateTime<Utc>,
    /// The running total is known to be stamped with this model's day.
    day_settled: bool,
    settings: ModelSettings,
    clock: SharedClock,
}

impl<S: Storage> Model<S> {
    /// Build the model for one site and start both timers.
    ///
    /// Storage is not touched here; a total left over from an earlier day is
    /// ignored by reads and archived by [`Model::settle_day`] or the first
    /// flush.
    pub fn new(storage: S, site: &str, settings: ModelSettings, clock: SharedClock) -> Self {
        let key = StorageKey::new(settings.key_prefix.clone(), site);
        let reset_deadline = clock.next_midnight(clock.now());
        info!(site, %reset_deadline, "model started");
        Self {
            countup: Timer::started(TimerKind::Countup, clock.clone()),
            focus: Timer::started(TimerKind::Focus, clock.clone()),
            storage,
            key,
            checkpoint: Checkpoint::default(),
            reset_deadline,
            day_settled: false,
            settings,
            clock,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn countup(&self) -> &Timer {
        &self.countup
    }

    pub fn focus(&self) -> &Timer {
        &self.focus
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn reset_deadline(&self) -> DateTime<Utc> {
        self.reset_deadline
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Local day this model counts focus for; it ends at the reset deadline.
    pub fn day(&self) -> NaiveDate {
        self.clock
            .local_date(self.reset_deadline - ChronoDuration::milliseconds(1))
    }

    /// Point-in-time view combining live timers with the persisted total.
    ///
    /// # Errors
    /// Returns the storage error if the persisted total cannot be read.
    pub async fn read_elapsed(&self) -> Result<ElapsedSnapshot, StorageError> {
        let persisted = self.persisted_total().await?;
        let focus = self.focus.snapshot();
        let unflushed = focus
            .elapsed_ms
            .saturating_sub(self.checkpoint.last_flushed_elapsed_ms);
        Ok(ElapsedSnapshot {
            countup: self.countup.snapshot(),
            focus,
            today: TimerSnapshot {
                elapsed_ms: persisted.saturating_add(unflushed),
                state: focus.state,
            },
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Map a lifecycle signal onto the focus timer.
    pub fn handle_signal(&mut self, signal: LifecycleSignal) -> Option<Event> {
        let event = if signal.is_attention_lost() {
            self.focus.pause()
        } else {
            self.focus.unpause()
        };
        debug!(
            %signal,
            elapsed_ms = self.focus.elapsed_ms(),
            changed = event.is_some(),
            "focus timer signal"
        );
        event
    }

    /// Periodic tick: advance both timers and reconcile the focus value.
    ///
    /// Returns `Ok(None)` when the focus timer is not running.
    ///
    /// # Errors
    /// Returns the storage error of a failed flush; the delta is retried on a
    /// later tick.
    pub async fn tick(&mut self) -> Result<Option<FlushOutcome>, StorageError> {
        self.countup.tick();
        match self.focus.tick() {
            Some(elapsed_ms) => self.reconcile(elapsed_ms).await.map(Some),
            None => Ok(None),
        }
    }

    /// Turn an absolute focus elapsed value into an incremental flush.
    ///
    /// # Errors
    /// Returns the storage error if reading or writing the total fails. The
    /// checkpoint is left untouched in that case.
    pub async fn reconcile(&mut self, elapsed_ms: u64) -> Result<FlushOutcome, StorageError> {
        self.reconcile_with(elapsed_ms, true).await
    }

    /// Flush whatever the focus timer has accumulated, ignoring the rate limit.
    pub async fn flush_pending(&mut self) -> Result<FlushOutcome, StorageError> {
        let elapsed_ms = self.focus.elapsed_ms();
        self.reconcile_with(elapsed_ms, false).await
    }

    /// Archive a running total left over from an earlier day and stamp the
    /// total with this model's day.
    ///
    /// Runs once per day; later calls return `Ok(None)` without touching
    /// storage.
    ///
    /// # Errors
    /// Returns the storage error; the next call retries.
    pub async fn settle_day(&mut self) -> Result<Option<(NaiveDate, u64)>, StorageError> {
        if self.day_settled {
            return Ok(None);
        }
        let moved = roll_over_stale_total(&self.storage, &self.key, self.day()).await?;
        if let Some((day, total_ms)) = moved {
            info!(%day, total_ms, "archived daily total left over from an earlier day");
        }
        self.day_settled = true;
        Ok(moved)
    }

    /// Run the daily reset if the midnight deadline has passed.
    pub async fn check_daily_reset(&mut self) -> Result<Option<Event>, StorageError> {
        if self.clock.now() < self.reset_deadline {
            return Ok(None);
        }
        self.reset(ResetReason::Midnight).await.map(Some)
    }

    /// Zero timers and the persisted daily total.
    ///
    /// Pending focus time is flushed first so the closing total is complete.
    /// A midnight reset also adds that closing total to the archive of the day
    /// that just ended.
    ///
    /// # Errors
    /// Returns the storage error if the flush or the zeroing write fails;
    /// timers and deadline are then left as they were. A pending flush that
    /// already went through keeps its checkpoint.
    pub async fn reset(&mut self, reason: ResetReason) -> Result<Event, StorageError> {
        self.flush_pending().await?;
        self.settle_day().await?;

        let day = self.day();
        let rolled_elsewhere = reason == ResetReason::Midnight
            && stamped_day(&self.storage, &self.key)
                .await?
                .is_some_and(|stamped| stamped > day);
        let closing_total_ms = if rolled_elsewhere {
            // Another page already archived this day and started the next.
            debug!(%day, "daily total already rolled over");
            0
        } else {
            let total_key = self.key.daily_total();
            let closing_total_ms = self.storage.get(&total_key, 0).await?;
            self.storage.set(&total_key, 0).await?;
            if reason == ResetReason::Midnight && closing_total_ms > 0 {
                self.archive_day(closing_total_ms).await;
            }
            closing_total_ms
        };

        let was_paused = self.focus.state() == TimerState::Paused;
        self.countup.reset();
        self.focus.reset();
        if was_paused {
            // The page still has no attention; keep it that way.
            self.focus.pause();
        }
        self.checkpoint = Checkpoint::default();

        let now = self.clock.now();
        self.reset_deadline = self.clock.next_midnight(now);
        self.day_settled = false;
        info!(
            ?reason,
            closing_total_ms,
            next_deadline = %self.reset_deadline,
            "daily total reset"
        );
        Ok(Event::DailyReset {
            reason,
            closing_total_ms,
            next_deadline: self.reset_deadline,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn reconcile_with(
        &mut self,
        elapsed_ms: u64,
        rate_limited: bool,
    ) -> Result<FlushOutcome, StorageError> {
        let checkpoint_ms = self.checkpoint.last_flushed_elapsed_ms;
        if elapsed_ms < checkpoint_ms {
            warn!(elapsed_ms, checkpoint_ms, "focus tick behind checkpoint, discarded");
            return Ok(FlushOutcome::Discarded {
                elapsed_ms,
                checkpoint_ms,
            });
        }

        let delta_ms = elapsed_ms - checkpoint_ms;
        if delta_ms == 0 {
            return Ok(FlushOutcome::Unchanged);
        }

        let now_ms = self.clock.now_ms();
        if rate_limited {
            if let Some(last) = self.checkpoint.last_flush_at_ms {
                if now_ms.saturating_sub(last) < self.settings.min_flush_spacing_ms {
                    return Ok(FlushOutcome::RateLimited {
                        pending_ms: delta_ms,
                    });
                }
            }
        }

        self.settle_day().await?;
        let key = self.key.daily_total();
        let total = self.storage.get(&key, 0).await?;
        let total_ms = total.saturating_add(delta_ms);
        self.storage.set(&key, total_ms).await?;

        self.checkpoint = Checkpoint {
            last_flushed_elapsed_ms: elapsed_ms,
            last_flush_at_ms: Some(now_ms),
        };
        debug!(delta_ms, total_ms, "focus flushed");
        Ok(FlushOutcome::Flushed { delta_ms, total_ms })
    }

    /// Persisted total for this model's day. A total stamped with an earlier
    /// day reads as zero until it is archived.
    async fn persisted_total(&self) -> Result<u64, StorageError> {
        if !self.day_settled {
            if let Some(stamped) = stamped_day(&self.storage, &self.key).await? {
                if stamped < self.day() {
                    return Ok(0);
                }
            }
        }
        self.storage.get(&self.key.daily_total(), 0).await
    }

    /// Add the closing total to the archive of the day that just ended.
    /// Failures are logged only; the daily counter is already correct.
    async fn archive_day(&self, closing_total_ms: u64) {
        let day = self.day();
        let key = self.key.archive(day);
        let result = match self.storage.get(&key, 0).await {
            Ok(archived) => {
                self.storage
                    .set(&key, archived.saturating_add(closing_total_ms))
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(%day, error = %e, "failed to archive daily total");
        }
    }
}
