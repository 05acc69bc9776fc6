//! Wall-clock sources.
//!
//! Timers and the model never call `Utc::now()` directly; they go through a
//! shared [`Clock`] so tests can drive time by hand.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

pub type SharedClock = Arc<dyn Clock>;

pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64 {
        self.now().timestamp_millis().max(0) as u64
    }

    /// The first local midnight strictly after `after`.
    fn next_midnight(&self, after: DateTime<Utc>) -> DateTime<Utc>;

    /// Calendar day of `at` in local time.
    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate;
}

/// Real wall clock; midnight follows the host's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn next_midnight(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        next_midnight_in(after, &Local)
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&Local).date_naive()
    }
}

/// Hand-driven clock for tests and simulations.
///
/// Cloning shares the underlying instant, so a test can keep one handle and
/// give another to the model.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
    offset: FixedOffset,
}

impl ManualClock {
    /// Clock frozen at `start`, with midnight computed in UTC.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_offset(start, Utc.fix())
    }

    pub fn with_offset(start: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
            offset,
        }
    }

    /// Clock starting at `epoch_ms` milliseconds after the Unix epoch.
    pub fn at_ms(epoch_ms: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(epoch_ms).unwrap_or_default())
    }

    pub fn advance_ms(&self, ms: u64) {
        self.shift(i64::try_from(ms).unwrap_or(i64::MAX));
    }

    pub fn advance(&self, by: Duration) {
        self.shift(by.num_milliseconds());
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }

    fn shift(&self, ms: i64) {
        // The closure never returns None, so the update always applies.
        let _ = self
            .now_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(ms))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms.load(Ordering::SeqCst)).unwrap_or_default()
    }

    fn next_midnight(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        next_midnight_in(after, &self.offset)
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}

/// Next midnight in `tz` after `after`.
///
/// When midnight does not exist locally (a DST gap), the first valid hour
/// after it is used instead.
pub fn next_midnight_in<Tz: TimeZone>(after: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = after.with_timezone(tz);
    let Some(tomorrow) = local.date_naive().succ_opt() else {
        return after + Duration::days(1);
    };
    let midnight = tomorrow.and_time(NaiveTime::MIN);

    (0..=3)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                .earliest()
        })
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| after + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn midnight_utc() {
        let next = next_midnight_in(utc("2024-03-09T15:30:00Z"), &Utc);
        assert_eq!(next, utc("2024-03-10T00:00:00Z"));
    }

    #[test]
    fn midnight_exactly_at_midnight_moves_to_next_day() {
        let next = next_midnight_in(utc("2024-03-10T00:00:00Z"), &Utc);
        assert_eq!(next, utc("2024-03-11T00:00:00Z"));
    }

    #[test]
    fn midnight_respects_offset() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        // 20:00 UTC is already 05:00 next day in Tokyo.
        let next = next_midnight_in(utc("2024-03-09T20:00:00Z"), &tokyo);
        assert_eq!(next, utc("2024-03-10T15:00:00Z"));
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::at_ms(1_000);
        let handle = clock.clone();
        handle.advance_ms(500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn manual_clock_advance_saturates() {
        let clock = ManualClock::at_ms(1_000);
        clock.advance_ms(u64::MAX);
        assert_eq!(clock.now_ms.load(Ordering::SeqCst), i64::MAX);
        clock.advance_ms(1);
        assert_eq!(clock.now_ms.load(Ordering::SeqCst), i64::MAX);
    }

    #[test]
    fn manual_clock_local_date_uses_offset() {
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let clock = ManualClock::with_offset(utc("2024-03-10T03:00:00Z"), west);
        assert_eq!(
            clock.local_date(clock.now()),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
    }
}
