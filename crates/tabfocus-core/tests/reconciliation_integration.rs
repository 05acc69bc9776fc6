//! Integration tests for focus persistence: flush batching, out-of-order
//! ticks, display reads between flushes and midnight resets.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use tabfocus_core::{
    Event, FlushOutcome, LifecycleSignal, ManualClock, MemoryStorage, Model, ModelSettings,
    ResetReason, SqliteStorage, Storage,
};

const TOTAL_KEY: &str = "tabfocus:example.com";

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-09T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn memory_model(clock: &ManualClock) -> (Model<Arc<MemoryStorage>>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let model = Model::new(
        storage.clone(),
        "example.com",
        ModelSettings::default(),
        clock.shared(),
    );
    (model, storage)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// Flushes spaced past the rate limit add up to the elapsed span.
    #[test]
    fn spaced_flushes_sum_to_elapsed_span(
        initial in 0u64..10_000_000,
        steps in prop::collection::vec(0u64..60_000, 1..40),
    ) {
        runtime().block_on(async {
            let clock = ManualClock::new(start());
            let (mut model, storage) = memory_model(&clock);
            storage.set(TOTAL_KEY, initial).await.unwrap();

            let e0 = 1_000;
            model.reconcile(e0).await.unwrap();
            let after_first = storage.value(TOTAL_KEY).unwrap();
            prop_assert_eq!(after_first, initial + e0);

            let mut elapsed = e0;
            for step in steps {
                clock.advance_ms(10_000);
                elapsed += step;
                let outcome = model.reconcile(elapsed).await.unwrap();
                prop_assert!(!matches!(outcome, FlushOutcome::RateLimited { .. }), "flush was rate limited: {:?}", outcome);
            }
            prop_assert_eq!(storage.value(TOTAL_KEY).unwrap(), after_first + (elapsed - e0));
            Ok(())
        })?;
    }

    /// However ticks are batched by the rate limit, nothing is lost or
    /// double counted, and the display never dips below the stored total.
    #[test]
    fn batched_flushes_never_lose_or_duplicate(
        ticks in prop::collection::vec((0u64..5_000, 0u64..15_000), 1..80),
    ) {
        runtime().block_on(async {
            let clock = ManualClock::new(start());
            let (mut model, storage) = memory_model(&clock);

            let mut elapsed = 0;
            for (gain, wait) in ticks {
                clock.advance_ms(wait);
                elapsed += gain;
                model.reconcile(elapsed).await.unwrap();

                let stored = storage.value(TOTAL_KEY).unwrap_or(0);
                let pending = elapsed - model.checkpoint().last_flushed_elapsed_ms;
                prop_assert_eq!(stored + pending, elapsed);
            }
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn display_between_flushes_adds_unflushed_focus() {
    let clock = ManualClock::new(start());
    let (mut model, storage) = memory_model(&clock);
    storage.set(TOTAL_KEY, 120_000).await.unwrap();

    clock.advance_ms(1_000);
    model.tick().await.unwrap();
    for _ in 0..5 {
        clock.advance_ms(1_000);
        let outcome = model.tick().await.unwrap();
        assert!(matches!(outcome, Some(FlushOutcome::RateLimited { .. })));

        let snap = model.read_elapsed().await.unwrap();
        let stored = storage.value(TOTAL_KEY).unwrap();
        assert!(snap.today.elapsed_ms >= stored);
        assert_eq!(snap.today.elapsed_ms, 120_000 + snap.focus.elapsed_ms);
    }
}

#[tokio::test]
async fn out_of_order_tick_leaves_everything_unchanged() {
    let clock = ManualClock::new(start());
    let (mut model, storage) = memory_model(&clock);
    model.reconcile(800).await.unwrap();
    let checkpoint = model.checkpoint();
    let writes = storage.write_count();

    clock.advance_ms(60_000);
    let outcome = model.reconcile(500).await.unwrap();
    assert_eq!(
        outcome,
        FlushOutcome::Discarded {
            elapsed_ms: 500,
            checkpoint_ms: 800
        }
    );
    assert_eq!(model.checkpoint(), checkpoint);
    assert_eq!(storage.write_count(), writes);
    assert_eq!(storage.value(TOTAL_KEY), Some(800));
}

#[tokio::test]
async fn page_reload_keeps_only_flushed_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabfocus.db");
    let clock = ManualClock::new(start());

    {
        let storage = SqliteStorage::open_at(&path, "local").unwrap();
        let mut model = Model::new(storage, "example.com", ModelSettings::default(), clock.shared());
        clock.advance_ms(30_000);
        model.tick().await.unwrap();
        clock.advance_ms(3_000);
        // Rate limited: these 3 seconds die with the page.
        model.tick().await.unwrap();
    }

    let storage = SqliteStorage::open_at(&path, "local").unwrap();
    let mut model = Model::new(storage, "example.com", ModelSettings::default(), clock.shared());
    assert_eq!(model.focus().elapsed_ms(), 0);
    clock.advance_ms(2_000);
    model.tick().await.unwrap();

    let snap = model.read_elapsed().await.unwrap();
    assert_eq!(snap.today.elapsed_ms, 32_000);
}

#[tokio::test]
async fn total_from_an_unattended_midnight_is_not_reported_as_today() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabfocus.db");
    let evening = DateTime::parse_from_rfc3339("2024-03-09T20:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let clock = ManualClock::new(evening);

    {
        let storage = SqliteStorage::open_at(&path, "local").unwrap();
        let mut model = Model::new(storage, "example.com", ModelSettings::default(), clock.shared());
        clock.advance_ms(30_000);
        model.tick().await.unwrap();
    }

    // No page is open when midnight passes.
    clock.advance(Duration::hours(16));
    let storage = SqliteStorage::open_at(&path, "local").unwrap();
    let mut model = Model::new(storage, "example.com", ModelSettings::default(), clock.shared());
    assert_eq!(model.read_elapsed().await.unwrap().today.elapsed_ms, 0);

    clock.advance_ms(2_000);
    model.tick().await.unwrap();
    assert_eq!(model.read_elapsed().await.unwrap().today.elapsed_ms, 2_000);

    let check = SqliteStorage::open_at(&path, "local").unwrap();
    assert_eq!(check.get(TOTAL_KEY, 0).await.unwrap(), 2_000);
    assert_eq!(
        check.get("tabfocus:example.com@2024-03-09", 0).await.unwrap(),
        30_000
    );
}

#[tokio::test]
async fn two_pages_share_the_daily_total() {
    let clock = ManualClock::new(start());
    let storage = Arc::new(MemoryStorage::new());
    let mut first = Model::new(storage.clone(), "example.com", ModelSettings::default(), clock.shared());
    let mut second = Model::new(storage.clone(), "example.com", ModelSettings::default(), clock.shared());

    second.handle_signal(LifecycleSignal::VisibilityHidden);
    clock.advance_ms(4_000);
    second.handle_signal(LifecycleSignal::VisibilityVisible);
    clock.advance_ms(6_000);

    first.tick().await.unwrap();
    second.tick().await.unwrap();
    assert_eq!(storage.value(TOTAL_KEY), Some(10_000 + 6_000));
}

#[tokio::test]
async fn midnight_reset_flushes_unflushed_delta_first() {
    let clock = ManualClock::new(start());
    let (mut model, storage) = memory_model(&clock);
    let deadline = model.reset_deadline();

    clock.set(deadline - Duration::milliseconds(1_200));
    assert!(matches!(
        model.tick().await.unwrap(),
        Some(FlushOutcome::Flushed { .. })
    ));
    let flushed = storage.value(TOTAL_KEY).unwrap();
    clock.set(deadline);

    let event = model.check_daily_reset().await.unwrap().expect("deadline passed");
    match event {
        Event::DailyReset {
            reason,
            closing_total_ms,
            ..
        } => {
            assert_eq!(reason, ResetReason::Midnight);
            assert_eq!(closing_total_ms, flushed + 1_200);
        }
        other => panic!("Expected DailyReset, got {other:?}"),
    }
    assert_eq!(storage.value(TOTAL_KEY), Some(0));
    assert_eq!(
        storage.value("tabfocus:example.com@2024-03-09"),
        Some(flushed + 1_200)
    );
    assert_eq!(model.focus().elapsed_ms(), 0);
    assert!(model.reset_deadline() > deadline);

    // A second poll on the same day does nothing.
    clock.advance_ms(60_000);
    assert!(model.check_daily_reset().await.unwrap().is_none());
}

#[tokio::test]
async fn manual_reset_recomputes_deadline() {
    let clock = ManualClock::new(start());
    let (mut model, storage) = memory_model(&clock);
    let deadline = model.reset_deadline();
    clock.advance_ms(90_000);
    model.tick().await.unwrap();

    model.reset(ResetReason::Manual).await.unwrap();
    assert_eq!(storage.value(TOTAL_KEY), Some(0));
    assert_eq!(model.reset_deadline(), deadline);
    assert_eq!(model.read_elapsed().await.unwrap().today.elapsed_ms, 0);
}
