//! Event loop that owns a [`Model`].
//!
//! Ticks, midnight polls and caller commands are all handled on a single
//! task, one at a time, so the model never sees two handlers at once. A
//! handler that awaits storage runs to completion before the next one starts.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::session::{ElapsedSnapshot, FlushOutcome, Model};
use crate::error::{CoreError, StorageError};
use crate::events::{Event, ResetReason};
use crate::lifecycle::LifecycleSignal;
use crate::storage::Storage;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

enum Command {
    Signal(LifecycleSignal),
    Read(oneshot::Sender<Result<ElapsedSnapshot, StorageError>>),
    Reset(oneshot::Sender<Result<Event, StorageError>>),
    Shutdown(oneshot::Sender<Result<FlushOutcome, StorageError>>),
}

/// Cloneable handle to a running model task.
#[derive(Clone)]
pub struct ModelHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
}

impl ModelHandle {
    /// Deliver a lifecycle signal.
    pub async fn signal(&self, signal: LifecycleSignal) -> Result<(), CoreError> {
        self.commands
            .send(Command::Signal(signal))
            .await
            .map_err(|_| CoreError::DriverClosed)
    }

    /// Snapshot for display, see [`Model::read_elapsed`].
    pub async fn read_elapsed(&self) -> Result<ElapsedSnapshot, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.request(Command::Read(tx), rx).await
    }

    /// User-triggered reset of timers and the daily total.
    pub async fn reset(&self) -> Result<Event, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.request(Command::Reset(tx), rx).await
    }

    /// Flush pending focus time and stop the task.
    pub async fn shutdown(&self) -> Result<FlushOutcome, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.request(Command::Shutdown(tx), rx).await
    }

    /// Receive every event the model publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: Command,
        reply: oneshot::Receiver<Result<T, StorageError>>,
    ) -> Result<T, CoreError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::DriverClosed)?;
        let result = reply.await.map_err(|_| CoreError::DriverClosed)?;
        Ok(result?)
    }
}

/// Move `model` onto its own task and return a handle to it.
///
/// Must be called from within a tokio runtime.
pub fn spawn<S: Storage + 'static>(model: Model<S>) -> (ModelHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let handle = ModelHandle {
        commands,
        events: events.clone(),
    };
    let task = tokio::spawn(run(model, rx, events));
    (handle, task)
}

async fn run<S: Storage>(
    mut model: Model<S>,
    mut commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<Event>,
) {
    let tick_period = model.settings().tick_interval;
    let poll_period = model.settings().reset_poll;
    let mut tick = interval_at(Instant::now() + tick_period, tick_period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reset_poll = interval_at(Instant::now() + poll_period, poll_period);
    reset_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let publish = |event: Event| {
        // No subscribers is fine.
        let _ = events.send(event);
    };

    if let Err(e) = model.settle_day().await {
        warn!(error = %e, "could not settle the daily total, retrying on next flush");
    }

    loop {
        tokio::select! {
            _ = tick.tick() => match model.tick().await {
                Ok(Some(outcome)) => {
                    if let Some(event) = outcome.to_event(model.clock().now()) {
                        publish(event);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "focus flush failed, retrying on next tick"),
            },
            _ = reset_poll.tick() => match model.check_daily_reset().await {
                Ok(Some(event)) => publish(event),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "daily reset failed, retrying on next poll"),
            },
            command = commands.recv() => match command {
                Some(Command::Signal(signal)) => {
                    if let Some(event) = model.handle_signal(signal) {
                        publish(event);
                    }
                }
                Some(Command::Read(reply)) => {
                    let _ = reply.send(model.read_elapsed().await);
                }
                Some(Command::Reset(reply)) => {
                    let result = model.reset(ResetReason::Manual).await;
                    if let Ok(event) = &result {
                        publish(event.clone());
                    }
                    let _ = reply.send(result);
                }
                Some(Command::Shutdown(reply)) => {
                    let _ = reply.send(model.flush_pending().await);
                    break;
                }
                None => {
                    // Every handle dropped: page teardown.
                    if let Err(e) = model.flush_pending().await {
                        warn!(error = %e, "final flush failed");
                    }
                    break;
                }
            },
        }
    }
    debug!(site = model.key().site(), "model task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::ModelSettings;
    use crate::storage::MemoryStorage;
    use crate::timer::TimerState;

    fn spawn_model() -> (ModelHandle, JoinHandle<()>, Arc<MemoryStorage>, ManualClock) {
        let clock = ManualClock::at_ms(1_700_000_000_000);
        let storage = Arc::new(MemoryStorage::new());
        let model = Model::new(
            storage.clone(),
            "example.com",
            ModelSettings::default(),
            clock.shared(),
        );
        let (handle, task) = spawn(model);
        (handle, task, storage, clock)
    }

    #[tokio::test]
    async fn signals_and_reads_are_serialized() {
        let (handle, _task, _storage, clock) = spawn_model();
        clock.advance_ms(4_000);
        handle.signal(LifecycleSignal::VisibilityHidden).await.unwrap();
        handle.signal(LifecycleSignal::Blur).await.unwrap();
        clock.advance_ms(10_000);

        let snap = handle.read_elapsed().await.unwrap();
        assert_eq!(snap.focus.elapsed_ms, 4_000);
        assert_eq!(snap.focus.state, TimerState::Paused);
        assert_eq!(snap.countup.elapsed_ms, 14_000);
        assert!(snap.today.elapsed_ms >= 4_000);
    }

    #[tokio::test]
    async fn events_are_published() {
        let (handle, _task, _storage, _clock) = spawn_model();
        let mut events = handle.subscribe();
        handle.signal(LifecycleSignal::Blur).await.unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(event, Event::TimerPaused { .. }));
    }

    #[tokio::test]
    async fn reset_zeroes_storage() {
        let (handle, _task, storage, clock) = spawn_model();
        clock.advance_ms(2_000);
        let event = handle.reset().await.unwrap();
        assert!(matches!(event, Event::DailyReset { .. }));
        assert_eq!(storage.value("tabfocus:example.com"), Some(0));
        let snap = handle.read_elapsed().await.unwrap();
        assert_eq!(snap.today.elapsed_ms, 0);
    }

    #[tokio::test]
    async fn shutdown_flushes_pending_focus() {
        let (handle, task, storage, clock) = spawn_model();
        clock.advance_ms(7_500);
        let outcome = handle.shutdown().await.unwrap();
        assert!(matches!(outcome, FlushOutcome::Flushed { .. } | FlushOutcome::Unchanged));
        task.await.unwrap();
        assert_eq!(storage.value("tabfocus:example.com"), Some(7_500));
        assert!(matches!(
            handle.read_elapsed().await,
            Err(CoreError::DriverClosed)
        ));
    }

    #[tokio::test]
    async fn storage_errors_reach_the_caller() {
        let (handle, _task, storage, _clock) = spawn_model();
        storage.fail_reads(true);
        assert!(matches!(
            handle.read_elapsed().await,
            Err(CoreError::Storage(_))
        ));
        storage.fail_reads(false);
        assert!(handle.read_elapsed().await.is_ok());
    }
}
