//! # tabfocus Core Library
//!
//! Tracks how long a page has had the user's attention ("focus") and how long
//! it has been open ("countup"), and keeps a per-site daily focus total in
//! durable storage that resets at local midnight.
//!
//! ## Architecture
//!
//! - **Timer**: A wall-clock-based stopwatch state machine; the caller drives
//!   `tick()` periodically
//! - **Model**: The countup/focus timer pair, lifecycle-signal wiring and the
//!   policy that turns focus ticks into additive storage updates
//! - **Driver**: A single tokio task that owns a model and serializes ticks,
//!   midnight polls and caller commands
//! - **Storage**: Async key-value trait with SQLite and in-memory backends,
//!   plus TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Timer`]: Pausable stopwatch
//! - [`Model`]: Per-page timer context and persistence reconciliation
//! - [`ModelHandle`]: Handle to a spawned model task
//! - [`Storage`]: Trait for the durable key-value store
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod storage;
pub mod timer;
pub mod view;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{ConfigError, CoreError, StorageError, TimerError};
pub use events::{Event, ResetReason};
pub use lifecycle::LifecycleSignal;
pub use model::{
    spawn, Checkpoint, ElapsedSnapshot, FlushOutcome, Model, ModelHandle, ModelSettings,
};
pub use storage::{
    roll_over_stale_total, site_id, stamp_day, stamped_day, total_for_day, Config, MemoryStorage,
    SqliteStorage, Storage, StorageKey,
};
pub use timer::{Timer, TimerKind, TimerSnapshot, TimerState};
pub use view::{badge_text, format_hms, DisplayMode};
