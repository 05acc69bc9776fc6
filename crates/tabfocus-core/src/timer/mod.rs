mod engine;

pub use engine::{Timer, TimerKind, TimerSnapshot, TimerState};
