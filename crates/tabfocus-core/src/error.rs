//! Core error types for tabfocus-core.
//!
//! Timer transition defects, storage I/O failures and configuration problems
//! each get their own enum; `CoreError` wraps them for callers that do not care
//! which layer failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::{TimerKind, TimerState};

/// Core error type for tabfocus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Illegal timer transition (programming defect upstream)
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Storage read/write failures
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The model task is gone (driver shut down or panicked)
    #[error("Model driver is no longer running")]
    DriverClosed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Timer state machine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("{kind} timer cannot {operation} while {from}")]
    InvalidTransition {
        kind: TimerKind,
        from: TimerState,
        operation: &'static str,
    },
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing store
    #[error("Failed to open storage at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Reading a key failed
    #[error("Failed to read '{key}': {message}")]
    Read { key: String, message: String },

    /// Writing a key failed
    #[error("Failed to write '{key}': {message}")]
    Write { key: String, message: String },

    /// Stored value could not be interpreted
    #[error("Corrupt value for '{key}': {value}")]
    Corrupt { key: String, value: String },

    /// Backend error not tied to a single key
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
