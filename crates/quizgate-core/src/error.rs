//! Core error types for quizgate-core.
//!
//! Declined session operations (starting while gated, answering after
//! expiry) are ordinary `SessionError` values surfaced to the caller,
//! never panics. Progress anomalies are not errors at all -- see
//! `gating::ProgressOutcome`.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionStatus;

/// Core error type for quizgate-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Declined session operation
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Declined session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Gating has not been satisfied; carries the resources still missing
    /// so the caller can surface them to the learner.
    #[error("session not ready: {} required resource(s) incomplete", missing.len())]
    NotReady { missing: Vec<String> },

    /// The session is not in a state from which it can be started.
    #[error("cannot start session while {status}")]
    NotStartable { status: SessionStatus },

    /// Answers are frozen once the session is expired or submitted.
    #[error("answers are closed while {status}")]
    AnswersClosed { status: SessionStatus },

    /// The clock can only be armed with a positive duration.
    #[error("cannot arm clock without a positive duration")]
    UntimedClock,

    /// The owning session task has shut down (hub embodiment).
    #[error("session task is no longer running")]
    SessionClosed,
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Data directory could not be resolved or created
    #[error("Failed to prepare data directory: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
