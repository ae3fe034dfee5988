// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeedwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Bad or contradictory test options, rejected before anything spawns.
    #[error("Invalid test options: {0}")]
    Validation(String),

    /// Another test holds the execution slot.
    #[error("a speed test is already running")]
    AlreadyRunning,

    #[error("test cancelled")]
    Cancelled,

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited unsuccessfully (code {code:?})")]
    ProcessFailed { program: String, code: Option<i32> },

    #[error("'{program}' timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    /// Every line of a process' output was unusable.
    #[error("no usable output from '{0}'")]
    EmptyOutput(String),

    #[error("failed to kill process group {pgid}: {reason}")]
    ProcessGroup { pgid: i32, reason: String },

    #[error("invalid schedule interval '{interval}': {reason}")]
    InvalidInterval { interval: String, reason: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpeedwatchError {
    /// Cancellation is not an incident; callers use this to skip logging
    /// and persistence of partial state.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SpeedwatchError::Cancelled)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SpeedwatchError>;
