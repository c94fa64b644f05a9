//! Custom error types for command-runner.
//!
//! This module provides structured error types using `thiserror` so callers
//! can tell a rejected run apart from a settings file problem.

use std::io;
use thiserror::Error;

/// Main error type for command-runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Run parameters or the command list were rejected at start time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A run is already active; it has to be stopped first.
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// A command index outside the stored list.
    #[error("no command at index {index} (list has {len} commands)")]
    InvalidCommandIndex { index: usize, len: usize },

    /// The specified key is invalid or unsupported.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Error parsing a hotkey combination.
    #[error("invalid key combination '{combo}': {reason}")]
    InvalidKeyCombination { combo: String, reason: String },

    /// Error reading or parsing the settings file.
    #[error("failed to load settings from '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Error writing the settings file.
    #[error("failed to save settings to '{path}': {reason}")]
    ConfigSave { path: String, reason: String },

    /// Error registering or handling a hotkey.
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// The OS input simulation facility refused a request.
    #[error("input injection failed: {0}")]
    Injection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for command-runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

impl RunnerError {
    /// Create a new InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn invalid_command_index(index: usize, len: usize) -> Self {
        Self::InvalidCommandIndex { index, len }
    }

    /// Create a new InvalidKey error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidKeyCombination error.
    pub fn invalid_key_combination(combo: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKeyCombination {
            combo: combo.into(),
            reason: reason.into(),
        }
    }

    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_save(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigSave {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Hotkey error.
    pub fn hotkey(message: impl Into<String>) -> Self {
        Self::Hotkey(message.into())
    }

    pub fn injection(message: impl Into<String>) -> Self {
        Self::Injection(message.into())
    }

    /// True for errors caused by reading or writing the settings file.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigSave { .. } | Self::Io(_) | Self::Json(_)
        )
    }
}
