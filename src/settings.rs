//! Persisted settings for command-runner.
//!
//! Settings live in a small JSON file next to the working directory. Every
//! field is optional on disk; anything missing falls back to its default so
//! files written by older versions keep loading.

use crate::error::{Result, RunnerError};
use crate::executor::RunConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "command_runner.json";

/// Accepted range for the delay between commands, in seconds.
pub const DELAY_RANGE: (f64, f64) = (0.01, 600.0);

/// Accepted range for the typing speed, in characters per second.
pub const TYPING_SPEED_RANGE: (f64, f64) = (1.0, 1000.0);

/// The flat record stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Global hotkey that starts and stops a run.
    #[serde(default = "default_hotkey")]
    pub hotkey: String,

    /// Seconds to wait after each command.
    #[serde(default = "default_delay")]
    pub delay: f64,

    /// Characters typed per second.
    #[serde(default = "default_typing_speed")]
    pub typing_speed: f64,

    /// Repeat the command list until stopped.
    #[serde(default)]
    pub loop_enabled: bool,

    /// Stored commands in display order.
    #[serde(default)]
    pub commands: Vec<String>,

    /// Key pressed before typing each command, e.g. to open a chat line.
    #[serde(default = "default_focus_key")]
    pub focus_key: String,
}

fn default_hotkey() -> String {
    "f1".to_string()
}

fn default_delay() -> f64 {
    3.0
}

fn default_typing_speed() -> f64 {
    100.0
}

fn default_focus_key() -> String {
    "t".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hotkey: default_hotkey(),
            delay: default_delay(),
            typing_speed: default_typing_speed(),
            loop_enabled: false,
            commands: Vec::new(),
            focus_key: default_focus_key(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, failing on any I/O or parse error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| RunnerError::config_load(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|e| RunnerError::config_load(path.display().to_string(), e.to_string()))
    }

    /// Load settings, falling back to defaults.
    ///
    /// A missing file is the normal first-launch case and is not logged as a
    /// problem. Unreadable or corrupt files, and records with out-of-range
    /// values, are logged and replaced by the defaults; the caller never sees
    /// an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::metadata(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Self::default();
            }
            _ => {}
        }

        let loaded = Self::from_file(path).and_then(|settings| {
            settings.validate()?;
            Ok(settings)
        });
        match loaded {
            Ok(settings) => {
                debug!(path = %path.display(), commands = settings.commands.len(), "settings loaded");
                settings
            }
            Err(e) => {
                warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// Write settings to a JSON file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .map_err(|e| RunnerError::config_save(path.display().to_string(), e.to_string()))?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Check the run parameters against the accepted ranges.
    pub fn validate(&self) -> Result<()> {
        if self.hotkey.trim().is_empty() {
            return Err(RunnerError::invalid_config("hotkey cannot be empty"));
        }
        if self.focus_key.trim().is_empty() {
            return Err(RunnerError::invalid_config("focus_key cannot be empty"));
        }
        validate_delay(self.delay)?;
        validate_typing_speed(self.typing_speed)?;
        Ok(())
    }

    /// Snapshot the run parameters for a new run.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            delay: self.delay,
            typing_speed: self.typing_speed,
            loop_enabled: self.loop_enabled,
            focus_key: self.focus_key.clone(),
        }
    }
}

pub(crate) fn validate_delay(delay: f64) -> Result<()> {
    let (min, max) = DELAY_RANGE;
    if !(min..=max).contains(&delay) {
        return Err(RunnerError::invalid_config(format!(
            "delay must be between {min} and {max} seconds, got {delay}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_typing_speed(speed: f64) -> Result<()> {
    let (min, max) = TYPING_SPEED_RANGE;
    if !(min..=max).contains(&speed) {
        return Err(RunnerError::invalid_config(format!(
            "typing speed must be between {min} and {max} chars/sec, got {speed}"
        )));
    }
    Ok(())
}
