//! Control surface logic.
//!
//! The [`Controller`] owns the settings, the executor and the single active
//! [`RunHandle`]. Front ends (the CLI daemon, tests) call into it; the global
//! hotkey only posts a [`ControlRequest`] so that all mutation happens on the
//! caller's side.

use crate::error::{Result, RunnerError};
use crate::executor::{ExecutionState, Executor, RunEvent, RunHandle};
use crate::global_hotkey::{parse_hotkey, HotkeyRegistry};
use crate::injector::{parse_key, Injector};
use crate::settings::{validate_delay, validate_typing_speed, Settings};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Requests posted to the controller from other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Start a run, or stop the active one.
    Toggle,
    /// Pause the active run, or resume it if paused.
    TogglePause,
    Quit,
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
}

/// Status line shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Stopped,
    Running,
    Paused,
    Executed(String),
    Finished,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Stopped => write!(f, "Status: Stopped"),
            Status::Running => write!(f, "Status: Running..."),
            Status::Paused => write!(f, "Status: Paused"),
            Status::Executed(command) => write!(f, "Executed: {command}"),
            Status::Finished => write!(f, "Status: Finished"),
        }
    }
}

pub struct Controller {
    settings_path: PathBuf,
    settings: Settings,
    executor: Executor,
    run: Option<RunHandle>,
    registry: Option<Box<dyn HotkeyRegistry>>,
    requests: mpsc::UnboundedSender<ControlRequest>,
    status: Status,
}

impl Controller {
    pub fn new(
        settings_path: impl Into<PathBuf>,
        settings: Settings,
        injector: Arc<dyn Injector>,
        events: mpsc::UnboundedSender<RunEvent>,
        requests: mpsc::UnboundedSender<ControlRequest>,
    ) -> Self {
        Self {
            settings_path: settings_path.into(),
            settings,
            executor: Executor::new(injector, events),
            run: None,
            registry: None,
            requests,
            status: Status::Stopped,
        }
    }

    /// Attach a hotkey registry. Without one, hotkey changes are only
    /// validated and saved.
    pub fn with_registry(mut self, registry: Box<dyn HotkeyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn state(&self) -> ExecutionState {
        self.executor.state()
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.is_finished())
    }

    /// Bind the stored hotkey to the start/stop toggle.
    pub fn bind_hotkey(&mut self) -> Result<()> {
        let Some(registry) = self.registry.as_mut() else {
            return Ok(());
        };
        let key = self.settings.hotkey.clone();
        let requests = self.requests.clone();
        registry.register(
            &key,
            Box::new(move || {
                let _ = requests.send(ControlRequest::Toggle);
            }),
        )
    }

    /// Rebind the toggle to a new hotkey and persist it.
    ///
    /// The previous binding is released first. If the new key cannot be
    /// registered the old one is restored and the settings stay unchanged.
    pub fn set_hotkey(&mut self, key: &str) -> Result<()> {
        parse_hotkey(key)?;
        let previous = std::mem::replace(&mut self.settings.hotkey, key.trim().to_string());

        if let Some(registry) = self.registry.as_mut() {
            if let Err(e) = registry.unregister(&previous) {
                warn!("failed to release hotkey '{previous}': {e}");
            }
        }
        if let Err(e) = self.bind_hotkey() {
            self.settings.hotkey = previous;
            if let Err(restore) = self.bind_hotkey() {
                warn!("failed to restore hotkey '{}': {restore}", self.settings.hotkey);
            }
            return Err(e);
        }

        info!(hotkey = %self.settings.hotkey, "hotkey changed");
        self.persist();
        Ok(())
    }

    /// Append a command. Blank input is ignored and returns false.
    pub fn add_command(&mut self, text: &str) -> bool {
        let command = text.trim();
        if command.is_empty() {
            return false;
        }
        self.settings.commands.push(command.to_string());
        self.persist();
        true
    }

    pub fn edit_command(&mut self, index: usize, text: &str) -> Result<()> {
        let command = text.trim();
        if command.is_empty() {
            return Err(RunnerError::invalid_config("command cannot be empty"));
        }
        let len = self.settings.commands.len();
        let slot = self
            .settings
            .commands
            .get_mut(index)
            .ok_or_else(|| RunnerError::invalid_command_index(index, len))?;
        *slot = command.to_string();
        self.persist();
        Ok(())
    }

    /// Remove and return the command at `index`.
    pub fn remove_command(&mut self, index: usize) -> Result<String> {
        let len = self.settings.commands.len();
        if index >= len {
            return Err(RunnerError::invalid_command_index(index, len));
        }
        let removed = self.settings.commands.remove(index);
        self.persist();
        Ok(removed)
    }

    pub fn set_delay(&mut self, delay: f64) -> Result<()> {
        validate_delay(delay)?;
        self.settings.delay = delay;
        self.persist();
        Ok(())
    }

    pub fn set_typing_speed(&mut self, speed: f64) -> Result<()> {
        validate_typing_speed(speed)?;
        self.settings.typing_speed = speed;
        self.persist();
        Ok(())
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.settings.loop_enabled = enabled;
        self.persist();
    }

    pub fn set_focus_key(&mut self, key: &str) -> Result<()> {
        parse_key(key)?;
        self.settings.focus_key = key.trim().to_string();
        self.persist();
        Ok(())
    }

    /// Start a run, or stop and join the active one.
    pub fn toggle(&mut self) -> Result<ToggleOutcome> {
        if self.is_running() {
            self.stop();
            return Ok(ToggleOutcome::Stopped);
        }

        // A finished run leaves its handle behind until the next toggle.
        self.run = None;
        let handle = self
            .executor
            .start(self.settings.commands.clone(), self.settings.run_config())?;
        self.run = Some(handle);
        self.status = Status::Running;
        info!(commands = self.settings.commands.len(), "run started");
        Ok(ToggleOutcome::Started)
    }

    /// Pause the active run, or resume it. Returns the resulting state.
    pub fn toggle_pause(&mut self) -> ExecutionState {
        if let Some(run) = &self.run {
            if run.pause() {
                self.status = Status::Paused;
            } else if run.resume() {
                self.status = Status::Running;
            }
        }
        self.state()
    }

    /// Stop the active run, if any, and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(mut run) = self.run.take() {
            run.stop();
            self.status = Status::Stopped;
        }
    }

    /// Update the status line from a run event.
    pub fn handle_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::CommandExecuted(command) => {
                if self.is_running() {
                    self.status = Status::Executed(command.clone());
                }
            }
            RunEvent::RunFinished => {
                // Events carry no run id; a stale finish must not end a newer run.
                if !self.is_running() && self.status != Status::Stopped {
                    self.status = Status::Finished;
                }
            }
        }
    }

    /// Stop any active run and save the settings.
    pub fn shutdown(&mut self) {
        self.stop();
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.settings.save_to_file(&self.settings_path) {
            warn!("{e}");
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
