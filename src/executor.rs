//! The execution loop.
//!
//! A run types a snapshot of the command list into the focused window on a
//! dedicated worker thread. The control side talks to the worker through a
//! mutex-guarded [`ExecutionState`] and a condition variable, so pausing,
//! resuming and stopping wake the worker immediately instead of waiting for
//! a poll interval. Progress is reported as [`RunEvent`]s on an unbounded
//! channel and the current state is mirrored into a `watch` channel for
//! observers.

use crate::error::{Result, RunnerError};
use crate::injector::{inject, Injector};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Parameters of a single run, captured when the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Seconds to wait after each command.
    pub delay: f64,
    /// Characters typed per second.
    pub typing_speed: f64,
    /// Repeat the command list until stopped.
    pub loop_enabled: bool,
    /// Key pressed before each command.
    pub focus_key: String,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.delay.is_finite() && self.delay > 0.0) {
            return Err(RunnerError::invalid_config(format!(
                "delay must be a positive number of seconds, got {}",
                self.delay
            )));
        }
        if Duration::try_from_secs_f64(self.delay).is_err() {
            return Err(RunnerError::invalid_config(format!(
                "delay of {} seconds is too large",
                self.delay
            )));
        }
        if !(self.typing_speed.is_finite() && self.typing_speed > 0.0) {
            return Err(RunnerError::invalid_config(format!(
                "typing speed must be a positive number of chars/sec, got {}",
                self.typing_speed
            )));
        }
        if self.focus_key.trim().is_empty() {
            return Err(RunnerError::invalid_config("focus key cannot be empty"));
        }
        Ok(())
    }

    fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay).unwrap_or(Duration::MAX)
    }
}

/// Lifecycle of the execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
}

/// Progress notifications emitted by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A command was typed and submitted.
    CommandExecuted(String),
    /// The run ended, either after its last pass or because it was stopped.
    RunFinished,
}

/// Starts runs against an injector.
///
/// Only one run can be active at a time; the executor's state is `Idle`
/// between runs.
pub struct Executor {
    injector: Arc<dyn Injector>,
    events: mpsc::UnboundedSender<RunEvent>,
    state: Arc<watch::Sender<ExecutionState>>,
}

impl Executor {
    pub fn new(injector: Arc<dyn Injector>, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        let (state, _) = watch::channel(ExecutionState::Idle);
        Self {
            injector,
            events,
            state: Arc::new(state),
        }
    }

    /// Current state of the executor.
    pub fn state(&self) -> ExecutionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.state.subscribe()
    }

    /// Start a run over `commands`.
    ///
    /// Commands are executed last to first. Nothing is spawned when the
    /// arguments are rejected.
    pub fn start(&self, commands: Vec<String>, config: RunConfig) -> Result<RunHandle> {
        if commands.is_empty() {
            return Err(RunnerError::invalid_config("no commands to execute"));
        }
        config.validate()?;

        let claimed = self.state.send_if_modified(|state| {
            if *state == ExecutionState::Idle {
                *state = ExecutionState::Running;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(RunnerError::AlreadyRunning);
        }

        let control = Arc::new(Control::new(Arc::clone(&self.state)));
        let worker = Worker {
            commands,
            config,
            injector: Arc::clone(&self.injector),
            events: self.events.clone(),
            control: Arc::clone(&control),
            started: false,
        };

        let spawned = thread::Builder::new()
            .name("command-runner".into())
            .spawn(move || worker.run());

        match spawned {
            Ok(thread) => Ok(RunHandle {
                control,
                thread: Some(thread),
            }),
            Err(e) => {
                // The unstarted worker was dropped; its drop already reset the state.
                Err(RunnerError::Io(e))
            }
        }
    }
}

/// Owns an active run.
///
/// Dropping the handle stops the run and waits for the worker to exit.
pub struct RunHandle {
    control: Arc<Control>,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    /// Suspend the run before its next command. Returns false if the run
    /// was not running.
    pub fn pause(&self) -> bool {
        let paused = self
            .control
            .transition(&[ExecutionState::Running], ExecutionState::Paused);
        if paused {
            info!("run paused");
        }
        paused
    }

    /// Continue a paused run. Returns false if the run was not paused.
    pub fn resume(&self) -> bool {
        let resumed = self
            .control
            .transition(&[ExecutionState::Paused], ExecutionState::Running);
        if resumed {
            info!("run resumed");
        }
        resumed
    }

    /// Request termination and wait for the worker thread to exit.
    pub fn stop(&mut self) {
        if self.control.transition(
            &[ExecutionState::Running, ExecutionState::Paused],
            ExecutionState::Stopping,
        ) {
            info!("stopping run");
        }
        self.join();
    }

    /// Wait for the run to end on its own.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("command runner thread panicked");
            }
        }
    }

    /// State of this run. `Idle` once it has finished.
    pub fn state(&self) -> ExecutionState {
        *self.control.lock()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ExecutionState::Idle
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State shared between a run's handle and its worker.
struct Control {
    state: Mutex<ExecutionState>,
    changed: Condvar,
    observer: Arc<watch::Sender<ExecutionState>>,
}

impl Control {
    fn new(observer: Arc<watch::Sender<ExecutionState>>) -> Self {
        Self {
            state: Mutex::new(ExecutionState::Running),
            changed: Condvar::new(),
            observer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, guard: &mut MutexGuard<'_, ExecutionState>, to: ExecutionState) {
        **guard = to;
        self.observer.send_replace(to);
        self.changed.notify_all();
    }

    fn transition(&self, from: &[ExecutionState], to: ExecutionState) -> bool {
        let mut guard = self.lock();
        if !from.contains(&*guard) {
            return false;
        }
        self.set(&mut guard, to);
        true
    }

    fn finish(&self) {
        let mut guard = self.lock();
        self.set(&mut guard, ExecutionState::Idle);
    }

    /// Block while paused. Returns false once the run is stopping.
    fn wait_until_runnable(&self) -> bool {
        let mut guard = self.lock();
        loop {
            match *guard {
                ExecutionState::Running => return true,
                ExecutionState::Stopping | ExecutionState::Idle => return false,
                ExecutionState::Paused => {
                    guard = self
                        .changed
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Sleep for `duration` unless a stop request arrives first. Returns
    /// false if the sleep was cut short. A deadline past what `Instant` can
    /// represent waits until stopped.
    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut guard = self.lock();
        loop {
            if matches!(*guard, ExecutionState::Stopping | ExecutionState::Idle) {
                return false;
            }
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    self.changed
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .changed
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

struct Worker {
    commands: Vec<String>,
    config: RunConfig,
    injector: Arc<dyn Injector>,
    events: mpsc::UnboundedSender<RunEvent>,
    control: Arc<Control>,
    started: bool,
}

impl Worker {
    fn run(mut self) {
        self.started = true;
        info!(
            commands = self.commands.len(),
            loop_enabled = self.config.loop_enabled,
            "run started"
        );
        let delay = self.config.delay();
        let mut passes: u64 = 0;

        'run: loop {
            if passes > 0 && !self.config.loop_enabled {
                break;
            }
            passes += 1;
            debug!(pass = passes, "starting pass");

            for command in self.commands.iter().rev() {
                if !self.control.wait_until_runnable() {
                    break 'run;
                }

                inject(
                    self.injector.as_ref(),
                    &self.config.focus_key,
                    command,
                    self.config.typing_speed,
                );
                debug!(command = %command, "command executed");
                let _ = self
                    .events
                    .send(RunEvent::CommandExecuted(command.clone()));

                if !self.control.sleep(delay) {
                    break 'run;
                }
            }
        }

        info!(passes, "run finished");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.control.finish();
        if self.started {
            let _ = self.events.send(RunEvent::RunFinished);
        }
    }
}
