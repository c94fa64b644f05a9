//! # Command Runner
//!
//! Types a stored list of text commands into whatever window has focus when
//! a global hotkey is pressed.
//!
//! ## Features
//!
//! - Commands are typed last to first, each preceded by a focus key and
//!   followed by Enter
//! - Configurable delay between commands and per-character typing speed
//! - Optional looping until the hotkey is pressed again
//! - Pause and resume without losing your place in the list
//! - JSON settings file that is saved after every change
//!
//! ## Example
//!
//! ```no_run
//! use command_runner::{EnigoInjector, Executor, RunEvent, Settings};
//! use std::sync::Arc;
//!
//! let settings = Settings {
//!     commands: vec!["/home".to_string(), "/spawn".to_string()],
//!     delay: 1.0,
//!     ..Settings::default()
//! };
//!
//! let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let executor = Executor::new(Arc::new(EnigoInjector::new().unwrap()), events);
//! let mut run = executor.start(settings.commands.clone(), settings.run_config()).unwrap();
//!
//! while let Some(event) = rx.blocking_recv() {
//!     if event == RunEvent::RunFinished {
//!         break;
//!     }
//! }
//! run.join();
//! ```
//!
//! ## Settings
//!
//! ```json
//! {
//!   "hotkey": "f1",
//!   "delay": 3.0,
//!   "typing_speed": 100.0,
//!   "loop_enabled": false,
//!   "commands": ["/spawn", "/home"],
//!   "focus_key": "t"
//! }
//! ```

pub mod controller;
pub mod error;
pub mod executor;
pub mod global_hotkey;
pub mod injector;
pub mod settings;

pub use controller::{ControlRequest, Controller, Status, ToggleOutcome};
pub use error::{Result, RunnerError};
pub use executor::{ExecutionState, Executor, RunConfig, RunEvent, RunHandle};
pub use global_hotkey::{HotkeyManager, HotkeyRegistry};
pub use injector::{EnigoInjector, Injector};
pub use settings::Settings;
