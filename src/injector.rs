//! Simulated keyboard input.
//!
//! The execution loop only needs two primitives from the OS: press and
//! release a named key, and type a string at a given pace. They are
//! expressed by the [`Injector`] trait so the loop can be driven by a fake
//! in tests; [`EnigoInjector`] is the real implementation.

use crate::error::{Result, RunnerError};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::thread;
use std::time::Duration;
use tracing::{trace, warn};

/// Key sent after every command.
pub const SUBMIT_KEY: &str = "enter";

/// Capability to simulate keyboard input on the focused window.
pub trait Injector: Send + Sync {
    /// Press and release a single named key.
    fn press_key(&self, key: &str) -> Result<()>;

    /// Type `text` at roughly `chars_per_sec` characters per second.
    fn type_text(&self, text: &str, chars_per_sec: f64) -> Result<()>;
}

/// Send one command: focus key, the command text, then Enter.
///
/// Failures of the underlying OS call are logged and dropped; the caller
/// treats injection as best effort.
pub fn inject(injector: &dyn Injector, focus_key: &str, command: &str, typing_speed: f64) {
    if let Err(e) = injector.press_key(focus_key) {
        warn!(key = focus_key, "failed to press focus key: {e}");
    }
    if let Err(e) = injector.type_text(command, typing_speed) {
        warn!(command, "failed to type command: {e}");
    }
    if let Err(e) = injector.press_key(SUBMIT_KEY) {
        warn!("failed to press {SUBMIT_KEY}: {e}");
    }
}

/// Injector backed by the `enigo` crate.
#[derive(Debug, Clone, Default)]
pub struct EnigoInjector;

impl EnigoInjector {
    /// Create an injector, checking that the platform backend is reachable.
    pub fn new() -> Result<Self> {
        connect()?;
        Ok(Self)
    }
}

impl Injector for EnigoInjector {
    fn press_key(&self, key: &str) -> Result<()> {
        let key = parse_key(key)?;
        let mut enigo = connect()?;
        enigo
            .key(key, Direction::Click)
            .map_err(|e| RunnerError::injection(e.to_string()))
    }

    fn type_text(&self, text: &str, chars_per_sec: f64) -> Result<()> {
        let pause = char_interval(chars_per_sec);
        let mut enigo = connect()?;
        let mut buf = [0u8; 4];
        for c in text.chars() {
            enigo
                .text(c.encode_utf8(&mut buf))
                .map_err(|e| RunnerError::injection(e.to_string()))?;
            thread::sleep(pause);
        }
        trace!(chars = text.chars().count(), "typed text");
        Ok(())
    }
}

fn connect() -> Result<Enigo> {
    Enigo::new(&Settings::default())
        .map_err(|e| RunnerError::injection(format!("failed to create Enigo instance: {e}")))
}

/// Pause between two typed characters.
pub fn char_interval(chars_per_sec: f64) -> Duration {
    if chars_per_sec.is_finite() && chars_per_sec > 0.0 {
        Duration::from_secs_f64(1.0 / chars_per_sec)
    } else {
        Duration::ZERO
    }
}

/// Map a key name to an enigo key. Single characters map to themselves.
pub fn parse_key(key: &str) -> Result<Key> {
    let name = key.trim().to_lowercase();

    let parsed = match name.as_str() {
        "" => return Err(RunnerError::invalid_key(key, "empty key name")),
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "escape" | "esc" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" | "arrowup" => Key::UpArrow,
        "down" | "arrowdown" => Key::DownArrow,
        "left" | "arrowleft" => Key::LeftArrow,
        "right" | "arrowright" => Key::RightArrow,
        "shift" => Key::Shift,
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = key.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return Err(RunnerError::invalid_key(key, format!("unknown key '{other}'"))),
            }
        }
    };

    Ok(parsed)
}
