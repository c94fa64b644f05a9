//! Global hotkey registration.
//!
//! [`HotkeyRegistry`] is the seam the controller uses to bind its start/stop
//! toggle; [`HotkeyManager`] implements it on top of the `global-hotkey`
//! crate with a listener thread that dispatches key presses to callbacks.

use crate::error::{Result, RunnerError};
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Callback invoked on the listener thread when a hotkey is pressed.
pub type HotkeyCallback = Box<dyn Fn() + Send + Sync>;

/// Capability to bind system-wide hotkeys.
pub trait HotkeyRegistry {
    /// Bind `key` to `callback`, replacing any previous binding of that key.
    fn register(&mut self, key: &str, callback: HotkeyCallback) -> Result<()>;

    /// Remove the binding for `key`. Unknown keys are ignored.
    fn unregister(&mut self, key: &str) -> Result<()>;
}

type CallbackMap = Arc<Mutex<HashMap<u32, HotkeyCallback>>>;

pub struct HotkeyManager {
    manager: GlobalHotKeyManager,
    bindings: HashMap<String, HotKey>,
    callbacks: CallbackMap,
    shutdown: Arc<AtomicBool>,
}

impl HotkeyManager {
    pub fn new() -> Result<Self> {
        let manager = GlobalHotKeyManager::new().map_err(|e| {
            RunnerError::hotkey(format!("failed to create GlobalHotKeyManager: {e}"))
        })?;

        let callbacks: CallbackMap = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_listener(Arc::clone(&callbacks), Arc::clone(&shutdown))?;

        Ok(Self {
            manager,
            bindings: HashMap::new(),
            callbacks,
            shutdown,
        })
    }
}

impl HotkeyRegistry for HotkeyManager {
    fn register(&mut self, key: &str, callback: HotkeyCallback) -> Result<()> {
        let normalized = normalize_hotkey(key)?;
        let hotkey = parse_hotkey(key)?;

        if self.bindings.contains_key(&normalized) {
            self.unregister(key)?;
        }

        self.manager
            .register(hotkey)
            .map_err(|e| RunnerError::hotkey(format!("failed to register hotkey '{key}': {e}")))?;

        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hotkey.id(), callback);
        self.bindings.insert(normalized, hotkey);

        info!("global hotkey '{key}' registered");
        Ok(())
    }

    fn unregister(&mut self, key: &str) -> Result<()> {
        let normalized = normalize_hotkey(key)?;
        let Some(hotkey) = self.bindings.remove(&normalized) else {
            debug!("hotkey '{key}' was not registered");
            return Ok(());
        };

        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&hotkey.id());
        self.manager.unregister(hotkey).map_err(|e| {
            RunnerError::hotkey(format!("failed to unregister hotkey '{key}': {e}"))
        })?;

        info!("global hotkey '{key}' unregistered");
        Ok(())
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for (key, hotkey) in self.bindings.drain() {
            if let Err(e) = self.manager.unregister(hotkey) {
                warn!("failed to unregister hotkey '{key}': {e}");
            }
        }
    }
}

fn spawn_listener(callbacks: CallbackMap, shutdown: Arc<AtomicBool>) -> Result<()> {
    let receiver = GlobalHotKeyEvent::receiver();

    thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                let Ok(event) = receiver.recv_timeout(Duration::from_millis(100)) else {
                    continue;
                };
                if event.state != HotKeyState::Pressed {
                    continue;
                }
                let callbacks = callbacks.lock().unwrap_or_else(PoisonError::into_inner);
                match callbacks.get(&event.id) {
                    Some(callback) => callback(),
                    None => debug!(id = event.id, "hotkey event without a binding"),
                }
            }
        })?;

    Ok(())
}

const MODIFIERS: &[&str] = &["control", "alt", "shift", "super"];

fn canonical_token(token: &str) -> &str {
    match token {
        "ctrl" | "control" => "control",
        "alt" | "option" => "alt",
        "shift" => "shift",
        "meta" | "cmd" | "command" | "super" | "win" => "super",
        "esc" | "escape" => "escape",
        "return" | "enter" => "enter",
        "del" | "delete" => "delete",
        "up" | "arrowup" => "arrowup",
        "down" | "arrowdown" => "arrowdown",
        "left" | "arrowleft" => "arrowleft",
        "right" | "arrowright" => "arrowright",
        other => other,
    }
}

/// Lowercase a hotkey string, resolve aliases and check its shape: any
/// number of modifiers followed by exactly one key.
pub fn normalize_hotkey(hotkey_str: &str) -> Result<String> {
    let binding = hotkey_str.trim().to_lowercase();
    if binding.is_empty() {
        return Err(RunnerError::invalid_key_combination(
            hotkey_str,
            "empty hotkey string",
        ));
    }

    let mut modifiers = Vec::new();
    let mut key = None;

    for part in binding.split('+').map(str::trim) {
        if part.is_empty() {
            return Err(RunnerError::invalid_key_combination(
                hotkey_str,
                "empty key between '+' separators",
            ));
        }
        let token = canonical_token(part);
        if MODIFIERS.contains(&token) {
            if !modifiers.contains(&token) {
                modifiers.push(token);
            }
        } else if key.replace(token).is_some() {
            return Err(RunnerError::invalid_key_combination(
                hotkey_str,
                "multiple keys specified",
            ));
        }
    }

    let key = key.ok_or_else(|| {
        RunnerError::invalid_key_combination(hotkey_str, "no key specified")
    })?;

    modifiers.sort_by_key(|m| MODIFIERS.iter().position(|known| known == m));
    modifiers.push(key);
    Ok(modifiers.join("+"))
}

/// Parse a hotkey such as `f1` or `ctrl+alt+r`.
pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let normalized = normalize_hotkey(hotkey_str)?;
    HotKey::from_str(&normalized)
        .map_err(|e| RunnerError::invalid_key_combination(hotkey_str, e.to_string()))
}
