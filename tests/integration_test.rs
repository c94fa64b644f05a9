use anyhow::Result;
use command_runner::{
    ExecutionState, Executor, Injector, RunConfig, RunEvent, RunnerError, Settings,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Records every injected command.
#[derive(Default)]
struct RecordingInjector {
    typed: Mutex<Vec<String>>,
    keys: Mutex<Vec<String>>,
}

impl Injector for RecordingInjector {
    fn press_key(&self, key: &str) -> command_runner::Result<()> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn type_text(&self, text: &str, _chars_per_sec: f64) -> command_runner::Result<()> {
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn commands(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn run_config(delay: f64, loop_enabled: bool) -> RunConfig {
    RunConfig {
        delay,
        typing_speed: 1000.0,
        loop_enabled,
        focus_key: "t".to_string(),
    }
}

fn setup() -> (Executor, Arc<RecordingInjector>, UnboundedReceiver<RunEvent>) {
    let injector = Arc::new(RecordingInjector::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let executor = Executor::new(injector.clone(), tx);
    (executor, injector, rx)
}

fn recv_timeout(rx: &mut UnboundedReceiver<RunEvent>, timeout: Duration) -> Option<RunEvent> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(event) = rx.try_recv() {
            return Some(event);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn collect_until_finished(rx: &mut UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Some(event) = recv_timeout(rx, Duration::from_secs(5)) {
        let finished = event == RunEvent::RunFinished;
        events.push(event);
        if finished {
            break;
        }
    }
    events
}

fn executed(name: &str) -> RunEvent {
    RunEvent::CommandExecuted(name.to_string())
}

#[test]
fn test_single_pass_runs_in_reverse_order() {
    let (executor, injector, mut rx) = setup();
    let mut handle = executor
        .start(commands(&["A", "B", "C"]), run_config(0.01, false))
        .unwrap();

    let events = collect_until_finished(&mut rx);
    assert_eq!(
        events,
        vec![executed("C"), executed("B"), executed("A"), RunEvent::RunFinished]
    );

    handle.join();
    assert!(handle.is_finished());
    assert_eq!(executor.state(), ExecutionState::Idle);
    assert!(recv_timeout(&mut rx, Duration::from_millis(100)).is_none());

    assert_eq!(*injector.typed.lock().unwrap(), commands(&["C", "B", "A"]));
    assert_eq!(
        *injector.keys.lock().unwrap(),
        commands(&["t", "enter", "t", "enter", "t", "enter"])
    );
}

#[test]
fn test_immediate_stop_emits_at_most_one_command() {
    let (executor, _injector, mut rx) = setup();
    let mut handle = executor
        .start(commands(&["A", "B", "C"]), run_config(1.0, false))
        .unwrap();
    handle.stop();

    assert_eq!(executor.state(), ExecutionState::Idle);
    let events = collect_until_finished(&mut rx);
    assert_eq!(events.last(), Some(&RunEvent::RunFinished));
    let commands_seen = events
        .iter()
        .filter(|e| matches!(e, RunEvent::CommandExecuted(_)))
        .count();
    assert!(commands_seen <= 1, "saw {commands_seen} commands");
}

#[test]
fn test_looping_run_stops_on_request() {
    let (executor, _injector, mut rx) = setup();
    let mut handle = executor
        .start(commands(&["A", "B", "C"]), run_config(0.01, true))
        .unwrap();

    // Wait for the first full pass and the start of the second.
    let mut seen = Vec::new();
    while seen.len() < 4 {
        let event = recv_timeout(&mut rx, Duration::from_secs(5)).expect("loop stalled");
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![executed("C"), executed("B"), executed("A"), executed("C")]
    );

    handle.stop();
    assert_eq!(executor.state(), ExecutionState::Idle);
    let rest = collect_until_finished(&mut rx);
    assert_eq!(rest.last(), Some(&RunEvent::RunFinished));
    assert!(recv_timeout(&mut rx, Duration::from_millis(100)).is_none());
}

#[test]
fn test_pause_holds_events_until_resume() {
    let (executor, _injector, mut rx) = setup();
    let mut handle = executor
        .start(commands(&["A", "B", "C"]), run_config(0.2, false))
        .unwrap();

    assert_eq!(recv_timeout(&mut rx, Duration::from_secs(5)), Some(executed("C")));
    assert!(handle.pause());
    assert_eq!(executor.state(), ExecutionState::Paused);

    // Longer than the delay: the next command would have been sent by now.
    assert!(recv_timeout(&mut rx, Duration::from_millis(600)).is_none());

    assert!(handle.resume());
    let events = collect_until_finished(&mut rx);
    assert_eq!(
        events,
        vec![executed("B"), executed("A"), RunEvent::RunFinished]
    );
    handle.join();
}

#[test]
fn test_stop_while_paused() {
    let (executor, _injector, mut rx) = setup();
    let mut handle = executor
        .start(commands(&["A", "B"]), run_config(0.01, true))
        .unwrap();
    assert!(recv_timeout(&mut rx, Duration::from_secs(5)).is_some());
    handle.pause();

    let started = Instant::now();
    handle.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(handle.state(), ExecutionState::Idle);
    assert_eq!(collect_until_finished(&mut rx).last(), Some(&RunEvent::RunFinished));
}

#[test]
fn test_start_rejects_invalid_input() {
    let (executor, injector, mut rx) = setup();

    let result = executor.start(Vec::new(), run_config(1.0, false));
    assert!(matches!(result, Err(RunnerError::InvalidConfig(_))));

    let result = executor.start(commands(&["A"]), run_config(0.0, false));
    assert!(matches!(result, Err(RunnerError::InvalidConfig(_))));

    let mut bad_speed = run_config(1.0, false);
    bad_speed.typing_speed = -5.0;
    let result = executor.start(commands(&["A"]), bad_speed);
    assert!(matches!(result, Err(RunnerError::InvalidConfig(_))));

    assert_eq!(executor.state(), ExecutionState::Idle);
    assert!(recv_timeout(&mut rx, Duration::from_millis(50)).is_none());
    assert!(injector.typed.lock().unwrap().is_empty());
}

#[test]
fn test_run_uses_snapshot_of_commands() {
    let (executor, injector, mut rx) = setup();
    let mut list = commands(&["A", "B"]);
    let mut handle = executor
        .start(list.clone(), run_config(0.05, false))
        .unwrap();
    list.push("C".to_string());

    collect_until_finished(&mut rx);
    handle.join();
    assert_eq!(*injector.typed.lock().unwrap(), commands(&["B", "A"]));
}

#[test]
fn test_state_watch_reports_transitions() {
    let (executor, _injector, mut rx) = setup();
    let watcher = executor.subscribe();
    assert_eq!(*watcher.borrow(), ExecutionState::Idle);

    let handle = executor
        .start(commands(&["A"]), run_config(5.0, false))
        .unwrap();
    assert_eq!(*watcher.borrow(), ExecutionState::Running);
    handle.pause();
    assert_eq!(*watcher.borrow(), ExecutionState::Paused);
    drop(handle);
    assert_eq!(*watcher.borrow(), ExecutionState::Idle);
    collect_until_finished(&mut rx);
}

// Settings store

#[test]
fn test_settings_round_trip() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("command_runner.json");

    let original = Settings {
        hotkey: "f2".to_string(),
        delay: 1.5,
        typing_speed: 50.0,
        loop_enabled: true,
        commands: commands(&["x", "y"]),
        ..Settings::default()
    };
    original.save_to_file(&path)?;

    let loaded = Settings::from_file(&path)?;
    assert_eq!(loaded, original);
    assert_eq!(Settings::load_or_default(&path), original);
    Ok(())
}

#[test]
fn test_settings_file_format() -> Result<()> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(
        br#"{"hotkey": "f2", "delay": 1.5, "typing_speed": 50, "loop_enabled": true, "commands": ["x", "y"]}"#,
    )?;

    let settings = Settings::from_file(temp_file.path())?;
    assert_eq!(settings.hotkey, "f2");
    assert_eq!(settings.delay, 1.5);
    assert_eq!(settings.typing_speed, 50.0);
    assert!(settings.loop_enabled);
    assert_eq!(settings.commands, commands(&["x", "y"]));
    assert_eq!(settings.focus_key, "t");
    Ok(())
}

#[test]
fn test_missing_settings_file_yields_defaults() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("does_not_exist.json");

    assert_eq!(Settings::load_or_default(&path), Settings::default());
    assert!(matches!(
        Settings::from_file(&path),
        Err(RunnerError::ConfigLoad { .. })
    ));
    Ok(())
}

#[test]
fn test_corrupt_settings_file_yields_defaults() -> Result<()> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(b"{ this is not json")?;

    assert_eq!(Settings::load_or_default(temp_file.path()), Settings::default());
    Ok(())
}

#[test]
fn test_out_of_range_settings_file_yields_defaults() -> Result<()> {
    for record in [
        r#"{"delay": 0.001, "commands": ["x"]}"#,
        r#"{"typing_speed": 5000, "commands": ["x"]}"#,
        r#"{"delay": 1e20}"#,
    ] {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(record.as_bytes())?;

        // The strict loader still parses the record; only the lenient one rejects it.
        let parsed = Settings::from_file(temp_file.path())?;
        assert!(parsed.validate().is_err());
        assert_eq!(Settings::load_or_default(temp_file.path()), Settings::default());
    }
    Ok(())
}

#[test]
fn test_save_to_unwritable_path_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("missing_dir").join("settings.json");

    let err = Settings::default().save_to_file(&path).unwrap_err();
    assert!(matches!(err, RunnerError::ConfigSave { .. }));
    assert!(err.is_persistence());
}
