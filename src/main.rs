use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use command_runner::settings::DEFAULT_SETTINGS_FILE;
use command_runner::{
    ControlRequest, Controller, EnigoInjector, ExecutionState, HotkeyManager, RunEvent, Settings,
    ToggleOutcome,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "crun", version, about = "Type stored commands into the focused window on a hotkey")]
struct Cli {
    /// Settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for the hotkey and run the command list (default)
    Run,
    /// Show the settings and the stored commands
    List,
    /// Append a command
    Add { text: String },
    /// Replace the command at a position (as shown by `list`)
    Edit { position: usize, text: String },
    /// Delete the command at a position (as shown by `list`)
    Remove { position: usize },
    /// Change run parameters
    Set {
        /// Start/stop hotkey, e.g. "f1" or "ctrl+alt+r"
        #[arg(long)]
        hotkey: Option<String>,
        /// Seconds between commands
        #[arg(long)]
        delay: Option<f64>,
        /// Characters per second
        #[arg(long)]
        typing_speed: Option<f64>,
        /// Repeat the list until stopped
        #[arg(long = "loop")]
        loop_enabled: Option<bool>,
        /// Key pressed before each command
        #[arg(long)]
        focus_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = Settings::load_or_default(&path);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let injector = EnigoInjector::new().context("keyboard simulation is unavailable")?;
            let controller = Controller::new(
                &path,
                settings,
                Arc::new(injector),
                events_tx,
                requests_tx.clone(),
            );
            run_daemon(controller, events_rx, requests_rx, requests_tx).await
        }
        command => {
            let mut controller = Controller::new(
                &path,
                settings,
                Arc::new(EnigoInjector),
                events_tx,
                requests_tx,
            );
            edit_settings(&mut controller, command)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_target(false)
        .try_init();
}

fn edit_settings(controller: &mut Controller, command: Command) -> Result<()> {
    match command {
        Command::Run | Command::List => print_settings(controller.settings()),
        Command::Add { text } => {
            if controller.add_command(&text) {
                println!("{} {}", "Added:".green().bold(), text.trim());
            } else {
                println!("{}", "Nothing added: command is empty".yellow());
            }
        }
        Command::Edit { position, text } => {
            controller.edit_command(index_of(position)?, &text)?;
            println!("{} #{position} -> {}", "Changed:".green().bold(), text.trim());
        }
        Command::Remove { position } => {
            let removed = controller.remove_command(index_of(position)?)?;
            println!("{} {removed}", "Removed:".green().bold());
        }
        Command::Set {
            hotkey,
            delay,
            typing_speed,
            loop_enabled,
            focus_key,
        } => {
            if let Some(hotkey) = hotkey {
                controller.set_hotkey(&hotkey)?;
            }
            if let Some(delay) = delay {
                controller.set_delay(delay)?;
            }
            if let Some(speed) = typing_speed {
                controller.set_typing_speed(speed)?;
            }
            if let Some(enabled) = loop_enabled {
                controller.set_loop_enabled(enabled);
            }
            if let Some(key) = focus_key {
                controller.set_focus_key(&key)?;
            }
            print_settings(controller.settings());
        }
    }
    Ok(())
}

/// Positions on the command line are 1-based, like the `list` output.
fn index_of(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .context("positions start at 1")
}

fn print_settings(settings: &Settings) {
    println!("{}", "Settings".cyan().bold());
    println!("  Hotkey:        {}", settings.hotkey);
    println!("  Delay:         {}s", settings.delay);
    println!("  Typing speed:  {} chars/sec", settings.typing_speed);
    println!("  Loop:          {}", if settings.loop_enabled { "on" } else { "off" });
    println!("  Focus key:     {}", settings.focus_key);
    println!("{}", "Commands (executed bottom to top)".cyan().bold());
    if settings.commands.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (i, command) in settings.commands.iter().enumerate() {
        println!("  {:>3}. {command}", i + 1);
    }
}

async fn run_daemon(
    controller: Controller,
    mut events: mpsc::UnboundedReceiver<RunEvent>,
    mut requests: mpsc::UnboundedReceiver<ControlRequest>,
    requests_tx: mpsc::UnboundedSender<ControlRequest>,
) -> Result<()> {
    let registry = HotkeyManager::new()?;
    let mut controller = controller.with_registry(Box::new(registry));
    controller.bind_hotkey()?;

    println!(
        "{} press {} to start or stop; type {} + Enter to pause/resume, {} + Enter to quit",
        "Command runner ready:".green().bold(),
        controller.settings().hotkey.yellow().bold(),
        "p".yellow(),
        "q".yellow(),
    );
    println!("{}", controller.status());

    spawn_console_reader(requests_tx)?;

    loop {
        tokio::select! {
            Some(request) = requests.recv() => match request {
                ControlRequest::Toggle => match controller.toggle() {
                    Ok(ToggleOutcome::Started) => println!("{}", controller.status().to_string().green()),
                    Ok(ToggleOutcome::Stopped) => println!("{}", controller.status().to_string().yellow()),
                    Err(e) => eprintln!("{} {e}", "Error:".red().bold()),
                },
                ControlRequest::TogglePause => match controller.toggle_pause() {
                    ExecutionState::Paused => println!("{}", "Paused (press p again to resume)".yellow()),
                    ExecutionState::Running => println!("{}", "Resumed".green()),
                    state => debug!(?state, "nothing to pause"),
                },
                ControlRequest::Quit => break,
            },
            Some(event) = events.recv() => {
                controller.handle_event(&event);
                println!("{}", controller.status());
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("failed to listen for Ctrl+C: {e}");
                }
                break;
            }
        }
    }

    controller.shutdown();
    println!("{}", "Settings saved, bye".dimmed());
    Ok(())
}

/// Read console commands on a detached thread so a pending stdin read never
/// holds up shutdown.
fn spawn_console_reader(requests: mpsc::UnboundedSender<ControlRequest>) -> Result<()> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || read_console(requests))?;
    Ok(())
}

fn read_console(requests: mpsc::UnboundedSender<ControlRequest>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let request = match line.trim() {
            "p" | "pause" => ControlRequest::TogglePause,
            "s" | "start" | "stop" => ControlRequest::Toggle,
            "q" | "quit" | "exit" => ControlRequest::Quit,
            "" => continue,
            other => {
                eprintln!("{} unknown input '{other}' (p, s or q)", "Hint:".yellow());
                continue;
            }
        };
        if requests.send(request).is_err() {
            break;
        }
    }
}
