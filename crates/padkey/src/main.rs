//! Binary entrypoint for padkey.
use std::{
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use keyinject::{KeyInjector, NullInjector, VirtualKeyboard};
use linux_keycode::Combo;
use padkey_engine::{Engine, EngineOptions, NoopTelemetry, TIMER_QUEUE_SIZE};
use telemetry::HttpTelemetry;
use tokio::{signal, sync::mpsc, time::sleep};
use tracing::{error, info, warn};

/// Default capacity of the MIDI event queue.
const DEFAULT_QUEUE_SIZE: usize = 64;

/// Time for the desktop to pick up a freshly registered virtual keyboard.
const DEVICE_SETTLE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(
    name = "padkey",
    about = "Turn MIDI drum pad hits into keyboard input",
    version
)]
/// Command-line interface for the `padkey` binary.
struct Cli {
    /// Optional subcommand.
    #[command(subcommand)]
    command: Option<Command>,

    /// MIDI input port to listen to (see --list)
    #[arg(long, default_value_t = 0)]
    port: usize,

    /// List the MIDI input ports and exit
    #[arg(long)]
    list: bool,

    /// Path to the configuration file; empty to start without bindings
    #[arg(long, value_name = "PATH", default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Overlay endpoint receiving key state; empty to disable
    #[arg(long, value_name = "URL", default_value = telemetry::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Log MIDI events that match no binding
    #[arg(long)]
    log_unhandled: bool,

    /// How many MIDI events may be queued
    #[arg(long, value_name = "N", default_value_t = DEFAULT_QUEUE_SIZE)]
    queue_size: usize,

    /// Logging controls
    #[command(flatten)]
    log: logging::LogArgs,
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Command {
    /// Load and validate the configuration then exit.
    Check {
        /// Path to the configuration file (defaults to --config)
        path: Option<PathBuf>,
    },
    /// Press a key combo through the virtual keyboard, for testing.
    Press {
        /// Keys to press together, separated by commas
        #[arg(long, default_value = "SPACE,A")]
        keys: String,

        /// Delay before pressing, after the device settles
        #[arg(long, value_name = "MS", default_value_t = 0)]
        delay_ms: u64,

        /// How long the keys stay down
        #[arg(long, value_name = "MS", default_value_t = 500)]
        hold_ms: u64,
    },
}

/// Print `msg` and exit with status 1.
fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

/// Load `path`, or an empty configuration for an empty path.
fn load_config(path: &Path) -> config::Config {
    if path.as_os_str().is_empty() {
        return config::Config::default();
    }
    match config::load_from_path(path) {
        Ok(cfg) => cfg,
        Err(e) => fail(&e.pretty()),
    }
}

/// `padkey check`: parse, register against a null injector, and report.
fn check(path: &Path) {
    let cfg = load_config(path);
    let mut engine = Engine::new(
        Arc::new(NullInjector),
        Arc::new(NoopTelemetry),
        EngineOptions::default(),
    );
    if let Err(e) = engine.apply_config(&cfg) {
        fail(&format!("{}: {e}", path.display()));
    }
    println!(
        "OK: {} bindings, {} handlers, {} key actions",
        cfg.bindings().count(),
        engine.handler_count(),
        engine.action_count()
    );
}

/// `--list`: print the MIDI input ports.
fn list_ports() {
    match midisource::list_ports() {
        Ok(ports) => {
            println!("device(s):");
            for p in ports {
                println!("{p}");
            }
        }
        Err(e) => fail(&e.to_string()),
    }
}

/// Register the virtual keyboard and wait for it to settle.
async fn open_keyboard() -> VirtualKeyboard {
    let keyboard = match VirtualKeyboard::new() {
        Ok(k) => k,
        Err(e) => fail(&e.to_string()),
    };
    sleep(DEVICE_SETTLE).await;
    keyboard
}

/// `padkey press`: press and release one combo.
async fn press(keys: &str, delay: Duration, hold: Duration) {
    let combo = match Combo::parse(keys) {
        Ok(c) => c,
        Err(e) => fail(&e.to_string()),
    };
    let keyboard = open_keyboard().await;
    sleep(delay).await;
    if let Err(e) = keyboard.press(combo.keys()) {
        fail(&e.to_string());
    }
    info!(keys = %combo, ?hold, "pressed");
    sleep(hold).await;
    if let Err(e) = keyboard.release(combo.keys()) {
        fail(&e.to_string());
    }
}

/// Default mode: MIDI in, keys out, until Ctrl-C.
async fn run(cli: &Cli) {
    let cfg = load_config(&cli.config);
    if cfg.is_empty() {
        warn!(path = %cli.config.display(), "config_empty");
    }

    let keyboard = open_keyboard().await;
    let telemetry = Arc::new(HttpTelemetry::spawn(Some(&cli.endpoint)));
    let mut engine = Engine::new(
        Arc::new(keyboard),
        telemetry.clone(),
        EngineOptions {
            log_unhandled: cli.log_unhandled,
            timer_queue_size: TIMER_QUEUE_SIZE,
        },
    );
    if let Err(e) = engine.apply_config(&cfg) {
        fail(&format!("{}: {e}", cli.config.display()));
    }

    let (tx, rx) = mpsc::channel(cli.queue_size.max(1));
    let mut listener = match midisource::listen(cli.port, tx) {
        Ok(l) => l,
        Err(e) => fail(&e.to_string()),
    };
    let engine_task = tokio::spawn(engine.run(rx));

    info!(port = listener.name(), "listening");
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "signal_handler_failed");
    }
    info!("exiting");

    // Closing the port drops the event sender, which stops the engine.
    listener.close();
    if let Err(e) = engine_task.await {
        error!(error = %e, "engine_task_failed");
    }
    telemetry.close().await;
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log);

    if cli.list {
        list_ports();
        return;
    }

    match &cli.command {
        Some(Command::Check { path }) => check(path.as_deref().unwrap_or(&cli.config)),
        Some(Command::Press {
            keys,
            delay_ms,
            hold_ms,
        }) => {
            press(
                keys,
                Duration::from_millis(*delay_ms),
                Duration::from_millis(*hold_ms),
            )
            .await;
        }
        None => run(&cli).await,
    }
}
