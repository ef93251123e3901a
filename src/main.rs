//! auto-unpack command line entry point

use auto_unpack::{Config, Event, FolderWatcher, PasswordList, run_with_shutdown};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "auto-unpack")]
#[command(about = "Watch a download folder and unpack finished archives")]
#[command(version)]
struct Cli {
    /// TOML configuration file; command line flags override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory to watch for archives
    #[arg(long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Directory receiving the extracted archives
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Comma-separated passwords to try on encrypted archives
    #[arg(long, value_name = "LIST")]
    default_passwords: Option<String>,

    /// File with one password per line, tried after the other passwords
    #[arg(long, value_name = "PATH")]
    password_file: Option<PathBuf>,

    /// Wait before the first readiness check of a new file, in milliseconds
    #[arg(long, value_name = "MS")]
    grace_period_ms: Option<u64>,
}

impl Cli {
    /// Load the config file (or defaults) and apply command line overrides
    fn into_config(self) -> auto_unpack::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(input_dir) = self.input_dir {
            config.input_dir = input_dir;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(list) = self.default_passwords {
            config.passwords = PasswordList::parse_list(&list)
                .iter()
                .map(str::to_string)
                .collect();
        }
        if let Some(password_file) = self.password_file {
            config.password_file = Some(password_file);
        }
        if let Some(ms) = self.grace_period_ms {
            config.readiness.grace_period = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir.map(open_log_file) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Some(Err(e)) => {
            eprintln!("auto-unpack: cannot open log directory, logging to stderr only: {e}");
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn open_log_file(
    dir: &Path,
) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("auto-unpack")
        .filename_suffix("log")
        .build(dir)
}

/// Log every pipeline event as one JSON line
fn spawn_event_logger(mut events: broadcast::Receiver<Event>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(target: "auto_unpack::events", "{}", json),
                    Err(e) => warn!(error = %e, "failed to serialize event"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagging behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_level, cli.log_dir.as_deref());

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        input_dir = ?config.input_dir,
        output_dir = ?config.output_dir,
        grace_period_ms = config.readiness.grace_period.as_millis() as u64,
        check_interval_ms = config.parking.check_interval.as_millis() as u64,
        "starting auto-unpack"
    );

    let passwords =
        PasswordList::collect(&config.passwords, config.password_file.as_deref()).await;

    let mut watcher = match FolderWatcher::new(config, passwords) {
        Ok(watcher) => watcher,
        Err(e) => {
            error!(error = %e, "failed to initialise folder watcher");
            return ExitCode::FAILURE;
        }
    };

    spawn_event_logger(watcher.subscribe());

    if let Err(e) = watcher.start() {
        error!(error = %e, "failed to start folder watcher");
        return ExitCode::FAILURE;
    }

    run_with_shutdown(watcher).await;
    ExitCode::SUCCESS
}
