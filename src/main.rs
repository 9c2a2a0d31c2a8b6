//! sway-freezer - version 0.1.0
//!
//! Suspends unfocused sway applications with tracing logging.
//! This is the main entry point that resolves configuration and runs the event loop.

mod cli;
mod config;
mod daemon;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use cli::{Args, LogLevel};
use config::{resolve_config, show_config, validate_effective_config, NoAppsError};
use sway_freezer::ipc::IpcError;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(level: LogLevel) {
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", level);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.show_config {
        return show_config(&config, args.config_format);
    }

    if let Err(e) = validate_effective_config(&config) {
        if e.is::<NoAppsError>() {
            eprintln!("{}", Args::command().render_usage());
        } else {
            eprintln!("❌ Configuration invalid: {}", e);
        }
        std::process::exit(1);
    }

    setup_logging(config.log_level);
    if let Some(path) = &args.config {
        info!("Loaded configuration from: {}", path.display());
    }

    let socket = args.socket.clone().ok_or(IpcError::SocketPathMissing)?;
    daemon::run(&config, &socket).await
}
