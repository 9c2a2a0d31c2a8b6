//! CLI arguments for sway-freezer.
//!
//! This module defines the command-line interface structure using the clap library.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "sway-freezer",
    about = "Suspend unfocused sway applications and resume them on focus",
    long_about = "Suspend unfocused sway applications and resume them on focus.\n\n\
                  Every listed application is stopped with SIGSTOP, together with every \
                  process it spawned, once it has stayed unfocused for the debounce delay. \
                  Focusing one of its windows sends SIGCONT to the same process tree.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// Application identifiers to track (Wayland app_id or X11 class)
    #[arg(value_name = "APP_ID")]
    pub app_ids: Vec<String>,

    /// Seconds an application must stay unfocused before it is suspended
    #[arg(short = 'd', long)]
    pub delay: Option<u64>,

    /// Compositor IPC socket
    #[arg(long, env = "SWAYSOCK", hide_env_values = true)]
    pub socket: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,
}
