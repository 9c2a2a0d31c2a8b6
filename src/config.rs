//! Configuration management for sway-freezer.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Args, ConfigFormat, LogLevel};
use sway_freezer::arena::REGION_DEFAULT_CAPACITY;
use sway_freezer::process::{HarvestConfig, DEFAULT_BATCH_UNITS, STATUS_READ_BYTES};

// Default configuration constants
pub const DEFAULT_DELAY_SECONDS: u64 = 2;
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const MIN_STATUS_READ_BYTES: usize = 64;

/// Raised when no application was named anywhere; the binary prints usage.
#[derive(Debug, thiserror::Error)]
#[error("no application identifiers given")]
pub struct NoAppsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application identifiers to track
    pub apps: Vec<String>,

    /// Debounce delay before an unfocused application is suspended
    #[serde(alias = "delay-seconds")]
    pub delay_seconds: u64,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: LogLevel,

    // Harvester tuning
    #[serde(alias = "proc-root")]
    pub proc_root: PathBuf,
    #[serde(alias = "status-read-bytes")]
    pub status_read_bytes: usize,
    #[serde(alias = "batch-units")]
    pub batch_units: usize,
    #[serde(alias = "arena-region-kb")]
    pub arena_region_kb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            delay_seconds: DEFAULT_DELAY_SECONDS,
            log_level: LogLevel::Info,
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            status_read_bytes: STATUS_READ_BYTES,
            batch_units: DEFAULT_BATCH_UNITS,
            arena_region_kb: REGION_DEFAULT_CAPACITY * std::mem::size_of::<usize>() / 1024,
        }
    }
}

impl Config {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            proc_root: self.proc_root.clone(),
            status_read_bytes: self.status_read_bytes,
            batch_units: self.batch_units,
            arena_region_bytes: self.arena_region_kb.max(1) * 1024,
        }
    }
}

/// Validate effective config (used at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if cfg.delay_seconds == 0 {
        bail!("delay_seconds must be greater than 0");
    }
    if cfg.status_read_bytes < MIN_STATUS_READ_BYTES {
        bail!(
            "status_read_bytes must be at least {} (got {})",
            MIN_STATUS_READ_BYTES,
            cfg.status_read_bytes
        );
    }
    if cfg.batch_units == 0 {
        bail!("batch_units must be greater than 0");
    }
    if cfg.apps.iter().any(|a| a.trim().is_empty()) {
        bail!("application identifiers must not be empty");
    }
    if cfg.apps.is_empty() {
        return Err(NoAppsError.into());
    }
    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    if !args.app_ids.is_empty() {
        config.apps = args.app_ids.clone();
    }
    if let Some(delay) = args.delay {
        config.delay_seconds = delay;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    Ok(config)
}

/// Loads a config file, picking the format from its extension (YAML by default).
pub fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?;
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?;
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?;
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<()> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}
