//! Configuration loading.
//!
//! Every key is optional; missing keys fall back to built-in defaults.
//!
//! ```yaml
//! window:
//!   start: "08:00"
//!   end: "22:00"
//! continuous_horizon_days: 22250
//! data_file: "/home/me/.intake.json"
//! poll_interval_secs: 60
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ScheduleError;
use crate::schedule::{ActiveWindow, ScheduleGenerator, DEFAULT_CONTINUOUS_HORIZON_DAYS};
use crate::time::parse_clock_time;

/// Seconds between reminder daemon polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

// ── YAML layout ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    window: WindowEntry,
    continuous_horizon_days: Option<u32>,
    data_file: Option<PathBuf>,
    poll_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WindowEntry {
    start: Option<String>,
    end: Option<String>,
}

// ── Public configuration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub window: ActiveWindow,
    /// Days generated for medications without a duration.
    pub continuous_horizon_days: u32,
    pub data_file: PathBuf,
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: ActiveWindow::default(),
            continuous_horizon_days: DEFAULT_CONTINUOUS_HORIZON_DAYS,
            data_file: default_data_file(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the per-user config file
    /// is read when present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse the YAML file at `path`.
    ///
    /// # Errors
    /// Unreadable file, malformed YAML, a window that is not whole hours with
    /// `start < end`, or a zero horizon / poll interval.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        Self::from_file(file).with_context(|| format!("Invalid configuration: {}", path.display()))
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let window = match (file.window.start, file.window.end) {
            (None, None) => defaults.window,
            (start, end) => {
                let start = start.unwrap_or_else(|| format!("{:02}:00", defaults.window.start_hour()));
                let end = end.unwrap_or_else(|| format!("{:02}:00", defaults.window.end_hour()));
                parse_window(&start, &end)?
            }
        };

        let continuous_horizon_days = file
            .continuous_horizon_days
            .unwrap_or(defaults.continuous_horizon_days);
        if continuous_horizon_days == 0 {
            bail!("continuous_horizon_days must be at least 1");
        }

        let poll_interval_secs = file.poll_interval_secs.unwrap_or(defaults.poll_interval_secs);
        if poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }

        let config = Self {
            window,
            continuous_horizon_days,
            data_file: file.data_file.unwrap_or(defaults.data_file),
            poll_interval_secs,
        };

        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Build a generator using this window and horizon.
    pub fn generator(&self) -> ScheduleGenerator {
        ScheduleGenerator::new(self.window, self.continuous_horizon_days)
    }
}

/// Parse window bounds such as `"08:00"` / `"22:00"` or `"morning"` / `"late"`.
pub fn parse_window(start: &str, end: &str) -> Result<ActiveWindow, ScheduleError> {
    let invalid = || ScheduleError::InvalidWindow {
        start: start.to_string(),
        end: end.to_string(),
    };

    let (start_hour, start_minute) = parse_clock_time(start).ok_or_else(invalid)?;
    let (end_hour, end_minute) = parse_clock_time(end).ok_or_else(invalid)?;
    if start_minute != 0 || end_minute != 0 {
        return Err(invalid());
    }

    ActiveWindow::new(start_hour, end_hour).ok_or_else(invalid)
}

/// `<config_dir>/intake/config.yaml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("intake").join("config.yaml"))
}

/// Returns the path to the patient store file.
///
/// Uses the `dirs` crate to locate the home directory across platforms.
/// Falls back to `./.intake.json` if no home directory is found.
pub fn default_data_file() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".intake.json")
}
