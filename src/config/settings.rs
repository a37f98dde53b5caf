//! Render loop and logging settings
//!
//! Both sections are optional in the config file; missing fields fall back to
//! the defaults below.
//!
//! # Main Types
//!
//! - [`RenderSettings`] - Refresh rate, worker queue size and shutdown grace period
//! - [`LogSettings`] - Log level, directory and sinks

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default worker refresh rate in Hz
pub const DEFAULT_REFRESH_RATE_HZ: u32 = 40;

/// Default capacity of the snapshot channel
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Default time the worker gets to exit after a stop request
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

/// Fraction of the cycle period a universe must wait between two pushes
pub const THROTTLE_RATIO: f64 = 0.9;

/// Render worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Target worker refresh rate in Hz
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate_hz: u32,

    /// Capacity of the snapshot channel between ingest and worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Grace period given to the worker on shutdown, in milliseconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_refresh_rate() -> u32 {
    DEFAULT_REFRESH_RATE_HZ
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_shutdown_grace() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            refresh_rate_hz: DEFAULT_REFRESH_RATE_HZ,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl RenderSettings {
    /// Time budget of one render cycle (1 / refresh rate)
    pub fn cycle_budget(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.refresh_rate_hz.max(1) as u64)
    }

    /// Minimum time between two pushes of the same universe
    pub fn throttle_interval(&self) -> Duration {
        self.cycle_budget().mul_f64(THROTTLE_RATIO)
    }

    /// Shutdown grace period as a duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory holding `main.log` and `worker.log`
    #[serde(default = "super::default_log_dir")]
    pub directory: PathBuf,

    /// Log to stderr
    #[serde(default = "default_true")]
    pub console_output: bool,

    /// Log to a file in `directory`
    #[serde(default = "default_true")]
    pub file_output: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: super::default_log_dir(),
            console_output: true,
            file_output: true,
        }
    }
}

impl LogSettings {
    /// Settings writing only to a file in `directory`
    pub fn file_only(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            console_output: false,
            ..Self::default()
        }
    }
}
