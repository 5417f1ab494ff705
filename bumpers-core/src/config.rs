//! Configuration for Bumpers
//!
//! Loaded from JSON; every field has a default so a partial file (or none)
//! is valid. Environment variables override file values:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BUMPERS_MAX_AUTO_CORRECT` | `enforcement.max_auto_correct` |
//! | `BUMPERS_MAX_SELF_CORRECT` | `enforcement.max_self_correct` |
//! | `BUMPERS_CHECK_INTERVAL_SECS` | `monitor.check_interval_secs` |
//! | `BUMPERS_LOOKBACK_SECS` | `monitor.lookback_secs` |
//! | `BUMPERS_EVENT_LOG` | `event_log.path` (and selects the file backend) |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BumpersError, Result};
use crate::log::{EventLog, FileEventLog, InMemoryEventLog, NullEventLog};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BumpersConfig {
    #[serde(default)]
    pub enforcement: EnforcementConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub event_log: EventLogConfig,
}

impl BumpersConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| BumpersError::IoError {
            message: format!("Failed to read config '{}': {}", path.display(), e),
        })?;
        Self::from_json_str(&json)
    }

    /// Apply `BUMPERS_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BUMPERS_MAX_AUTO_CORRECT") {
            self.enforcement.max_auto_correct = parse_var("BUMPERS_MAX_AUTO_CORRECT", &v)?;
        }
        if let Some(v) = lookup("BUMPERS_MAX_SELF_CORRECT") {
            self.enforcement.max_self_correct = parse_var("BUMPERS_MAX_SELF_CORRECT", &v)?;
        }
        if let Some(v) = lookup("BUMPERS_CHECK_INTERVAL_SECS") {
            self.monitor.check_interval_secs = parse_var("BUMPERS_CHECK_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("BUMPERS_LOOKBACK_SECS") {
            self.monitor.lookback_secs = parse_var("BUMPERS_LOOKBACK_SECS", &v)?;
        }
        if let Some(v) = lookup("BUMPERS_EVENT_LOG") {
            self.event_log.backend = EventLogBackend::File;
            self.event_log.path = Some(PathBuf::from(v));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        self.event_log.validate()
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        BumpersError::config(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}

/// Correction budgets and guidance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Auto-corrections allowed per run before escalating to stop
    #[serde(default = "default_max_auto_correct")]
    pub max_auto_correct: u32,

    /// Self-corrections allowed per session before escalating to stop
    #[serde(default = "default_max_self_correct")]
    pub max_self_correct: u32,

    /// Guidance template with `{reason}` and `{prior}` placeholders
    #[serde(default)]
    pub correction_template: Option<String>,
}

fn default_max_auto_correct() -> u32 { 3 }
fn default_max_self_correct() -> u32 { 1 }

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            max_auto_correct: default_max_auto_correct(),
            max_self_correct: default_max_self_correct(),
            correction_template: None,
        }
    }
}

impl EnforcementConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_auto_correct(mut self, max: u32) -> Self {
        self.max_auto_correct = max;
        self
    }

    pub fn max_self_correct(mut self, max: u32) -> Self {
        self.max_self_correct = max;
        self
    }

    pub fn correction_template(mut self, template: impl Into<String>) -> Self {
        self.correction_template = Some(template.into());
        self
    }
}

/// Monitor schedule and standard alert conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between ticks
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// How far back each tick queries the event log
    #[serde(default = "default_lookback")]
    pub lookback_secs: u64,

    /// Enables `high_failure_rate` with this threshold (0.0 - 1.0)
    #[serde(default)]
    pub failure_rate_threshold: Option<f64>,

    /// Window for `high_failure_rate`
    #[serde(default = "default_failure_rate_window")]
    pub failure_rate_window_secs: u64,

    /// One `repeated_block` condition per entry
    #[serde(default)]
    pub repeated_blocks: Vec<RepeatedBlockConfig>,
}

fn default_check_interval() -> u64 { 60 }
fn default_lookback() -> u64 { 3600 }
fn default_failure_rate_window() -> u64 { 900 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            lookback_secs: default_lookback(),
            failure_rate_threshold: None,
            failure_rate_window_secs: default_failure_rate_window(),
            repeated_blocks: Vec::new(),
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    pub fn lookback_secs(mut self, secs: u64) -> Self {
        self.lookback_secs = secs;
        self
    }

    pub fn failure_rate(mut self, threshold: f64, window_secs: u64) -> Self {
        self.failure_rate_threshold = Some(threshold);
        self.failure_rate_window_secs = window_secs;
        self
    }

    pub fn repeated_block(mut self, action: impl Into<String>, count: usize, window_secs: u64) -> Self {
        self.repeated_blocks.push(RepeatedBlockConfig {
            action: action.into(),
            count,
            window_secs,
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval_secs == 0 {
            return Err(BumpersError::config("monitor.check_interval_secs must be positive"));
        }
        if self.lookback_secs == 0 {
            return Err(BumpersError::config("monitor.lookback_secs must be positive"));
        }
        if let Some(threshold) = self.failure_rate_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(BumpersError::config(format!(
                    "monitor.failure_rate_threshold must be between 0 and 1, got {}",
                    threshold
                )));
            }
            if self.failure_rate_window_secs == 0 {
                return Err(BumpersError::config(
                    "monitor.failure_rate_window_secs must be positive",
                ));
            }
        }
        for block in &self.repeated_blocks {
            if block.count == 0 || block.window_secs == 0 {
                return Err(BumpersError::config(format!(
                    "repeated_block for '{}' needs a positive count and window",
                    block.action
                )));
            }
        }
        Ok(())
    }
}

/// `repeated_block(action, count, window)` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedBlockConfig {
    pub action: String,
    pub count: usize,
    #[serde(default = "default_failure_rate_window")]
    pub window_secs: u64,
}

/// Which event log backend to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLogBackend {
    #[default]
    Memory,
    File,
    Null,
}

/// Event log settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogConfig {
    #[serde(default)]
    pub backend: EventLogBackend,

    /// Log file for the file backend
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Directory for a timestamped log file when `path` is unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl EventLogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == EventLogBackend::File && self.path.is_none() && self.directory.is_none() {
            return Err(BumpersError::config(
                "event_log.backend = \"file\" requires event_log.path or event_log.directory",
            ));
        }
        Ok(())
    }

    /// Build the configured backend
    pub fn build(&self) -> Result<Arc<dyn EventLog>> {
        let log: Arc<dyn EventLog> = match self.backend {
            EventLogBackend::Memory => Arc::new(InMemoryEventLog::new()),
            EventLogBackend::Null => Arc::new(NullEventLog),
            EventLogBackend::File => match (&self.path, &self.directory) {
                (Some(path), _) => Arc::new(FileEventLog::new(path)?),
                (None, Some(dir)) => Arc::new(FileEventLog::in_directory(dir)?),
                (None, None) => {
                    return Err(BumpersError::config(
                        "event_log.backend = \"file\" requires event_log.path or event_log.directory",
                    ))
                }
            },
        };
        tracing::info!(backend = log.name(), "Event log ready");
        Ok(log)
    }
}
