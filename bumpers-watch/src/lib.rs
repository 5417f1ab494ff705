//! Bumpers Watch Library
//!
//! Pieces of the `bumpers-watch` binary that do not need a terminal:
//! locating the event log to watch and folding command-line options into
//! a [`MonitorConfig`].

pub mod error;

use std::path::{Path, PathBuf};

use bumpers_core::MonitorConfig;

pub use error::{WatchError, WatchResult};

/// File name pattern written by `FileEventLog::in_directory`
pub const LOG_FILE_PATTERN: &str = "bumpers_*.jsonl";

/// Resolve the log to watch
///
/// An existing file is used as is. A directory resolves to its newest
/// `bumpers_*.jsonl`; the timestamped names sort chronologically. A
/// missing path is an error, nothing is created.
pub fn resolve_event_log(path: &Path) -> WatchResult<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(WatchError::NoEventLog(path.to_path_buf()));
    }

    let pattern = path.join(LOG_FILE_PATTERN);
    let mut candidates: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable log entry");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();

    candidates
        .pop()
        .ok_or_else(|| WatchError::NoEventLog(path.to_path_buf()))
}

/// Command-line overrides for the monitor section of the config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorOverrides {
    pub interval_secs: Option<u64>,
    pub lookback_secs: Option<u64>,
    pub failure_threshold: Option<f64>,
    pub window_secs: Option<u64>,
    pub watched_actions: Vec<String>,
    pub block_count: usize,
}

impl MonitorOverrides {
    /// Apply to `config`; a watched action replaces a configured one with the same name
    pub fn apply(&self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(secs) = self.interval_secs {
            config.check_interval_secs = secs;
        }
        if let Some(secs) = self.lookback_secs {
            config.lookback_secs = secs;
        }

        let window = self.window_secs.unwrap_or(config.failure_rate_window_secs);
        if let Some(threshold) = self.failure_threshold {
            config = config.failure_rate(threshold, window);
        } else if self.window_secs.is_some() {
            config.failure_rate_window_secs = window;
        }

        for action in &self.watched_actions {
            config.repeated_blocks.retain(|b| &b.action != action);
            config = config.repeated_block(action.clone(), self.block_count, window);
        }
        config
    }
}
