//! Error types for Bumpers Watch

use std::path::PathBuf;

use thiserror::Error;

pub type WatchResult<T> = Result<T, WatchError>;

#[derive(Error, Debug)]
pub enum WatchError {
    /// Missing path, or no `bumpers_*.jsonl` file in the watched directory
    #[error("No event log found at {}", .0.display())]
    NoEventLog(PathBuf),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Bumpers error: {0}")]
    Core(#[from] bumpers_core::BumpersError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Monitor task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WatchError {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            WatchError::NoEventLog(_) => 2,
            WatchError::Pattern(_) | WatchError::Core(_) => 3,
            _ => 1,
        }
    }
}
