//! Error types for Bumpers operations
//!
//! This module separates three kinds of failure:
//! - [`BumpersError`]: configuration, state-machine and storage problems
//!   surfaced to the caller as ordinary `Result` errors
//! - [`CheckExecutionError`]: a check could not evaluate its input; the engine
//!   converts it into a failed result and never propagates it
//! - [`ValidationFailure`]: a check evaluated and rejected the context
//!
//! Control-flow signals (halt, restart) live in [`crate::signal`] so they can
//! never be confused with the errors defined here.
//!
//! # Error Codes
//!
//! Each [`BumpersError`] variant has a stable error code (e.g. `NO_ACTIVE_RUN`)
//! suitable for log aggregation and programmatic handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rewind::RunState;
use crate::types::{CheckResult, FailStrategy, ValidationPoint};

/// Result type alias for Bumpers operations
pub type Result<T> = std::result::Result<T, BumpersError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Engine, check or monitor was configured with invalid values
    Configuration,
    /// Operation is not valid in the current run state
    State,
    /// Event log backend failure
    Storage,
    /// Correction generation failed
    Correction,
    /// Internal error that shouldn't happen
    Internal,
}

/// Errors that can occur in Bumpers operations
#[derive(Error, Debug)]
pub enum BumpersError {
    // ═══════════════════════════════════════════════════════════════════════
    // Configuration errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Validation point name is not one of the four known points
    #[error("Unknown validation point: '{name}'. Expected one of pre_action, post_action, pre_output, post_output.")]
    UnknownValidationPoint { name: String },

    /// A configuration value is out of range or inconsistent
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A pattern check was given a regular expression that does not compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Run state errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The run state machine does not allow this transition
    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },

    /// An operation needed a started run
    #[error("No active run. Call start_run() before validating.")]
    NoActiveRun,

    // ═══════════════════════════════════════════════════════════════════════
    // Correction errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The correction generator could not produce guidance
    #[error("Correction generation failed: {0}")]
    Correction(#[from] CorrectionError),

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors (serialization, storage, I/O)
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Event log lock is poisoned (panic occurred while holding lock)
    #[error("Event log lock poisoned. This is a bug; please report it.")]
    StorageLocked,

    /// I/O operation failed
    #[error("IO error: {message}")]
    IoError { message: String },

    /// Internal error that shouldn't happen
    #[error("Internal error: {reason}. This is a bug; please report it.")]
    InternalError { reason: String },
}

impl BumpersError {
    /// Shorthand for [`BumpersError::InvalidConfiguration`]
    pub fn config(reason: impl Into<String>) -> Self {
        BumpersError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Returns true if this error might succeed on retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BumpersError::StorageLocked | BumpersError::IoError { .. } | BumpersError::Correction(_)
        )
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            BumpersError::UnknownValidationPoint { .. }
            | BumpersError::InvalidConfiguration { .. }
            | BumpersError::InvalidPattern { .. } => ErrorCategory::Configuration,

            BumpersError::InvalidTransition { .. } | BumpersError::NoActiveRun => {
                ErrorCategory::State
            }

            BumpersError::Correction(_) => ErrorCategory::Correction,

            BumpersError::JsonError(_)
            | BumpersError::StorageLocked
            | BumpersError::IoError { .. } => ErrorCategory::Storage,

            BumpersError::InternalError { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            BumpersError::UnknownValidationPoint { .. } => "UNKNOWN_VALIDATION_POINT",
            BumpersError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            BumpersError::InvalidPattern { .. } => "INVALID_PATTERN",
            BumpersError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BumpersError::NoActiveRun => "NO_ACTIVE_RUN",
            BumpersError::Correction(_) => "CORRECTION_FAILED",
            BumpersError::JsonError(_) => "JSON_ERROR",
            BumpersError::StorageLocked => "STORAGE_LOCKED",
            BumpersError::IoError { .. } => "IO_ERROR",
            BumpersError::InternalError { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for BumpersError {
    fn from(err: std::io::Error) -> Self {
        BumpersError::IoError {
            message: err.to_string(),
        }
    }
}

/// Raised by a check that could not evaluate its input
///
/// The engine turns this into a failed [`CheckResult`] governed by the
/// check's own fail strategy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CheckExecutionError {
    pub message: String,
}

impl CheckExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Raised by a correction generator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CorrectionError {
    pub message: String,
}

impl CorrectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A check rejected the context at a validation point
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Check '{}' failed at {}: {}", .result.check_name, .result.point, .result.message)]
pub struct ValidationFailure {
    result: CheckResult,
}

impl ValidationFailure {
    pub fn new(result: CheckResult) -> Self {
        Self { result }
    }

    /// The failing result, including the context it saw
    pub fn result(&self) -> &CheckResult {
        &self.result
    }

    pub fn check_name(&self) -> &str {
        &self.result.check_name
    }

    pub fn message(&self) -> &str {
        &self.result.message
    }

    pub fn point(&self) -> ValidationPoint {
        self.result.point
    }

    pub fn fail_strategy(&self) -> FailStrategy {
        self.result.fail_strategy
    }

    pub fn into_result(self) -> CheckResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationContext;

    #[test]
    fn test_error_is_recoverable() {
        assert!(BumpersError::StorageLocked.is_recoverable());
        assert!(BumpersError::IoError {
            message: "disk full".to_string()
        }
        .is_recoverable());
        assert!(!BumpersError::NoActiveRun.is_recoverable());
        assert!(!BumpersError::config("zero interval").is_recoverable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BumpersError::UnknownValidationPoint {
                name: "mid_action".to_string()
            }
            .error_code(),
            "UNKNOWN_VALIDATION_POINT"
        );
        assert_eq!(BumpersError::NoActiveRun.error_code(), "NO_ACTIVE_RUN");
        assert_eq!(
            BumpersError::from(CorrectionError::new("model offline")).error_code(),
            "CORRECTION_FAILED"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            BumpersError::InvalidPattern {
                pattern: "(".to_string(),
                reason: "unclosed group".to_string()
            }
            .category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            BumpersError::InvalidTransition {
                from: RunState::Completed,
                to: RunState::Running
            }
            .category(),
            ErrorCategory::State
        );
        assert_eq!(BumpersError::StorageLocked.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: BumpersError = io.into();
        assert!(matches!(err, BumpersError::IoError { .. }));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_validation_failure_names_check() {
        let result = CheckResult::new(
            false,
            "Action 'delete' is not allowed",
            "action_whitelist",
            ValidationPoint::PreAction,
            ValidationContext::new(),
            FailStrategy::Raise,
        );
        let failure = ValidationFailure::new(result);

        assert_eq!(failure.check_name(), "action_whitelist");
        assert_eq!(failure.fail_strategy(), FailStrategy::Raise);
        let text = failure.to_string();
        assert!(text.contains("action_whitelist"));
        assert!(text.contains("pre_action"));
        assert!(text.contains("delete"));
    }
}
