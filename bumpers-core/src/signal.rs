//! Dispatch outcomes
//!
//! A failed validation ends in one of three shapes:
//!
//! ```text
//!   Ok(Verdict)               continue the turn (passed, logged, patched)
//!   Err(Interrupt::Raised)    recoverable error, the caller may catch it
//!   Err(Interrupt::Abort)     the run is over: Stop, or Restart with a payload
//! ```
//!
//! `Abort` is a separate variant rather than another error kind so that a
//! generic `?`/catch-all in agent code can match on it explicitly and never
//! swallow a halt by accident.

use std::fmt;

use thiserror::Error;

use crate::error::ValidationFailure;
use crate::rewind::RestartPayload;
use crate::types::CheckResult;

/// Result of a validation call that lets the turn continue
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Every check at the point passed
    Passed(Vec<CheckResult>),
    /// A `log` check failed; the failure was recorded only
    Logged(CheckResult),
    /// An `auto_correct` check failed; guidance was appended to the context
    Patched { result: CheckResult, guidance: String },
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed(_))
    }
}

/// Why a run was halted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    /// The failing check's strategy was `stop`
    Policy,
    /// More `auto_correct` failures than the per-run budget
    AutoCorrectExhausted { limit: u32 },
    /// More `self_correct` failures than the per-session budget
    SelfCorrectExhausted { limit: u32 },
    /// Guidance could not be generated or the run could not be rewound
    CorrectionFailed { reason: String },
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCause::Policy => write!(f, "stop policy"),
            StopCause::AutoCorrectExhausted { limit } => {
                write!(f, "auto-correct limit of {} reached", limit)
            }
            StopCause::SelfCorrectExhausted { limit } => {
                write!(f, "self-correct limit of {} reached", limit)
            }
            StopCause::CorrectionFailed { reason } => write!(f, "correction failed: {}", reason),
        }
    }
}

/// Terminal signal for the current run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbortSignal {
    /// Halt; the agent must not take further steps
    #[error("Run stopped ({cause}): {failure}")]
    Stop {
        cause: StopCause,
        failure: ValidationFailure,
    },
    /// Abandon this attempt and restart with the corrected input
    #[error("Run rewound for self-correction: {}", .0.failure)]
    Restart(RestartPayload),
}

/// Non-continuing outcome of a validation call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Interrupt {
    #[error(transparent)]
    Raised(ValidationFailure),
    #[error(transparent)]
    Abort(AbortSignal),
}

impl Interrupt {
    pub fn is_abort(&self) -> bool {
        matches!(self, Interrupt::Abort(_))
    }

    /// The validation failure behind this interrupt
    pub fn failure(&self) -> &ValidationFailure {
        match self {
            Interrupt::Raised(failure) => failure,
            Interrupt::Abort(AbortSignal::Stop { failure, .. }) => failure,
            Interrupt::Abort(AbortSignal::Restart(payload)) => &payload.failure,
        }
    }
}

impl From<AbortSignal> for Interrupt {
    fn from(signal: AbortSignal) -> Self {
        Interrupt::Abort(signal)
    }
}
