//! # Bumpers Core - Guardrails for agent loops
//!
//! Bumpers sits between an LLM agent's reasoning loop and the actions it
//! takes. At each validation point the agent runtime asks the engine to
//! run the checks registered there:
//!
//! - **pre_action**: before a tool call executes
//! - **post_action**: after a tool call returns
//! - **pre_output**: before the final answer is returned
//! - **post_output**: after the final answer is returned
//!
//! The first failing check decides what happens next through its fail
//! strategy: `stop` aborts the run, `raise` surfaces the failure to the
//! caller, `log` records it and continues, `auto_correct` patches the
//! step with guidance and continues, and `self_correct` rewinds the run
//! to its last safe checkpoint and restarts it with corrective guidance.
//!
//! Every result and intervention is appended to an event log, which a
//! [`monitor::Monitor`] can watch for alert conditions.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bumpers_core::checks::ActionWhitelist;
//! use bumpers_core::log::InMemoryEventLog;
//! use bumpers_core::{
//!     drive, FailStrategy, Interrupt, RunReport, Session, ValidationContext, ValidationPoint,
//! };
//!
//! let log = Arc::new(InMemoryEventLog::new());
//! let mut session = Session::new(log.clone());
//! session.register(
//!     ActionWhitelist::new(["search", "summarize"]).with_fail_strategy(FailStrategy::SelfCorrect),
//!     ValidationPoint::PreAction,
//! );
//!
//! // Tries to delete first, then follows the guidance it was given
//! let mut agent = |input: &str, guard: &mut Session| -> Result<String, Interrupt> {
//!     let action = if input.contains("Original request") { "search" } else { "delete" };
//!     let mut step = ValidationContext::new()
//!         .with("question", input)
//!         .with("action", action);
//!     guard.validate(ValidationPoint::PreAction, &mut step)?;
//!     Ok(format!("ran {}", action))
//! };
//!
//! let report = drive(&mut session, &mut agent, "Tidy my inbox").unwrap();
//! assert!(report.is_completed());
//! assert_eq!(report.attempts(), 2);
//! assert!(!log.is_empty());
//! ```

pub mod check;
pub mod checks;
pub mod config;
pub mod correction;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod error;
pub mod log;
pub mod monitor;
pub mod rewind;
pub mod session;
pub mod signal;
pub mod timing;
pub mod types;

// Re-export main types
pub use check::{Check, Evaluation, FnCheck};
pub use config::{BumpersConfig, EnforcementConfig, EventLogBackend, EventLogConfig, MonitorConfig};
pub use correction::{CorrectionGenerator, TemplateCorrection, DEFAULT_CORRECTION_TEMPLATE};
pub use dispatch::Dispatcher;
pub use driver::{drive, Agent, DriveError, RunReport};
pub use engine::{EventRecorder, ValidationEngine};
pub use error::{
    BumpersError, CheckExecutionError, CorrectionError, ErrorCategory, Result, ValidationFailure,
};
pub use log::{
    Event, EventKind, EventLog, EventQuery, EventStatus, FileEventLog, InMemoryEventLog,
    InterventionType, NullEventLog,
};
pub use monitor::{
    Alert, AlertCondition, AlertHandler, EventWindow, Monitor, MonitorHandle, TracingAlertHandler,
};
pub use rewind::{Checkpoint, CheckpointArena, RestartPayload, RunState, RunTracker};
pub use session::Session;
pub use signal::{AbortSignal, Interrupt, StopCause, Verdict};
pub use timing::{Clock, ManualClock, SystemClock};
pub use types::{CheckResult, FailStrategy, ValidationContext, ValidationPoint};
