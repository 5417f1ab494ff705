//! Validation engine
//!
//! Runs the checks registered at a validation point, in registration
//! order, and stops at the first failure.
//!
//! ```text
//!   validate(point, ctx)
//!     │
//!     ├─► check 1 ── pass ──► validation event
//!     ├─► check 2 ── fail ──► validation event
//!     │                       intervention event (block_action | check_error)
//!     │                       return Err(ValidationFailure)
//!     └─► check 3            (not run)
//! ```
//!
//! A check that returns an error or panics is converted into a failed
//! result carrying that check's own fail strategy. Every result is logged
//! before the caller sees it, so dispatch never races the log.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use uuid::Uuid;

use crate::check::{Check, Evaluation};
use crate::error::ValidationFailure;
use crate::log::{Event, EventLog, InterventionType};
use crate::types::{CheckResult, ValidationContext, ValidationPoint};

/// Appends events to the shared log, stamped with session and run IDs
///
/// Append failures are reported and counted but never abort enforcement.
pub struct EventRecorder {
    log: Arc<dyn EventLog>,
    session_id: String,
    run_id: Option<String>,
    failures: usize,
}

impl EventRecorder {
    pub fn new(log: Arc<dyn EventLog>, session_id: impl Into<String>) -> Self {
        Self {
            log,
            session_id: session_id.into(),
            run_id: None,
            failures: 0,
        }
    }

    pub fn record(&mut self, event: Event) {
        let event = event.with_session(self.session_id.clone(), self.run_id.clone());
        if let Err(e) = self.log.append(&event) {
            self.failures += 1;
            tracing::error!(
                backend = self.log.name(),
                error = %e,
                check = %event.check_name,
                "Failed to append event"
            );
        }
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn set_session_id(&mut self, session_id: String) {
        self.session_id = session_id;
    }

    pub(crate) fn set_run_id(&mut self, run_id: Option<String>) {
        self.run_id = run_id;
    }

    /// Number of events that could not be appended
    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("backend", &self.log.name())
            .field("session_id", &self.session_id)
            .field("run_id", &self.run_id)
            .field("failures", &self.failures)
            .finish()
    }
}

/// Ordered per-point check registry plus the event recorder
pub struct ValidationEngine {
    checks: [Vec<Box<dyn Check>>; 4],
    recorder: EventRecorder,
}

impl ValidationEngine {
    /// Create an engine with a fresh session ID
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self::with_session_id(log, Uuid::new_v4().to_string())
    }

    pub fn with_session_id(log: Arc<dyn EventLog>, session_id: impl Into<String>) -> Self {
        Self {
            checks: Default::default(),
            recorder: EventRecorder::new(log, session_id),
        }
    }

    /// Append a check to the point's list
    ///
    /// Names need not be unique; results are reported per registration.
    pub fn register<C: Check + 'static>(&mut self, check: C, point: ValidationPoint) -> &mut Self {
        self.register_boxed(Box::new(check), point)
    }

    pub fn register_boxed(&mut self, check: Box<dyn Check>, point: ValidationPoint) -> &mut Self {
        tracing::debug!(check = check.name(), point = %point, "Registered check");
        self.checks[point.index()].push(check);
        self
    }

    /// Names of the checks at `point`, in execution order
    pub fn check_names(&self, point: ValidationPoint) -> Vec<&str> {
        self.checks[point.index()].iter().map(|c| c.name()).collect()
    }

    pub fn check_count(&self, point: ValidationPoint) -> usize {
        self.checks[point.index()].len()
    }

    /// Run the checks at `point` against `ctx`
    ///
    /// Returns every result when all pass, or the first failure.
    pub fn validate(
        &mut self,
        point: ValidationPoint,
        ctx: &ValidationContext,
    ) -> Result<Vec<CheckResult>, ValidationFailure> {
        let mut results = Vec::with_capacity(self.checks[point.index()].len());

        for slot in 0..self.checks[point.index()].len() {
            let (result, errored) = {
                let check = &mut self.checks[point.index()][slot];
                let (evaluation, errored) = run_check(&mut **check, ctx);
                let result = CheckResult::new(
                    evaluation.passed,
                    evaluation.message,
                    check.name(),
                    point,
                    ctx.clone(),
                    check.fail_strategy(),
                );
                (result, errored)
            };

            self.recorder.record(Event::validation(&result));

            if result.passed {
                tracing::debug!(check = %result.check_name, point = %point, "Check passed");
                results.push(result);
                continue;
            }

            let intervention = if errored {
                InterventionType::CheckError
            } else {
                InterventionType::BlockAction
            };
            tracing::warn!(
                check = %result.check_name,
                point = %point,
                strategy = %result.fail_strategy,
                message = %result.message,
                "Check failed"
            );
            self.recorder.record(Event::intervention(
                point,
                result.check_name.clone(),
                intervention,
                format!("Intervention triggered: {}", intervention),
                &result.context,
            ));
            return Err(ValidationFailure::new(result));
        }

        Ok(results)
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut EventRecorder {
        &mut self.recorder
    }

    pub fn session_id(&self) -> &str {
        self.recorder.session_id()
    }

    /// Number of events the log rejected
    pub fn log_failures(&self) -> usize {
        self.recorder.failures()
    }
}

impl fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for point in ValidationPoint::ALL {
            map.entry(&point.as_str(), &self.check_names(point));
        }
        map.finish()
    }
}

/// Evaluate one check, converting errors and panics into failures
fn run_check(check: &mut dyn Check, ctx: &ValidationContext) -> (Evaluation, bool) {
    match panic::catch_unwind(AssertUnwindSafe(|| check.evaluate(ctx))) {
        Ok(Ok(evaluation)) => (evaluation, false),
        Ok(Err(e)) => (
            Evaluation::fail(format!("Check failed with error: {}", e)),
            true,
        ),
        Err(payload) => (
            Evaluation::fail(format!("Check panicked: {}", panic_message(payload.as_ref()))),
            true,
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
