//! Per-agent-session enforcement
//!
//! A [`Session`] owns one engine, its dispatcher budgets and the current
//! run's rewind state. The agent runtime calls [`Session::validate`] at
//! each validation point and reacts to the returned verdict or interrupt.
//!
//! ```rust
//! use std::sync::Arc;
//! use bumpers_core::checks::ActionWhitelist;
//! use bumpers_core::log::InMemoryEventLog;
//! use bumpers_core::{Interrupt, Session, ValidationContext, ValidationPoint};
//!
//! let mut session = Session::new(Arc::new(InMemoryEventLog::new()));
//! session.register(ActionWhitelist::new(["search"]), ValidationPoint::PreAction);
//! session.start_run("Find flights to Oslo").unwrap();
//!
//! let mut step = ValidationContext::new().with("action", "delete");
//! match session.validate(ValidationPoint::PreAction, &mut step) {
//!     Err(Interrupt::Raised(failure)) => assert_eq!(failure.check_name(), "action_whitelist"),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use std::sync::Arc;

use crate::check::Check;
use crate::config::EnforcementConfig;
use crate::correction::CorrectionGenerator;
use crate::dispatch::Dispatcher;
use crate::engine::ValidationEngine;
use crate::error::Result;
use crate::log::EventLog;
use crate::rewind::{RestartPayload, RunState, RunTracker};
use crate::signal::{Interrupt, Verdict};
use crate::types::{ValidationContext, ValidationPoint};

#[derive(Debug)]
pub struct Session {
    engine: ValidationEngine,
    dispatcher: Dispatcher,
    tracker: RunTracker,
}

impl Session {
    /// Session with default budgets
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self::from_config(&EnforcementConfig::default(), log)
    }

    pub fn from_config(config: &EnforcementConfig, log: Arc<dyn EventLog>) -> Self {
        Self {
            engine: ValidationEngine::new(log),
            dispatcher: Dispatcher::from_config(config),
            tracker: RunTracker::new(),
        }
    }

    /// Replace the generated session ID stamped on events
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.engine.recorder_mut().set_session_id(session_id.into());
        self
    }

    pub fn with_corrector<G: CorrectionGenerator + 'static>(mut self, corrector: G) -> Self {
        self.dispatcher.set_corrector(Box::new(corrector));
        self
    }

    pub fn register<C: Check + 'static>(&mut self, check: C, point: ValidationPoint) -> &mut Self {
        self.engine.register(check, point);
        self
    }

    /// Begin a new run for `request`, returning its run ID
    ///
    /// Replaces a finished run. Fails while a run is live.
    pub fn start_run(&mut self, request: &str) -> Result<String> {
        if self.tracker.state().is_terminal() {
            self.tracker = RunTracker::new();
        }
        let run_id = self.tracker.start(request)?.to_string();
        self.engine.recorder_mut().set_run_id(Some(run_id.clone()));
        self.dispatcher.begin_run();
        tracing::info!(session = self.engine.session_id(), run = %run_id, "Run started");
        Ok(run_id)
    }

    /// Validate one step
    ///
    /// A passing pre-action validation during a live run records exactly
    /// one checkpoint. On failure the check's strategy decides the outcome;
    /// an `auto_correct` failure patches `ctx` in place.
    pub fn validate(
        &mut self,
        point: ValidationPoint,
        ctx: &mut ValidationContext,
    ) -> std::result::Result<Verdict, Interrupt> {
        match self.engine.validate(point, ctx) {
            Ok(results) => {
                if point == ValidationPoint::PreAction && self.tracker.state() == RunState::Running {
                    if let Ok(index) = self.tracker.record_safe(ctx) {
                        tracing::debug!(checkpoint = index, "Checkpoint recorded");
                    }
                }
                Ok(Verdict::Passed(results))
            }
            Err(failure) => self.dispatcher.dispatch(
                failure,
                ctx,
                &mut self.tracker,
                self.engine.recorder_mut(),
            ),
        }
    }

    /// Continue after a self-correction with the payload's corrected input
    pub fn restart(&mut self, payload: &RestartPayload) -> Result<()> {
        let checkpoint = self.tracker.resume(payload)?;
        tracing::info!(
            session = self.engine.session_id(),
            attempt = self.tracker.attempt(),
            checkpoint,
            "Run restarted with correction"
        );
        Ok(())
    }

    pub fn complete_run(&mut self) -> Result<()> {
        self.tracker.complete()?;
        tracing::info!(session = self.engine.session_id(), "Run completed");
        Ok(())
    }

    /// Halt the live run, if any
    pub fn halt(&mut self) {
        self.tracker.halt();
    }

    pub fn state(&self) -> RunState {
        self.tracker.state()
    }

    pub fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ValidationEngine {
        &mut self.engine
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn session_id(&self) -> &str {
        self.engine.session_id()
    }
}
