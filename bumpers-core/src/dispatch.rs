//! Fail-strategy dispatch
//!
//! Turns a [`ValidationFailure`] into a continuation or an interrupt:
//!
//! | Strategy | Outcome |
//! |----------|---------|
//! | `stop` | `Abort(Stop)` |
//! | `raise` | `Raised` |
//! | `log` | `Verdict::Logged` |
//! | `auto_correct` | `Verdict::Patched`, or `Abort(Stop)` once the per-run budget is spent |
//! | `self_correct` | `Abort(Restart)`, or `Abort(Stop)` once the per-session budget is spent |
//!
//! Any failure while producing guidance escalates to `Abort(Stop)`.

use std::fmt;

use crate::config::EnforcementConfig;
use crate::correction::{CorrectionGenerator, TemplateCorrection};
use crate::engine::EventRecorder;
use crate::error::ValidationFailure;
use crate::log::{Event, InterventionType};
use crate::rewind::RunTracker;
use crate::signal::{AbortSignal, Interrupt, StopCause, Verdict};
use crate::types::{FailStrategy, ValidationContext};

/// Applies fail strategies within correction budgets
pub struct Dispatcher {
    max_auto_correct: u32,
    max_self_correct: u32,
    auto_corrections: u32,
    self_corrections: u32,
    corrector: Box<dyn CorrectionGenerator>,
}

impl Dispatcher {
    pub fn new(max_auto_correct: u32, max_self_correct: u32) -> Self {
        Self {
            max_auto_correct,
            max_self_correct,
            auto_corrections: 0,
            self_corrections: 0,
            corrector: Box::new(TemplateCorrection::default()),
        }
    }

    pub fn from_config(config: &EnforcementConfig) -> Self {
        let dispatcher = Self::new(config.max_auto_correct, config.max_self_correct);
        match &config.correction_template {
            Some(template) => dispatcher.with_corrector(TemplateCorrection::new(template.clone())),
            None => dispatcher,
        }
    }

    pub fn with_corrector<G: CorrectionGenerator + 'static>(mut self, corrector: G) -> Self {
        self.corrector = Box::new(corrector);
        self
    }

    pub fn set_corrector(&mut self, corrector: Box<dyn CorrectionGenerator>) {
        self.corrector = corrector;
    }

    /// Reset the per-run auto-correct counter
    pub fn begin_run(&mut self) {
        self.auto_corrections = 0;
    }

    pub fn auto_corrections(&self) -> u32 {
        self.auto_corrections
    }

    pub fn self_corrections(&self) -> u32 {
        self.self_corrections
    }

    /// Apply the failing check's strategy
    pub fn dispatch(
        &mut self,
        failure: ValidationFailure,
        ctx: &mut ValidationContext,
        tracker: &mut RunTracker,
        recorder: &mut EventRecorder,
    ) -> Result<Verdict, Interrupt> {
        match failure.fail_strategy() {
            FailStrategy::LogOnly => {
                tracing::info!(
                    check = failure.check_name(),
                    message = failure.message(),
                    "Check failed, continuing (log only)"
                );
                Ok(Verdict::Logged(failure.into_result()))
            }
            FailStrategy::Raise => Err(Interrupt::Raised(failure)),
            FailStrategy::Stop => Err(self.stop(failure, StopCause::Policy, tracker, recorder)),
            FailStrategy::AutoCorrect => self.auto_correct(failure, ctx, tracker, recorder),
            FailStrategy::SelfCorrect => Err(self.self_correct(failure, tracker, recorder)),
        }
    }

    fn auto_correct(
        &mut self,
        failure: ValidationFailure,
        ctx: &mut ValidationContext,
        tracker: &mut RunTracker,
        recorder: &mut EventRecorder,
    ) -> Result<Verdict, Interrupt> {
        if self.auto_corrections >= self.max_auto_correct {
            let cause = StopCause::AutoCorrectExhausted {
                limit: self.max_auto_correct,
            };
            return Err(self.stop(failure, cause, tracker, recorder));
        }

        let prior = ctx
            .question()
            .map(str::to_string)
            .unwrap_or_else(|| tracker.working_input().to_string());
        let guidance = match self.corrector.generate(&prior, failure.message()) {
            Ok(guidance) => guidance,
            Err(e) => {
                let cause = StopCause::CorrectionFailed { reason: e.message };
                return Err(self.stop(failure, cause, tracker, recorder));
            }
        };

        self.auto_corrections += 1;
        ctx.append_guidance(&guidance);
        tracker.patch_input(&guidance);

        tracing::warn!(
            check = failure.check_name(),
            attempt = self.auto_corrections,
            limit = self.max_auto_correct,
            "Auto-correcting"
        );
        recorder.record(Event::intervention(
            failure.point(),
            failure.check_name(),
            InterventionType::AutoCorrect,
            format!(
                "Auto-correct {}/{}: {}",
                self.auto_corrections,
                self.max_auto_correct,
                failure.message()
            ),
            ctx,
        ));

        Ok(Verdict::Patched {
            result: failure.into_result(),
            guidance,
        })
    }

    fn self_correct(
        &mut self,
        failure: ValidationFailure,
        tracker: &mut RunTracker,
        recorder: &mut EventRecorder,
    ) -> Interrupt {
        if self.self_corrections >= self.max_self_correct {
            let cause = StopCause::SelfCorrectExhausted {
                limit: self.max_self_correct,
            };
            return self.stop(failure, cause, tracker, recorder);
        }

        let payload = match tracker.prepare_restart(self.corrector.as_ref(), &failure) {
            Ok(payload) => payload,
            Err(e) => {
                let cause = StopCause::CorrectionFailed {
                    reason: e.to_string(),
                };
                return self.stop(failure, cause, tracker, recorder);
            }
        };

        self.self_corrections += 1;
        tracing::warn!(
            check = failure.check_name(),
            checkpoint = payload.checkpoint_index,
            attempt = self.self_corrections,
            limit = self.max_self_correct,
            "Rewinding run for self-correction"
        );
        recorder.record(Event::intervention(
            failure.point(),
            failure.check_name(),
            InterventionType::SelfCorrect,
            format!(
                "Rewound to checkpoint {}: {}",
                payload.checkpoint_index,
                failure.message()
            ),
            &failure.result().context,
        ));

        Interrupt::Abort(AbortSignal::Restart(payload))
    }

    fn stop(
        &self,
        failure: ValidationFailure,
        cause: StopCause,
        tracker: &mut RunTracker,
        recorder: &mut EventRecorder,
    ) -> Interrupt {
        tracker.halt();
        tracing::error!(
            check = failure.check_name(),
            cause = %cause,
            message = failure.message(),
            "Stopping run"
        );
        recorder.record(Event::intervention(
            failure.point(),
            failure.check_name(),
            InterventionType::Stop,
            format!("Run stopped ({}): {}", cause, failure.message()),
            &failure.result().context,
        ));
        Interrupt::Abort(AbortSignal::Stop { cause, failure })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_auto_correct", &self.max_auto_correct)
            .field("max_self_correct", &self.max_self_correct)
            .field("auto_corrections", &self.auto_corrections)
            .field("self_corrections", &self.self_corrections)
            .finish_non_exhaustive()
    }
}
