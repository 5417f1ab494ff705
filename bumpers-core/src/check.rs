//! The check capability
//!
//! A check is a named unit of policy evaluation with a fail strategy. The
//! engine owns registered checks exclusively, so `evaluate` takes `&mut self`
//! and stateful checks (rate limits, counters) need no locking.

use std::fmt;

use crate::error::CheckExecutionError;
use crate::types::{FailStrategy, ValidationContext};

/// Pass/fail verdict and explanation returned by a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    pub message: String,
}

impl Evaluation {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// A policy check run by the validation engine
pub trait Check: Send {
    /// Stable name used in results, events and failure messages
    fn name(&self) -> &str;

    /// Strategy the dispatcher applies when this check fails
    fn fail_strategy(&self) -> FailStrategy;

    /// Evaluate the context
    ///
    /// Returning an error (or panicking) produces a failed result that
    /// still uses [`Check::fail_strategy`].
    fn evaluate(&mut self, ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError>;
}

/// Adapter turning a closure into a [`Check`]
///
/// ```rust
/// use bumpers_core::{Evaluation, FailStrategy, FnCheck};
///
/// let check = FnCheck::new("non_empty_output", FailStrategy::LogOnly, |ctx| {
///     Ok(match ctx.output() {
///         Some(text) if !text.is_empty() => Evaluation::pass("Output present"),
///         _ => Evaluation::fail("Output is empty"),
///     })
/// });
/// # let _ = check;
/// ```
pub struct FnCheck<F> {
    name: String,
    fail_strategy: FailStrategy,
    f: F,
}

impl<F> FnCheck<F>
where
    F: FnMut(&ValidationContext) -> Result<Evaluation, CheckExecutionError> + Send,
{
    pub fn new(name: impl Into<String>, fail_strategy: FailStrategy, f: F) -> Self {
        Self {
            name: name.into(),
            fail_strategy,
            f,
        }
    }
}

impl<F> Check for FnCheck<F>
where
    F: FnMut(&ValidationContext) -> Result<Evaluation, CheckExecutionError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError> {
        (self.f)(ctx)
    }
}

impl<F> fmt::Debug for FnCheck<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCheck")
            .field("name", &self.name)
            .field("fail_strategy", &self.fail_strategy)
            .finish_non_exhaustive()
    }
}
