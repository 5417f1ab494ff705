use crate::check::{Check, Evaluation};
use crate::error::CheckExecutionError;
use crate::types::{FailStrategy, ValidationContext};

/// Caps the number of actions a session may chain
///
/// Every evaluation counts as one action, so register it at pre-action.
#[derive(Debug, Clone)]
pub struct ChainLength {
    name: String,
    fail_strategy: FailStrategy,
    max_chain: usize,
    current: usize,
}

impl ChainLength {
    pub fn new(max_chain: usize) -> Self {
        Self {
            name: "chain_length".to_string(),
            fail_strategy: FailStrategy::Raise,
            max_chain,
            current: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_fail_strategy(mut self, strategy: FailStrategy) -> Self {
        self.fail_strategy = strategy;
        self
    }

    pub fn current(&self) -> usize {
        self.current
    }
}

impl Check for ChainLength {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, _ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError> {
        self.current += 1;
        if self.current > self.max_chain {
            Ok(Evaluation::fail(format!(
                "Chain length exceeded maximum of {} actions",
                self.max_chain
            )))
        } else {
            Ok(Evaluation::pass(format!(
                "Chain length within limits: {}/{}",
                self.current, self.max_chain
            )))
        }
    }
}

/// Detects an agent proposing the same action with the same input over
/// and over
///
/// Fails once one `action: action_input` pair has been proposed more than
/// `max_repeats` times in a row.
#[derive(Debug, Clone)]
pub struct RedundancyLoop {
    name: String,
    fail_strategy: FailStrategy,
    max_repeats: usize,
    last: Option<String>,
    streak: usize,
}

impl RedundancyLoop {
    pub fn new(max_repeats: usize) -> Self {
        Self {
            name: "redundancy_looping".to_string(),
            fail_strategy: FailStrategy::Raise,
            max_repeats,
            last: None,
            streak: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_fail_strategy(mut self, strategy: FailStrategy) -> Self {
        self.fail_strategy = strategy;
        self
    }
}

impl Check for RedundancyLoop {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError> {
        let step = format!(
            "{}: {}",
            ctx.action().unwrap_or_default(),
            ctx.action_input().unwrap_or_default()
        );

        if self.last.as_deref() == Some(step.as_str()) {
            self.streak += 1;
        } else {
            self.last = Some(step);
            self.streak = 1;
        }

        if self.streak > self.max_repeats {
            let step = self.last.as_deref().unwrap_or_default();
            Ok(Evaluation::fail(format!(
                "Redundant looping detected: {} identical actions in a row ({})",
                self.streak, step
            )))
        } else {
            Ok(Evaluation::pass("No excessive redundancy/looping detected"))
        }
    }
}
