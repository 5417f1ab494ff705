use std::collections::BTreeSet;

use crate::check::{Check, Evaluation};
use crate::error::CheckExecutionError;
use crate::types::{FailStrategy, ValidationContext};

/// Allows only actions from a fixed set
#[derive(Debug, Clone)]
pub struct ActionWhitelist {
    name: String,
    fail_strategy: FailStrategy,
    allowed: BTreeSet<String>,
}

impl ActionWhitelist {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "action_whitelist".to_string(),
            fail_strategy: FailStrategy::Raise,
            allowed: allowed.into_iter().map(Into::into).collect(),
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

    fn allowed_list(&self) -> String {
        let names: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
        format!("[{}]", names.join(", "))
    }
}

impl Check for ActionWhitelist {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError> {
        let action = match ctx.action() {
            Some(action) if !action.is_empty() => action,
            _ => return Ok(Evaluation::fail("No action specified in context")),
        };

        if self.allowed.contains(action) {
            Ok(Evaluation::pass(format!("Action '{}' is allowed", action)))
        } else {
            Ok(Evaluation::fail(format!(
                "Action '{}' is not in allowed actions: {}",
                action,
                self.allowed_list()
            )))
        }
    }
}
