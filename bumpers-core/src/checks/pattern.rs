use regex::Regex;

use crate::check::{Check, Evaluation};
use crate::error::{BumpersError, CheckExecutionError, Result};
use crate::types::{FailStrategy, ValidationContext};

/// Rejects steps whose output or action input matches a forbidden pattern
#[derive(Debug, Clone)]
pub struct PatternCheck {
    name: String,
    fail_strategy: FailStrategy,
    patterns: Vec<Regex>,
}

impl PatternCheck {
    /// Compile the patterns; an invalid expression is a configuration error
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).map_err(|e| BumpersError::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: "pattern_matcher".to_string(),
            fail_strategy: FailStrategy::Raise,
            patterns,
        })
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

impl Check for PatternCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, ctx: &ValidationContext) -> std::result::Result<Evaluation, CheckExecutionError> {
        let mut text = ctx.output().unwrap_or_default().to_string();
        if let Some(input) = ctx.action_input() {
            text.push('\n');
            text.push_str(&input);
        }

        match self.patterns.iter().find(|p| p.is_match(&text)) {
            Some(pattern) => Ok(Evaluation::fail(format!(
                "Matched forbidden pattern: {}",
                pattern.as_str()
            ))),
            None => Ok(Evaluation::pass("No forbidden patterns detected")),
        }
    }
}
