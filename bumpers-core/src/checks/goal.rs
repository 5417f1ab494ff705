use crate::check::{Check, Evaluation};
use crate::error::CheckExecutionError;
use crate::types::{FailStrategy, ValidationContext};

const KEY_TERM_MIN_LEN: usize = 4;
const KEY_TERMS: usize = 3;
const TEMPORAL_MARKERS: [&str; 5] = ["yesterday", "tomorrow", "today", "tonight", "next week"];

/// Keyword heuristic that the final answer addresses the question
///
/// The first three words of the question with at least four characters
/// must all appear in the output.
#[derive(Debug, Clone)]
pub struct GoalFulfillment {
    name: String,
    fail_strategy: FailStrategy,
}

impl GoalFulfillment {
    pub fn new() -> Self {
        Self {
            name: "goal_fulfillment".to_string(),
            fail_strategy: FailStrategy::Raise,
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

impl Default for GoalFulfillment {
    fn default() -> Self {
        Self::new()
    }
}

impl Check for GoalFulfillment {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError> {
        let question = ctx.question().unwrap_or_default().to_lowercase();
        let output = ctx.output().unwrap_or_default().to_lowercase();

        let missing: Vec<&str> = question
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().count() >= KEY_TERM_MIN_LEN)
            .take(KEY_TERMS)
            .filter(|term| !output.contains(term))
            .collect();

        if missing.is_empty() {
            Ok(Evaluation::pass("Goal appears to be fulfilled"))
        } else {
            Ok(Evaluation::fail(format!(
                "Goal not fulfilled. Missing key terms: {:?}",
                missing
            )))
        }
    }
}

/// Checks that time references in the question ("tomorrow", "next week")
/// are echoed by the output
#[derive(Debug, Clone)]
pub struct TemporalRelevance {
    name: String,
    fail_strategy: FailStrategy,
}

impl TemporalRelevance {
    pub fn new() -> Self {
        Self {
            name: "temporal_relevance".to_string(),
            fail_strategy: FailStrategy::Raise,
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

impl Default for TemporalRelevance {
    fn default() -> Self {
        Self::new()
    }
}

impl Check for TemporalRelevance {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError> {
        let question = ctx.question().unwrap_or_default().to_lowercase();
        let output = ctx.output().unwrap_or_default().to_lowercase();

        let asked: Vec<&str> = TEMPORAL_MARKERS
            .into_iter()
            .filter(|m| question.contains(m))
            .collect();
        if asked.is_empty() {
            return Ok(Evaluation::pass(
                "No temporal constraints identified in the question",
            ));
        }

        let missing: Vec<&str> = asked.into_iter().filter(|m| !output.contains(m)).collect();
        if missing.is_empty() {
            Ok(Evaluation::pass("Temporal aspects addressed"))
        } else {
            Ok(Evaluation::fail(format!(
                "Temporal request not addressed. Missing terms: {:?}",
                missing
            )))
        }
    }
}
