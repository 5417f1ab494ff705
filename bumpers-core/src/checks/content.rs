use crate::check::{Check, Evaluation};
use crate::error::CheckExecutionError;
use crate::types::{FailStrategy, ValidationContext};

/// Rejects output containing forbidden words or exceeding a length cap
///
/// Word matching is case-insensitive substring matching.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    name: String,
    fail_strategy: FailStrategy,
    forbidden_words: Vec<String>,
    max_length: Option<usize>,
}

impl ContentFilter {
    pub fn new<I, S>(forbidden_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words: Vec<String> = forbidden_words.into_iter().map(Into::into).collect();
        words.sort();
        words.dedup();
        Self {
            name: "content_filter".to_string(),
            fail_strategy: FailStrategy::Raise,
            forbidden_words: words,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
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

impl Check for ContentFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, ctx: &ValidationContext) -> Result<Evaluation, CheckExecutionError> {
        let content = match ctx.output() {
            Some(content) if !content.is_empty() => content,
            _ => return Ok(Evaluation::fail("No content to validate")),
        };

        let lowered = content.to_lowercase();
        let found: Vec<&str> = self
            .forbidden_words
            .iter()
            .filter(|word| lowered.contains(&word.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !found.is_empty() {
            return Ok(Evaluation::fail(format!("Found forbidden words: {:?}", found)));
        }

        if let Some(max) = self.max_length {
            if content.chars().count() > max {
                return Ok(Evaluation::fail(format!(
                    "Content exceeds maximum length of {}",
                    max
                )));
            }
        }

        Ok(Evaluation::pass("Content validation passed"))
    }
}
