use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::check::{Check, Evaluation};
use crate::error::{BumpersError, CheckExecutionError, Result};
use crate::timing::{Clock, SystemClock};
use crate::types::{FailStrategy, ValidationContext};

/// Sliding-window limit on how often this check may pass
///
/// Only accepted calls are recorded, so a burst of rejected calls does not
/// push the window forward.
pub struct RateLimit {
    name: String,
    fail_strategy: FailStrategy,
    window: Duration,
    max_calls: usize,
    accepted: VecDeque<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl RateLimit {
    pub fn new(max_calls: usize, window: Duration) -> Result<Self> {
        if max_calls == 0 {
            return Err(BumpersError::config("rate limit max_calls must be at least 1"));
        }
        if window <= Duration::zero() {
            return Err(BumpersError::config("rate limit window must be positive"));
        }
        Ok(Self {
            name: "rate_limit".to_string(),
            fail_strategy: FailStrategy::Raise,
            window,
            max_calls,
            accepted: VecDeque::new(),
            clock: Arc::new(SystemClock),
        })
    }

    /// `max_calls` per rolling minute
    pub fn per_minute(max_calls: usize) -> Result<Self> {
        Self::new(max_calls, Duration::minutes(1))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
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

    /// Accepted calls still inside the window
    pub fn current_count(&self) -> usize {
        let window_start = self.clock.now() - self.window;
        self.accepted.iter().filter(|&&t| t > window_start).count()
    }
}

impl Check for RateLimit {
    fn name(&self) -> &str {
        &self.name
    }

    fn fail_strategy(&self) -> FailStrategy {
        self.fail_strategy
    }

    fn evaluate(&mut self, _ctx: &ValidationContext) -> std::result::Result<Evaluation, CheckExecutionError> {
        let now = self.clock.now();
        let window_start = now - self.window;

        // Remove expired timestamps
        while self.accepted.front().is_some_and(|&t| t <= window_start) {
            self.accepted.pop_front();
        }

        if self.accepted.len() >= self.max_calls {
            let reset_after = self
                .accepted
                .front()
                .map(|&oldest| (oldest + self.window - now).num_seconds().max(0))
                .unwrap_or(0);
            return Ok(Evaluation::fail(format!(
                "Rate limit exceeded: {} calls per {}s (resets in {}s)",
                self.max_calls,
                self.window.num_seconds(),
                reset_after
            )));
        }

        self.accepted.push_back(now);
        Ok(Evaluation::pass(format!(
            "Within rate limits: {}/{}",
            self.accepted.len(),
            self.max_calls
        )))
    }
}

impl fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimit")
            .field("name", &self.name)
            .field("fail_strategy", &self.fail_strategy)
            .field("window", &self.window)
            .field("max_calls", &self.max_calls)
            .field("accepted", &self.accepted.len())
            .finish()
    }
}
