//! Alert conditions evaluated by the monitor

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::log::{Event, EventKind, InterventionType};
use crate::types::keys;

/// Events visible to a condition on one tick
#[derive(Debug, Clone, Copy)]
pub struct EventWindow<'a> {
    pub events: &'a [Event],
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl<'a> EventWindow<'a> {
    pub fn new(events: &'a [Event], start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { events, start, end }
    }

    /// Events no older than `window` before the end of this window
    pub fn recent(&self, window: Duration) -> impl Iterator<Item = &'a Event> {
        let cutoff = self.end - window;
        self.events.iter().filter(move |e| e.timestamp >= cutoff)
    }
}

/// A fired alert, passed to every handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub condition: String,
    pub message: String,
    pub fired_at: DateTime<Utc>,
    /// Number of events the condition saw
    pub events_in_window: usize,
}

type Predicate = Box<dyn Fn(&EventWindow<'_>) -> bool + Send + Sync>;

/// Named predicate over recent events with a cooldown
///
/// Fires at most once per cooldown: after firing at `t`, it stays silent
/// until `t + cooldown`, even if the predicate keeps holding.
pub struct AlertCondition {
    name: String,
    message: String,
    cooldown: Duration,
    last_fired: Option<DateTime<Utc>>,
    predicate: Predicate,
}

impl AlertCondition {
    pub fn new<F>(name: impl Into<String>, message: impl Into<String>, cooldown: Duration, predicate: F) -> Self
    where
        F: Fn(&EventWindow<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            message: message.into(),
            cooldown,
            last_fired: None,
            predicate: Box::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_fired.is_some_and(|t| now - t < self.cooldown)
    }

    /// Evaluate at `now`; records `last_fired` and returns the alert if it fires
    pub fn evaluate(&mut self, window: &EventWindow<'_>, now: DateTime<Utc>) -> Option<Alert> {
        if self.in_cooldown(now) || !(self.predicate)(window) {
            return None;
        }
        self.last_fired = Some(now);
        Some(Alert {
            condition: self.name.clone(),
            message: self.message.clone(),
            fired_at: now,
            events_in_window: window.events.len(),
        })
    }
}

impl fmt::Debug for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertCondition")
            .field("name", &self.name)
            .field("cooldown", &self.cooldown)
            .field("last_fired", &self.last_fired)
            .finish_non_exhaustive()
    }
}

/// Share of failed validation events in `window` above `threshold`
pub fn high_failure_rate(threshold: f64, window: Duration) -> AlertCondition {
    AlertCondition::new(
        "high_failure_rate",
        format!(
            "Validation failure rate above {:.0}% in the last {} minutes",
            threshold * 100.0,
            window.num_minutes()
        ),
        window,
        move |w| {
            let (total, failed) = w
                .recent(window)
                .filter(|e| e.kind == EventKind::Validation)
                .fold((0usize, 0usize), |(total, failed), e| {
                    (total + 1, failed + usize::from(e.is_failure()))
                });
            total > 0 && (failed as f64 / total as f64) > threshold
        },
    )
}

/// At least `count` blocks of `action` within `window`
pub fn repeated_block(action: impl Into<String>, count: usize, window: Duration) -> AlertCondition {
    let action = action.into();
    AlertCondition::new(
        format!("repeated_block:{}", action),
        format!(
            "Action '{}' blocked {} or more times in the last {} minutes",
            action,
            count,
            window.num_minutes()
        ),
        window,
        move |w| {
            let blocks = w
                .recent(window)
                .filter(|e| {
                    e.kind == EventKind::Intervention
                        && e.intervention_type() == Some(InterventionType::BlockAction.as_str())
                        && e.context_str(keys::ACTION) == Some(action.as_str())
                })
                .count();
            blocks >= count
        },
    )
}
