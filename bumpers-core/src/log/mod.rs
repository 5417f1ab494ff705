//! Append-only event log
//!
//! Every check result and every intervention becomes an [`Event`]. The
//! engine appends, the monitor queries, and both share the log through
//! `Arc<dyn EventLog>`.
//!
//! Backends:
//! - [`InMemoryEventLog`]: `RwLock<Vec<Event>>`, single writer / many readers
//! - [`FileEventLog`]: newline-delimited JSON, survives the process
//! - [`NullEventLog`]: discards everything
//!
//! # Example
//!
//! ```rust
//! use bumpers_core::log::{EventKind, EventLog, EventQuery, InMemoryEventLog};
//!
//! let log = InMemoryEventLog::new();
//! let interventions = log
//!     .query(&EventQuery::new().kind(EventKind::Intervention))
//!     .unwrap();
//! assert!(interventions.is_empty());
//! ```

mod file;

use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{BumpersError, Result};
use crate::types::{CheckResult, ValidationContext, ValidationPoint};

pub use file::FileEventLog;

/// What an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// One check result
    Validation,
    /// The engine or dispatcher acted on a failure
    Intervention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pass,
    Fail,
    Intervention,
}

/// Why an intervention event was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    /// A check rejected the context
    BlockAction,
    /// A check errored or panicked
    CheckError,
    /// Guidance was patched into the running context
    AutoCorrect,
    /// The run was rewound for a corrected restart
    SelfCorrect,
    /// The run was halted
    Stop,
}

impl InterventionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionType::BlockAction => "block_action",
            InterventionType::CheckError => "check_error",
            InterventionType::AutoCorrect => "auto_correct",
            InterventionType::SelfCorrect => "self_correct",
            InterventionType::Stop => "stop",
        }
    }
}

impl fmt::Display for InterventionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context key carrying the [`InterventionType`] on intervention events
pub const INTERVENTION_TYPE_KEY: &str = "intervention_type";

/// A single immutable log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub point: ValidationPoint,
    pub check_name: String,
    pub status: EventStatus,
    pub message: String,
    pub context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Event {
    /// Validation event for a check result
    pub fn validation(result: &CheckResult) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: EventKind::Validation,
            point: result.point,
            check_name: result.check_name.clone(),
            status: if result.passed {
                EventStatus::Pass
            } else {
                EventStatus::Fail
            },
            message: result.message.clone(),
            context: result.context.to_value(),
            session_id: None,
            run_id: None,
        }
    }

    /// Intervention event; `intervention_type` is merged into the context
    pub fn intervention(
        point: ValidationPoint,
        check_name: impl Into<String>,
        intervention_type: InterventionType,
        message: impl Into<String>,
        context: &ValidationContext,
    ) -> Self {
        let context = context
            .clone()
            .with(INTERVENTION_TYPE_KEY, intervention_type.as_str());
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: EventKind::Intervention,
            point,
            check_name: check_name.into(),
            status: EventStatus::Intervention,
            message: message.into(),
            context: context.to_value(),
            session_id: None,
            run_id: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>, run_id: Option<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.run_id = run_id;
        self
    }

    /// `intervention_type` from the context, if any
    pub fn intervention_type(&self) -> Option<&str> {
        self.context_str(INTERVENTION_TYPE_KEY)
    }

    /// String value from the event context
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    pub fn is_failure(&self) -> bool {
        self.status == EventStatus::Fail
    }
}

/// Filter for [`EventLog::query`]; bounds are inclusive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub kind: Option<EventKind>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.start.map_or(true, |s| event.timestamp >= s)
            && self.end.map_or(true, |e| event.timestamp <= e)
            && self.kind.map_or(true, |k| event.kind == k)
    }
}

/// Event log trait
///
/// All methods take `&self`; implementations provide their own locking so
/// one writer and many readers can share an instance.
pub trait EventLog: Send + Sync {
    /// Append one event
    fn append(&self, event: &Event) -> Result<()>;

    /// Events matching the query, in append order
    fn query(&self, query: &EventQuery) -> Result<Vec<Event>>;

    /// Backend name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// In-memory event log (default)
///
/// Events are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every event
    pub fn events(&self) -> Vec<Event> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, event: &Event) -> Result<()> {
        let mut events = self.events.write().map_err(|_| BumpersError::StorageLocked)?;
        events.push(event.clone());
        Ok(())
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let events = self.events.read().map_err(|_| BumpersError::StorageLocked)?;
        Ok(events.iter().filter(|e| query.matches(e)).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// Event log that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventLog;

impl EventLog for NullEventLog {
    fn append(&self, _event: &Event) -> Result<()> {
        Ok(())
    }

    fn query(&self, _query: &EventQuery) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailStrategy;
    use chrono::Duration;

    fn result(passed: bool) -> CheckResult {
        CheckResult::new(
            passed,
            if passed { "ok" } else { "blocked" },
            "action_whitelist",
            ValidationPoint::PreAction,
            ValidationContext::new().with("action", "delete"),
            FailStrategy::Raise,
        )
    }

    #[test]
    fn test_validation_event_status() {
        assert_eq!(Event::validation(&result(true)).status, EventStatus::Pass);
        let failed = Event::validation(&result(false));
        assert_eq!(failed.status, EventStatus::Fail);
        assert!(failed.is_failure());
        assert_eq!(failed.context_str("action"), Some("delete"));
    }

    #[test]
    fn test_intervention_event_carries_type() {
        let event = Event::intervention(
            ValidationPoint::PreAction,
            "action_whitelist",
            InterventionType::BlockAction,
            "Intervention triggered: block_action",
            &ValidationContext::new().with("action", "delete"),
        );
        assert_eq!(event.kind, EventKind::Intervention);
        assert_eq!(event.status, EventStatus::Intervention);
        assert_eq!(event.intervention_type(), Some("block_action"));
        assert_eq!(event.context_str("action"), Some("delete"));
    }

    #[test]
    fn test_in_memory_query_filters() {
        let log = InMemoryEventLog::new();
        let now = Utc::now();

        let old = Event::validation(&result(true)).with_timestamp(now - Duration::hours(2));
        let recent = Event::validation(&result(false)).with_timestamp(now);
        let intervention = Event::intervention(
            ValidationPoint::PreAction,
            "action_whitelist",
            InterventionType::BlockAction,
            "blocked",
            &ValidationContext::new(),
        )
        .with_timestamp(now);

        log.append(&old).unwrap();
        log.append(&recent).unwrap();
        log.append(&intervention).unwrap();

        let last_hour = log
            .query(&EventQuery::new().since(now - Duration::hours(1)))
            .unwrap();
        assert_eq!(last_hour.len(), 2);

        let validations = log
            .query(&EventQuery::new().kind(EventKind::Validation))
            .unwrap();
        assert_eq!(validations, vec![old.clone(), recent]);

        let before = log
            .query(&EventQuery::new().until(now - Duration::minutes(30)))
            .unwrap();
        assert_eq!(before, vec![old]);
    }

    #[test]
    fn test_event_serde_shape() {
        let event = Event::validation(&result(false)).with_session("s-1", Some("r-1".to_string()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["status"], "fail");
        assert_eq!(json["point"], "pre_action");
        assert_eq!(json["session_id"], "s-1");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_null_log_discards() {
        let log = NullEventLog;
        log.append(&Event::validation(&result(true))).unwrap();
        assert!(log.query(&EventQuery::new()).unwrap().is_empty());
        assert_eq!(log.name(), "null");
    }
}
