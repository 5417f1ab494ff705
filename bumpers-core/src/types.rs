//! Core value types: validation points, fail strategies, contexts and results

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BumpersError;

/// Context keys the standard checks and the dispatcher understand
pub mod keys {
    pub const QUESTION: &str = "question";
    pub const ACTION: &str = "action";
    pub const ACTION_INPUT: &str = "action_input";
    pub const OUTPUT: &str = "output";
}

/// A named interception point in the agent turn
///
/// Variant order is the order points occur within a turn, so `Ord` gives
/// `PreAction < PostAction < PreOutput < PostOutput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPoint {
    /// Before a proposed tool action executes
    PreAction,
    /// After a tool action returned
    PostAction,
    /// Before final text is released
    PreOutput,
    /// After final text was released
    PostOutput,
}

impl ValidationPoint {
    pub const ALL: [ValidationPoint; 4] = [
        ValidationPoint::PreAction,
        ValidationPoint::PostAction,
        ValidationPoint::PreOutput,
        ValidationPoint::PostOutput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPoint::PreAction => "pre_action",
            ValidationPoint::PostAction => "post_action",
            ValidationPoint::PreOutput => "pre_output",
            ValidationPoint::PostOutput => "post_output",
        }
    }

    /// Index into per-point tables
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ValidationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationPoint {
    type Err = BumpersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValidationPoint::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| BumpersError::UnknownValidationPoint {
                name: s.to_string(),
            })
    }
}

/// How a failing check is handled
///
/// Parsing is lenient: an unknown name resolves to [`FailStrategy::Raise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum FailStrategy {
    /// Halt the run; not catchable as an ordinary error
    Stop,
    /// Surface a recoverable error to the caller
    Raise,
    /// Record the failure and continue
    LogOnly,
    /// Patch the in-flight context with guidance and continue
    AutoCorrect,
    /// Rewind to the last safe checkpoint and restart with guidance
    SelfCorrect,
}

impl FailStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailStrategy::Stop => "stop",
            FailStrategy::Raise => "raise",
            FailStrategy::LogOnly => "log",
            FailStrategy::AutoCorrect => "auto_correct",
            FailStrategy::SelfCorrect => "self_correct",
        }
    }

    /// Parse a wire name, falling back to `Raise`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "stop" => FailStrategy::Stop,
            "raise" | "raise_error" => FailStrategy::Raise,
            "log" | "log_only" => FailStrategy::LogOnly,
            "auto_correct" => FailStrategy::AutoCorrect,
            "self_correct" => FailStrategy::SelfCorrect,
            other => {
                tracing::warn!(strategy = other, "Unknown fail strategy, treating as raise");
                FailStrategy::Raise
            }
        }
    }
}

impl fmt::Display for FailStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FailStrategy {
    fn from(name: &str) -> Self {
        FailStrategy::parse(name)
    }
}

impl From<String> for FailStrategy {
    fn from(name: String) -> Self {
        FailStrategy::parse(&name)
    }
}

impl From<FailStrategy> for &'static str {
    fn from(strategy: FailStrategy) -> Self {
        strategy.as_str()
    }
}

/// Key/value data describing the current agent step
///
/// Values are arbitrary JSON so the agent runtime can attach whatever it
/// has; the standard checks read the string keys in [`keys`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationContext(Map<String, Value>);

impl ValidationContext {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for `key`, `None` when absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn question(&self) -> Option<&str> {
        self.get_str(keys::QUESTION)
    }

    pub fn action(&self) -> Option<&str> {
        self.get_str(keys::ACTION)
    }

    /// Action input rendered as text; non-string inputs are serialized
    pub fn action_input(&self) -> Option<String> {
        match self.0.get(keys::ACTION_INPUT)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn output(&self) -> Option<&str> {
        self.get_str(keys::OUTPUT)
    }

    /// Append guidance to the `question` entry, creating it if absent
    pub fn append_guidance(&mut self, guidance: &str) {
        let patched = match self.question() {
            Some(q) if !q.is_empty() => format!("{}\n\n{}", q, guidance),
            _ => guidance.to_string(),
        };
        self.0.insert(keys::QUESTION.to_string(), Value::String(patched));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for ValidationContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Outcome of one check evaluation at one validation point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub check_name: String,
    pub point: ValidationPoint,
    /// Snapshot of the context the check saw
    pub context: ValidationContext,
    pub fail_strategy: FailStrategy,
}

impl CheckResult {
    pub fn new(
        passed: bool,
        message: impl Into<String>,
        check_name: impl Into<String>,
        point: ValidationPoint,
        context: ValidationContext,
        fail_strategy: FailStrategy,
    ) -> Self {
        Self {
            passed,
            message: message.into(),
            check_name: check_name.into(),
            point,
            context,
            fail_strategy,
        }
    }
}
