//! Checkpoints and the run state machine
//!
//! Each run keeps an append-only arena of checkpoints. A checkpoint stores
//! only its own message and the index of its parent, so the full prior
//! content of any checkpoint is the chain of messages from the genesis
//! entry (the original request) down to it, shared by every descendant.
//!
//! ```text
//!   [0] request ── [1] search: flights ── [2] search: hotels ── [3] book ✗
//!                                          │
//!                                          └── [4] corrected input (restart)
//! ```
//!
//! A self-correction rewinds to the last safe checkpoint (here `[2]`),
//! builds a restart payload, and the next attempt continues from a new
//! child of that checkpoint. Later checkpoints are never removed.
//!
//! Run states:
//!
//! ```text
//!   Idle ─► Running ─┬─► Completed
//!              ▲     ├─► Stopped
//!              │     └─► SelfCorrecting ─┬─► Running
//!              └─────────────────────────┘└─► Stopped
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::correction::CorrectionGenerator;
use crate::error::{BumpersError, Result, ValidationFailure};
use crate::types::ValidationContext;

/// One recorded known-safe state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub index: usize,
    pub parent: Option<usize>,
    /// The message this checkpoint added
    pub message: Arc<str>,
    /// The validated action, absent for genesis and restart entries
    pub action: Option<Arc<str>>,
}

/// Append-only checkpoint storage for one run
#[derive(Debug, Clone, Default)]
pub struct CheckpointArena {
    entries: Vec<Checkpoint>,
}

impl CheckpointArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a checkpoint and return its index
    pub fn push(
        &mut self,
        parent: Option<usize>,
        message: impl Into<Arc<str>>,
        action: Option<Arc<str>>,
    ) -> usize {
        let index = self.entries.len();
        self.entries.push(Checkpoint {
            index,
            parent,
            message: message.into(),
            action,
        });
        index
    }

    pub fn get(&self, index: usize) -> Option<&Checkpoint> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }

    /// Messages from genesis to `index`, inclusive
    pub fn prior_messages(&self, index: usize) -> Vec<Arc<str>> {
        let mut chain = Vec::new();
        let mut cursor = self.entries.get(index);
        while let Some(checkpoint) = cursor {
            chain.push(Arc::clone(&checkpoint.message));
            cursor = checkpoint.parent.and_then(|p| self.entries.get(p));
        }
        chain.reverse();
        chain
    }

    /// Prior messages joined by newlines
    pub fn content(&self, index: usize) -> String {
        self.prior_messages(index)
            .iter()
            .map(|m| m.as_ref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
    SelfCorrecting,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
            RunState::SelfCorrecting => "self_correcting",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped)
    }

    fn can_transition_to(&self, to: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, to),
            (Idle, Running)
                | (Running, Completed)
                | (Running, Stopped)
                | (Running, SelfCorrecting)
                | (SelfCorrecting, Running)
                | (SelfCorrecting, Stopped)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to restart a run after a self-correction
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPayload {
    /// Corrected input for the next attempt
    pub input: String,
    /// Guidance produced by the correction generator
    pub guidance: String,
    /// Checkpoint the run was rewound to
    pub checkpoint_index: usize,
    /// The failure that triggered the rewind
    pub failure: ValidationFailure,
}

/// Rewind state for a single run
#[derive(Debug, Clone)]
pub struct RunTracker {
    state: RunState,
    run_id: Option<String>,
    request: String,
    working_input: String,
    arena: CheckpointArena,
    head: Option<usize>,
    last_safe: Option<usize>,
    attempt: u32,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            run_id: None,
            request: String::new(),
            working_input: String::new(),
            arena: CheckpointArena::new(),
            head: None,
            last_safe: None,
            attempt: 0,
        }
    }

    fn transition(&mut self, to: RunState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(BumpersError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(from = %self.state, to = %to, "Run state transition");
        self.state = to;
        Ok(())
    }

    /// Start the run; records the genesis checkpoint holding the request
    pub fn start(&mut self, request: &str) -> Result<&str> {
        self.transition(RunState::Running)?;
        let genesis = self.arena.push(None, request, None);
        self.request = request.to_string();
        self.working_input = request.to_string();
        self.head = Some(genesis);
        self.last_safe = Some(genesis);
        self.attempt = 1;
        Ok(self.run_id.insert(Uuid::new_v4().to_string()).as_str())
    }

    /// Record a checkpoint after a passing pre-action validation
    pub fn record_safe(&mut self, ctx: &ValidationContext) -> Result<usize> {
        if self.state != RunState::Running {
            return Err(BumpersError::NoActiveRun);
        }

        let action: Arc<str> = match (ctx.action(), ctx.action_input()) {
            (Some(action), Some(input)) => format!("{}: {}", action, input).into(),
            (Some(action), None) => action.into(),
            (None, _) => "(unnamed action)".into(),
        };
        let message = format!("Action: {}", action);
        let index = self.arena.push(self.head, message, Some(action));
        self.head = Some(index);
        self.last_safe = Some(index);
        Ok(index)
    }

    /// Append guidance to the input of the running attempt
    pub fn patch_input(&mut self, guidance: &str) {
        self.working_input = format!("{}\n\n{}", self.working_input, guidance);
    }

    /// Rewind to the last safe checkpoint and build the restart payload
    ///
    /// Moves the run to `SelfCorrecting`. If the generator fails the run
    /// stays `Running` and the error is returned.
    pub fn prepare_restart(
        &mut self,
        generator: &dyn CorrectionGenerator,
        failure: &ValidationFailure,
    ) -> Result<RestartPayload> {
        if self.state != RunState::Running {
            return Err(BumpersError::NoActiveRun);
        }
        let target = self.last_safe.ok_or(BumpersError::NoActiveRun)?;

        let prior = self.arena.content(target);
        let guidance = generator.generate(&prior, failure.message())?;
        let input = format!("{}\n\nOriginal request: {}", guidance, self.request);

        self.transition(RunState::SelfCorrecting)?;
        Ok(RestartPayload {
            input,
            guidance,
            checkpoint_index: target,
            failure: failure.clone(),
        })
    }

    /// Resume after a self-correction with the corrected input
    pub fn resume(&mut self, payload: &RestartPayload) -> Result<usize> {
        self.transition(RunState::Running)?;
        let index = self
            .arena
            .push(Some(payload.checkpoint_index), payload.input.as_str(), None);
        self.head = Some(index);
        self.last_safe = Some(index);
        self.working_input = payload.input.clone();
        self.attempt += 1;
        Ok(index)
    }

    pub fn complete(&mut self) -> Result<()> {
        self.transition(RunState::Completed)
    }

    /// Move to `Stopped` if the run is live; no-op otherwise
    pub fn halt(&mut self) {
        if self.state.can_transition_to(RunState::Stopped) {
            self.state = RunState::Stopped;
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn working_input(&self) -> &str {
        &self.working_input
    }

    pub fn last_safe(&self) -> Option<&Checkpoint> {
        self.last_safe.and_then(|i| self.arena.get(i))
    }

    pub fn checkpoints(&self) -> &CheckpointArena {
        &self.arena
    }

    /// 1 for the first attempt, incremented on every resume
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::TemplateCorrection;
    use crate::error::CorrectionError;
    use crate::types::{CheckResult, FailStrategy, ValidationPoint};

    fn failure(message: &str) -> ValidationFailure {
        ValidationFailure::new(CheckResult::new(
            false,
            message,
            "action_whitelist",
            ValidationPoint::PreAction,
            ValidationContext::new(),
            FailStrategy::SelfCorrect,
        ))
    }

    fn search(query: &str) -> ValidationContext {
        ValidationContext::new()
            .with("action", "search")
            .with("action_input", query)
    }

    #[test]
    fn test_arena_shares_prior_content() {
        let mut arena = CheckpointArena::new();
        let root = arena.push(None, "request", None);
        let a = arena.push(Some(root), "step a", None);
        let b = arena.push(Some(a), "step b", None);
        let branch = arena.push(Some(a), "retry", None);

        assert_eq!(arena.content(b), "request\nstep a\nstep b");
        assert_eq!(arena.content(branch), "request\nstep a\nretry");
        assert!(Arc::ptr_eq(
            &arena.prior_messages(b)[1],
            &arena.prior_messages(branch)[1]
        ));
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn test_start_records_genesis() {
        let mut tracker = RunTracker::new();
        let run_id = tracker.start("Find flights to Oslo").unwrap().to_string();

        assert_eq!(tracker.state(), RunState::Running);
        assert_eq!(tracker.run_id(), Some(run_id.as_str()));
        assert_eq!(tracker.checkpoints().len(), 1);
        assert_eq!(tracker.last_safe().unwrap().index, 0);
        assert_eq!(tracker.attempt(), 1);
    }

    #[test]
    fn test_record_safe_advances_last_safe() {
        let mut tracker = RunTracker::new();
        tracker.start("q").unwrap();
        tracker.record_safe(&search("flights")).unwrap();
        let second = tracker.record_safe(&search("hotels")).unwrap();

        let last = tracker.last_safe().unwrap();
        assert_eq!(last.index, second);
        assert_eq!(last.action.as_deref(), Some("search: hotels"));
    }

    #[test]
    fn test_prepare_restart_payload() {
        let mut tracker = RunTracker::new();
        tracker.start("Find flights").unwrap();
        let safe = tracker.record_safe(&search("flights")).unwrap();

        let gen = TemplateCorrection::new("Blocked: {reason}");
        let payload = tracker
            .prepare_restart(&gen, &failure("Action 'book' is not allowed"))
            .unwrap();

        assert_eq!(tracker.state(), RunState::SelfCorrecting);
        assert_eq!(payload.checkpoint_index, safe);
        assert_eq!(payload.guidance, "Blocked: Action 'book' is not allowed");
        assert_eq!(
            payload.input,
            "Blocked: Action 'book' is not allowed\n\nOriginal request: Find flights"
        );
    }

    #[test]
    fn test_resume_branches_from_rewind_target() {
        let mut tracker = RunTracker::new();
        tracker.start("Find flights").unwrap();
        let safe = tracker.record_safe(&search("flights")).unwrap();
        let payload = tracker
            .prepare_restart(&TemplateCorrection::default(), &failure("blocked"))
            .unwrap();

        let resumed = tracker.resume(&payload).unwrap();

        assert_eq!(tracker.state(), RunState::Running);
        assert_eq!(tracker.checkpoints().get(resumed).unwrap().parent, Some(safe));
        assert_eq!(tracker.working_input(), payload.input);
        assert_eq!(tracker.attempt(), 2);
        assert_eq!(tracker.checkpoints().len(), 3);
    }

    #[test]
    fn test_generator_failure_leaves_run_running() {
        let mut tracker = RunTracker::new();
        tracker.start("q").unwrap();
        let failing = |_: &str, _: &str| -> std::result::Result<String, CorrectionError> {
            Err(CorrectionError::new("model unavailable"))
        };

        let err = tracker.prepare_restart(&failing, &failure("x")).unwrap_err();
        assert_eq!(err.error_code(), "CORRECTION_FAILED");
        assert_eq!(tracker.state(), RunState::Running);
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut tracker = RunTracker::new();
        tracker.start("q").unwrap();
        tracker.complete().unwrap();

        let err = tracker.complete().unwrap_err();
        assert!(matches!(
            err,
            BumpersError::InvalidTransition {
                from: RunState::Completed,
                to: RunState::Completed
            }
        ));
        tracker.halt();
        assert_eq!(tracker.state(), RunState::Completed);
        assert!(tracker.start("again").is_err());
    }

    #[test]
    fn test_record_safe_requires_running() {
        let mut tracker = RunTracker::new();
        assert!(matches!(
            tracker.record_safe(&search("x")),
            Err(BumpersError::NoActiveRun)
        ));
    }
}
