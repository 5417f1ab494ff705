//! Standard deterministic checks
//!
//! Each check has a default name and fail strategy, both overridable with
//! `with_name` / `with_fail_strategy`:
//!
//! | Check | Reads | Default point |
//! |-------|-------|---------------|
//! | [`ActionWhitelist`] | `action` | pre_action |
//! | [`ContentFilter`] | `output` | pre_output |
//! | [`RateLimit`] | (time) | pre_action |
//! | [`PatternCheck`] | `output`, `action_input` | pre_output |
//! | [`ChainLength`] | (count) | pre_action |
//! | [`RedundancyLoop`] | `action`, `action_input` | pre_action |
//! | [`GoalFulfillment`] | `question`, `output` | pre_output |
//! | [`TemporalRelevance`] | `question`, `output` | pre_output |
//!
//! The engine does not enforce the default point; it is where the check
//! is meant to be registered.

mod action;
mod content;
mod goal;
mod pattern;
mod rate_limit;
mod sequence;

pub use action::ActionWhitelist;
pub use content::ContentFilter;
pub use goal::{GoalFulfillment, TemporalRelevance};
pub use pattern::PatternCheck;
pub use rate_limit::RateLimit;
pub use sequence::{ChainLength, RedundancyLoop};
