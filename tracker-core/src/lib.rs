//! Roadmap Tracker - Progress Core Library
//!
//! Deterministic, I/O-free rules behind the learning tracker:
//! - Curriculum and progress records (roadmap → sections → topics)
//! - Streak arithmetic on calendar days
//! - XP accrual through a single owned ledger
//! - Threshold badges (tagged requirement variants)
//! - XP levels and the public leaderboard
//! - Suggestion prompts, parsing and static fallbacks
//!
//! Storage, identity and HTTP live in `tracker-server`.

pub mod accrual;
pub mod badges;
pub mod error;
pub mod leaderboard;
pub mod levels;
pub mod logging;
pub mod models;
pub mod recommendations;
pub mod streak;

pub use accrual::{plan_completion, CompletionInput, CompletionOutcome, CompletionPlan, ProgressLedger};
pub use badges::{BadgeEvaluation, BadgeRequirement, RequirementKind, UserStats};
pub use error::CoreError;
pub use models::*;
pub use streak::{next_streak, StreakChange};
