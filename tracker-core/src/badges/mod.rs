//! Badge Evaluator
//!
//! Badges are flat threshold rules over a learner's aggregate stats:
//! - Streak length (current streak, in days)
//! - Topics completed (distinct completions)
//! - Roadmaps completed
//! - Total XP
//!
//! A badge unlocks when `stat >= threshold`. No badge depends on another,
//! and a badge that is already owned is never evaluated again.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{Badge, UserBadge};

/// Stored name of a requirement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    StreakDays,
    TopicsCompleted,
    RoadmapsCompleted,
    TotalXp,
}

impl RequirementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementKind::StreakDays => "streak_days",
            RequirementKind::TopicsCompleted => "topics_completed",
            RequirementKind::RoadmapsCompleted => "roadmaps_completed",
            RequirementKind::TotalXp => "total_xp",
        }
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streak_days" => Ok(RequirementKind::StreakDays),
            "topics_completed" => Ok(RequirementKind::TopicsCompleted),
            "roadmaps_completed" => Ok(RequirementKind::RoadmapsCompleted),
            "total_xp" => Ok(RequirementKind::TotalXp),
            other => Err(CoreError::UnknownRequirement(other.to_string())),
        }
    }
}

/// Unlock condition, one variant per requirement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BadgeRequirement {
    StreakDays(u32),
    TopicsCompleted(u64),
    RoadmapsCompleted(u64),
    TotalXp(u64),
}

impl BadgeRequirement {
    /// Build from the stored `(requirement_type, requirement_value)` pair
    pub fn from_parts(kind: &str, value: i64) -> Result<Self, CoreError> {
        let kind: RequirementKind = kind.parse()?;
        if value < 0 {
            return Err(CoreError::NegativeRequirement {
                kind: kind.to_string(),
                value,
            });
        }
        let value = value as u64;
        Ok(match kind {
            RequirementKind::StreakDays => {
                BadgeRequirement::StreakDays(u32::try_from(value).unwrap_or(u32::MAX))
            }
            RequirementKind::TopicsCompleted => BadgeRequirement::TopicsCompleted(value),
            RequirementKind::RoadmapsCompleted => BadgeRequirement::RoadmapsCompleted(value),
            RequirementKind::TotalXp => BadgeRequirement::TotalXp(value),
        })
    }

    pub fn kind(&self) -> RequirementKind {
        match self {
            BadgeRequirement::StreakDays(_) => RequirementKind::StreakDays,
            BadgeRequirement::TopicsCompleted(_) => RequirementKind::TopicsCompleted,
            BadgeRequirement::RoadmapsCompleted(_) => RequirementKind::RoadmapsCompleted,
            BadgeRequirement::TotalXp(_) => RequirementKind::TotalXp,
        }
    }

    pub fn threshold(&self) -> u64 {
        match *self {
            BadgeRequirement::StreakDays(days) => u64::from(days),
            BadgeRequirement::TopicsCompleted(n)
            | BadgeRequirement::RoadmapsCompleted(n)
            | BadgeRequirement::TotalXp(n) => n,
        }
    }

    /// The stat this requirement is measured against
    pub fn observed(&self, stats: &UserStats) -> u64 {
        match self {
            BadgeRequirement::StreakDays(_) => u64::from(stats.current_streak),
            BadgeRequirement::TopicsCompleted(_) => stats.topics_completed,
            BadgeRequirement::RoadmapsCompleted(_) => stats.roadmaps_completed,
            BadgeRequirement::TotalXp(_) => stats.xp_points,
        }
    }

    pub fn is_met(&self, stats: &UserStats) -> bool {
        self.observed(stats) >= self.threshold()
    }

    /// Progress toward the threshold, 0-100
    pub fn progress_percent(&self, stats: &UserStats) -> u8 {
        let threshold = self.threshold();
        if threshold == 0 {
            return 100;
        }
        let observed = self.observed(stats).min(threshold);
        ((observed * 100 + threshold / 2) / threshold) as u8
    }
}

/// Aggregate stats the evaluator reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub xp_points: u64,
    pub current_streak: u32,
    pub topics_completed: u64,
    pub roadmaps_completed: u64,
}

/// A badge unlocked in an evaluation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeAward {
    pub badge_id: String,
    pub name: String,
    pub xp_reward: u32,
}

/// Result of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeEvaluation {
    pub awards: Vec<BadgeAward>,
    pub bonus_xp: u64,
}

impl BadgeEvaluation {
    pub fn is_empty(&self) -> bool {
        self.awards.is_empty()
    }

    pub fn badge_ids(&self) -> Vec<String> {
        self.awards.iter().map(|a| a.badge_id.clone()).collect()
    }

    pub fn badge_names(&self) -> Vec<String> {
        self.awards.iter().map(|a| a.name.clone()).collect()
    }
}

/// Select every catalog badge that is not owned and whose threshold is met.
///
/// Evaluation is against a single stats snapshot: bonuses granted in this
/// pass do not feed back into it.
pub fn evaluate(catalog: &[Badge], owned: &HashSet<String>, stats: &UserStats) -> BadgeEvaluation {
    let mut result = BadgeEvaluation::default();

    for badge in catalog {
        if owned.contains(&badge.id) {
            continue;
        }
        if badge.requirement.is_met(stats) {
            result.bonus_xp += u64::from(badge.xp_reward);
            result.awards.push(BadgeAward {
                badge_id: badge.id.clone(),
                name: badge.name.clone(),
                xp_reward: badge.xp_reward,
            });
        }
    }

    result
}

/// Badge with the viewer's earned state and progress, for the badge grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeStatus {
    pub badge: Badge,
    pub earned_at: Option<DateTime<Utc>>,
    pub current_progress: u64,
    pub progress_percent: u8,
}

impl BadgeStatus {
    pub fn is_earned(&self) -> bool {
        self.earned_at.is_some()
    }
}

/// Annotate every catalog badge, ordered by threshold ascending
pub fn badge_statuses(catalog: &[Badge], earned: &[UserBadge], stats: &UserStats) -> Vec<BadgeStatus> {
    let mut statuses: Vec<BadgeStatus> = catalog
        .iter()
        .map(|badge| {
            let earned_at = earned
                .iter()
                .find(|ub| ub.badge_id == badge.id)
                .map(|ub| ub.earned_at);
            BadgeStatus {
                badge: badge.clone(),
                earned_at,
                current_progress: badge.requirement.observed(stats),
                progress_percent: if earned_at.is_some() {
                    100
                } else {
                    badge.requirement.progress_percent(stats)
                },
            }
        })
        .collect();

    statuses.sort_by_key(|s| s.badge.requirement.threshold());
    statuses
}
