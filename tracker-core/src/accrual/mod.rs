//! XP and streak accrual
//!
//! [`ProgressLedger`] is the one aggregate that holds a learner's XP and
//! streak counters. Its fields are private: completions and badge bonuses
//! are the only ways to change them, so XP never decreases and
//! `longest_streak >= current_streak` holds after every mutation.
//!
//! [`plan_completion`] turns a completion request into everything the store
//! must write in one commit.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::badges::{self, BadgeEvaluation, UserStats};
use crate::models::{ActivityDelta, Badge, Topic};
use crate::streak::{next_streak, StreakChange};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressLedger {
    xp_points: u64,
    current_streak: u32,
    longest_streak: u32,
    last_activity_date: Option<NaiveDate>,
}

impl ProgressLedger {
    /// Rebuild from persisted columns. A stored `longest_streak` below the
    /// current streak is lifted to it.
    pub fn restore(
        xp_points: u64,
        current_streak: u32,
        longest_streak: u32,
        last_activity_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            xp_points,
            current_streak,
            longest_streak: longest_streak.max(current_streak),
            last_activity_date,
        }
    }

    pub fn xp_points(&self) -> u64 {
        self.xp_points
    }

    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    pub fn longest_streak(&self) -> u32 {
        self.longest_streak
    }

    pub fn last_activity_date(&self) -> Option<NaiveDate> {
        self.last_activity_date
    }

    /// Credit a topic completion made on `today`.
    ///
    /// The last-activity date only moves forward, so a backwards local date
    /// cannot shorten the next gap computation.
    pub fn record_completion(&mut self, xp_earned: u32, today: NaiveDate) -> StreakChange {
        let (streak, change) = next_streak(self.last_activity_date, today, self.current_streak);

        self.xp_points = self.xp_points.saturating_add(u64::from(xp_earned));
        self.current_streak = streak;
        self.longest_streak = self.longest_streak.max(streak);
        self.last_activity_date = match self.last_activity_date {
            Some(last) if last > today => Some(last),
            _ => Some(today),
        };

        change
    }

    pub fn grant_badge_bonus(&mut self, bonus_xp: u64) {
        self.xp_points = self.xp_points.saturating_add(bonus_xp);
    }

    pub fn stats(&self, topics_completed: u64, roadmaps_completed: u64) -> UserStats {
        UserStats {
            xp_points: self.xp_points,
            current_streak: self.current_streak,
            topics_completed,
            roadmaps_completed,
        }
    }
}

/// What the store reported about the learner before this completion
#[derive(Debug, Clone, Copy)]
pub struct CompletionInput<'a> {
    pub topic: &'a Topic,
    pub today: NaiveDate,
    /// Distinct completions across all roadmaps
    pub topics_completed: u64,
    /// Distinct completions within the topic's roadmap
    pub roadmap_topics_completed: u64,
    pub roadmap_total_topics: u32,
    pub roadmap_already_completed: bool,
    pub roadmaps_completed: u64,
}

/// Everything one completion writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPlan {
    pub ledger: ProgressLedger,
    pub xp_earned: u32,
    pub streak_change: StreakChange,
    pub activity: ActivityDelta,
    /// This completion finishes the roadmap for the first time
    pub completes_roadmap: bool,
    pub badges: BadgeEvaluation,
}

/// Plan a completion against a ledger snapshot.
///
/// Order: credit topic XP and streak, mark the roadmap if this was its last
/// open topic, evaluate badges on the resulting stats, then add the badge
/// bonuses.
pub fn plan_completion(
    mut ledger: ProgressLedger,
    input: &CompletionInput<'_>,
    catalog: &[Badge],
    owned: &HashSet<String>,
) -> CompletionPlan {
    let xp_earned = input.topic.xp_reward;
    let streak_change = ledger.record_completion(xp_earned, input.today);

    let completes_roadmap = !input.roadmap_already_completed
        && input.roadmap_total_topics > 0
        && input.roadmap_topics_completed + 1 >= u64::from(input.roadmap_total_topics);

    let roadmaps_completed = input.roadmaps_completed + u64::from(completes_roadmap);
    let stats = ledger.stats(input.topics_completed + 1, roadmaps_completed);
    let badges = badges::evaluate(catalog, owned, &stats);
    ledger.grant_badge_bonus(badges.bonus_xp);

    CompletionPlan {
        ledger,
        xp_earned,
        streak_change,
        activity: ActivityDelta {
            topics_completed: 1,
            xp_earned: u64::from(xp_earned),
        },
        completes_roadmap,
        badges,
    }
}

/// Plan a standalone badge pass (no completion involved)
pub fn plan_badges(
    mut ledger: ProgressLedger,
    topics_completed: u64,
    roadmaps_completed: u64,
    catalog: &[Badge],
    owned: &HashSet<String>,
) -> (ProgressLedger, BadgeEvaluation) {
    let stats = ledger.stats(topics_completed, roadmaps_completed);
    let badges = badges::evaluate(catalog, owned, &stats);
    ledger.grant_badge_bonus(badges.bonus_xp);
    (ledger, badges)
}

/// Result surfaced to the caller after CompleteTopic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub completion_recorded: bool,
    pub xp_earned: u32,
    pub new_streak: u32,
    pub longest_streak: u32,
    pub total_xp: u64,
    pub new_badges: Vec<String>,
    pub badge_xp: u64,
    pub roadmap_completed: bool,
}

impl CompletionOutcome {
    pub fn recorded(plan: &CompletionPlan) -> Self {
        Self {
            completion_recorded: true,
            xp_earned: plan.xp_earned,
            new_streak: plan.ledger.current_streak(),
            longest_streak: plan.ledger.longest_streak(),
            total_xp: plan.ledger.xp_points(),
            new_badges: plan.badges.badge_names(),
            badge_xp: plan.badges.bonus_xp,
            roadmap_completed: plan.completes_roadmap,
        }
    }

    /// Duplicate request: nothing credited
    pub fn already_recorded(ledger: &ProgressLedger) -> Self {
        Self {
            completion_recorded: false,
            xp_earned: 0,
            new_streak: ledger.current_streak(),
            longest_streak: ledger.longest_streak(),
            total_xp: ledger.xp_points(),
            new_badges: Vec::new(),
            badge_xp: 0,
            roadmap_completed: false,
        }
    }
}
