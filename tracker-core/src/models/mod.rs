//! Curriculum and progress records
//!
//! Catalog records (roadmaps, sections, topics, badges) are static from the
//! engine's point of view. Progress records (completions, daily activity,
//! earned badges, roadmap enrolment) are written only by the accrual engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::accrual::ProgressLedger;
use crate::badges::BadgeRequirement;

/// Identity-provider user id (the profile's primary key)
pub type UserId = i64;

/// Roadmap difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// A learner's profile.
///
/// The XP and streak fields sit behind [`ProgressLedger`]; only the accrual
/// engine mutates them. Display and visibility fields belong to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub ledger: ProgressLedger,
    pub is_public: bool,
    pub show_streak: bool,
    pub show_badges: bool,
    /// Bumped on every engine write; used for compare-and-swap commits
    pub version: i64,
}

impl Profile {
    pub fn new(id: UserId, username: Option<String>, display_name: Option<String>) -> Self {
        Self {
            id,
            username,
            display_name,
            ledger: ProgressLedger::default(),
            is_public: true,
            show_streak: true,
            show_badges: true,
            version: 0,
        }
    }

    /// Best human-readable name for listings
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("Student")
    }
}

/// User-editable profile fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub display_name: Option<String>,
    pub is_public: Option<bool>,
    pub show_streak: Option<bool>,
    pub show_badges: Option<bool>,
}

impl ProfileSettings {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(name) = &self.display_name {
            profile.display_name = Some(name.clone());
        }
        if let Some(v) = self.is_public {
            profile.is_public = v;
        }
        if let Some(v) = self.show_streak {
            profile.show_streak = v;
        }
        if let Some(v) = self.show_badges {
            profile.show_badges = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roadmap {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub difficulty: Difficulty,
    pub estimated_hours: Option<u32>,
    pub is_official: bool,
    pub is_public: bool,
    pub creator_id: Option<UserId>,
    /// Denormalized topic count, recomputed when the catalog is seeded
    pub total_topics: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub roadmap_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Unique within the roadmap
    pub order_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub section_id: String,
    pub roadmap_id: String,
    pub title: String,
    pub description: Option<String>,
    pub order_index: u32,
    pub xp_reward: u32,
    pub estimated_minutes: Option<u32>,
}

/// The fact that a user finished a topic. At most one per (user, topic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCompletion {
    pub user_id: UserId,
    pub topic_id: String,
    pub roadmap_id: String,
    /// Snapshot of the topic's reward at completion time
    pub xp_earned: u32,
    pub completed_at: DateTime<Utc>,
}

/// Per-user, per-day aggregate. One row per (user, date), merged additively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub user_id: UserId,
    pub activity_date: NaiveDate,
    pub topics_completed: u32,
    pub xp_earned: u64,
}

impl DailyActivity {
    pub fn empty(user_id: UserId, activity_date: NaiveDate) -> Self {
        Self {
            user_id,
            activity_date,
            topics_completed: 0,
            xp_earned: 0,
        }
    }

    /// Insert-or-merge-with-addition
    pub fn merge(&mut self, delta: &ActivityDelta) {
        self.topics_completed = self.topics_completed.saturating_add(delta.topics_completed);
        self.xp_earned = self.xp_earned.saturating_add(delta.xp_earned);
    }
}

/// Increment applied to a [`DailyActivity`] row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDelta {
    pub topics_completed: u32,
    pub xp_earned: u64,
}

/// Badge display category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Streak,
    Completion,
    Milestone,
    Special,
}

/// Admin-defined achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub requirement: BadgeRequirement,
    /// Bonus XP granted once, on unlock
    pub xp_reward: u32,
}

/// A badge earned by a user. Never revoked, never re-earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: UserId,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
}

/// Enrolment in a roadmap; `completed_at` is set once every topic is done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapProgress {
    pub user_id: UserId,
    pub roadmap_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Percentage of a roadmap's topics completed, rounded to the nearest integer
pub fn roadmap_percent(completed: u64, total_topics: u32) -> u8 {
    let total = u64::from(total_topics.max(1));
    let pct = (completed.min(total) * 100 + total / 2) / total;
    pct as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_daily_activity_merges_additively() {
        let mut row = DailyActivity::empty(1, date("2024-03-01"));
        row.merge(&ActivityDelta { topics_completed: 1, xp_earned: 20 });
        row.merge(&ActivityDelta { topics_completed: 1, xp_earned: 15 });
        assert_eq!(row.topics_completed, 2);
        assert_eq!(row.xp_earned, 35);
    }

    #[test]
    fn test_roadmap_percent() {
        assert_eq!(roadmap_percent(0, 10), 0);
        assert_eq!(roadmap_percent(1, 3), 33);
        assert_eq!(roadmap_percent(2, 3), 67);
        assert_eq!(roadmap_percent(10, 10), 100);
        // empty roadmaps never divide by zero
        assert_eq!(roadmap_percent(0, 0), 0);
    }

    #[test]
    fn test_profile_settings_only_touch_given_fields() {
        let mut profile = Profile::new(7, Some("ada".into()), None);
        ProfileSettings {
            display_name: Some("Ada L.".into()),
            is_public: Some(false),
            ..Default::default()
        }
        .apply(&mut profile);

        assert_eq!(profile.display_name.as_deref(), Some("Ada L."));
        assert!(!profile.is_public);
        assert!(profile.show_streak);
        assert_eq!(profile.label(), "Ada L.");
    }
}
