//! Read models for the dashboard, badge board, roadmap pages and leaderboard
//!
//! Everything here is computed on read from the stores. Nothing in this
//! module writes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracker_core::badges::{badge_statuses, BadgeStatus};
use tracker_core::leaderboard::{rank_profiles, LeaderboardEntry};
use tracker_core::levels::{level_progress, LevelProgress};
use tracker_core::models::{
    roadmap_percent, DailyActivity, Profile, Roadmap, RoadmapProgress, Section, Topic, UserId,
};
use tracker_core::recommendations::SuggestionContext;

use crate::accrual::AccrualError;
use crate::storage::repository::StorageManager;

/// Topics listed in a suggestion prompt
const RECENT_TOPICS_FOR_PROMPT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ActiveRoadmap {
    pub roadmap_id: String,
    pub title: String,
    pub completed_topics: u64,
    pub total_topics: u32,
    pub percent: u8,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub total_xp: u64,
    pub level: LevelProgress,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub topics_completed: u64,
    pub roadmaps_completed: u64,
    pub badges_earned: usize,
    pub roadmaps: Vec<ActiveRoadmap>,
    /// Newest first
    pub recent_activity: Vec<DailyActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    #[serde(flatten)]
    pub topic: Topic,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    #[serde(flatten)]
    pub section: Section,
    pub topics: Vec<TopicView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoadmapOverview {
    pub roadmap: Roadmap,
    pub sections: Vec<SectionView>,
    pub completed_topics: u64,
    pub percent: u8,
    pub enrolment: Option<RoadmapProgress>,
}

/// What other learners may see of a profile
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub total_xp: u64,
    pub level: LevelProgress,
    pub current_streak: Option<u32>,
    pub badges: Option<Vec<String>>,
}

pub struct Dashboard {
    storage: Arc<StorageManager>,
    activity_window_days: usize,
}

impl Dashboard {
    pub fn new(storage: Arc<StorageManager>, activity_window_days: usize) -> Self {
        Self {
            storage,
            activity_window_days,
        }
    }

    async fn require_profile(&self, user_id: UserId) -> Result<Profile, AccrualError> {
        self.storage
            .profiles
            .get(user_id)
            .await?
            .ok_or(AccrualError::UnknownUser(user_id))
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Profile, AccrualError> {
        self.require_profile(user_id).await
    }

    pub async fn stats(&self, user_id: UserId) -> Result<StatsView, AccrualError> {
        let profile = self.require_profile(user_id).await?;
        let progress = &self.storage.progress;

        let counts = progress.completion_counts(user_id, None).await?;
        let completions = progress.completions(user_id, None).await?;
        let badges = progress.owned_badges(user_id).await?;
        let recent_activity = progress
            .daily_activity(user_id, self.activity_window_days)
            .await?;

        let mut per_roadmap: HashMap<&str, u64> = HashMap::new();
        for c in &completions {
            *per_roadmap.entry(c.roadmap_id.as_str()).or_default() += 1;
        }

        let mut roadmaps = Vec::new();
        for enrolment in progress.roadmap_progress(user_id).await? {
            let Some(roadmap) = self.storage.roadmaps.get_roadmap(&enrolment.roadmap_id).await? else {
                continue;
            };
            let completed_topics = per_roadmap.get(roadmap.id.as_str()).copied().unwrap_or(0);
            roadmaps.push(ActiveRoadmap {
                percent: roadmap_percent(completed_topics, roadmap.total_topics),
                roadmap_id: roadmap.id,
                title: roadmap.title,
                completed_topics,
                total_topics: roadmap.total_topics,
                started_at: enrolment.started_at,
                completed_at: enrolment.completed_at,
            });
        }

        let ledger = profile.ledger;
        Ok(StatsView {
            user_id,
            username: profile.username,
            display_name: profile.display_name,
            total_xp: ledger.xp_points(),
            level: level_progress(ledger.xp_points()),
            current_streak: ledger.current_streak(),
            longest_streak: ledger.longest_streak(),
            last_activity_date: ledger.last_activity_date(),
            topics_completed: counts.topics_completed,
            roadmaps_completed: counts.roadmaps_completed,
            badges_earned: badges.len(),
            roadmaps,
            recent_activity,
        })
    }

    /// Every catalog badge with the caller's earned state and progress
    pub async fn badge_board(&self, user_id: UserId) -> Result<Vec<BadgeStatus>, AccrualError> {
        let profile = self.require_profile(user_id).await?;
        let counts = self.storage.progress.completion_counts(user_id, None).await?;
        let earned = self.storage.progress.owned_badges(user_id).await?;
        let catalog = self.storage.badges.get_all().await?;

        let stats = profile
            .ledger
            .stats(counts.topics_completed, counts.roadmaps_completed);
        Ok(badge_statuses(&catalog, &earned, &stats))
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AccrualError> {
        let profiles = self.storage.profiles.public_profiles(limit).await?;
        Ok(rank_profiles(&profiles, limit))
    }

    /// `None` when the profile does not exist or is private
    pub async fn public_profile(&self, user_id: UserId) -> Result<Option<PublicProfile>, AccrualError> {
        let Some(profile) = self.storage.profiles.get(user_id).await? else {
            return Ok(None);
        };
        if !profile.is_public {
            return Ok(None);
        }

        let badges = if profile.show_badges {
            let catalog = self.storage.badges.get_all().await?;
            let names: HashMap<&str, &str> = catalog
                .iter()
                .map(|b| (b.id.as_str(), b.name.as_str()))
                .collect();
            let earned = self.storage.progress.owned_badges(user_id).await?;
            Some(
                earned
                    .iter()
                    .map(|b| names.get(b.badge_id.as_str()).map_or(b.badge_id.clone(), |n| n.to_string()))
                    .collect(),
            )
        } else {
            None
        };

        let ledger = profile.ledger;
        Ok(Some(PublicProfile {
            user_id,
            username: profile.username,
            display_name: profile.display_name,
            total_xp: ledger.xp_points(),
            level: level_progress(ledger.xp_points()),
            current_streak: profile.show_streak.then(|| ledger.current_streak()),
            badges,
        }))
    }

    pub async fn list_roadmaps(&self) -> Result<Vec<Roadmap>, AccrualError> {
        Ok(self.storage.roadmaps.list_roadmaps(true).await?)
    }

    pub async fn roadmap_overview(
        &self,
        user_id: UserId,
        roadmap_id: &str,
    ) -> Result<RoadmapOverview, AccrualError> {
        let roadmap = self
            .storage
            .roadmaps
            .get_roadmap(roadmap_id)
            .await?
            .ok_or_else(|| AccrualError::UnknownRoadmap(roadmap_id.to_string()))?;

        let sections = self.storage.roadmaps.sections(roadmap_id).await?;
        let topics = self.storage.roadmaps.topics(roadmap_id).await?;
        let done: HashSet<String> = self
            .storage
            .progress
            .completions(user_id, Some(roadmap_id))
            .await?
            .into_iter()
            .map(|c| c.topic_id)
            .collect();

        let mut by_section: HashMap<String, Vec<TopicView>> = HashMap::new();
        for topic in topics {
            let completed = done.contains(&topic.id);
            by_section
                .entry(topic.section_id.clone())
                .or_default()
                .push(TopicView { topic, completed });
        }

        let sections = sections
            .into_iter()
            .map(|section| SectionView {
                topics: by_section.remove(&section.id).unwrap_or_default(),
                section,
            })
            .collect();

        let enrolment = self
            .storage
            .progress
            .roadmap_progress(user_id)
            .await?
            .into_iter()
            .find(|p| p.roadmap_id == roadmap_id);

        let completed_topics = done.len() as u64;
        Ok(RoadmapOverview {
            percent: roadmap_percent(completed_topics, roadmap.total_topics),
            roadmap,
            sections,
            completed_topics,
            enrolment,
        })
    }

    /// Learner context for the suggestion prompt
    pub async fn suggestion_context(&self, user_id: UserId) -> Result<SuggestionContext, AccrualError> {
        let profile = self.require_profile(user_id).await?;

        let mut active_roadmaps = Vec::new();
        for enrolment in self.storage.progress.roadmap_progress(user_id).await? {
            if !enrolment.is_active || enrolment.completed_at.is_some() {
                continue;
            }
            if let Some(roadmap) = self.storage.roadmaps.get_roadmap(&enrolment.roadmap_id).await? {
                active_roadmaps.push(roadmap.title);
            }
        }

        let mut recent_topics = Vec::new();
        for completion in self
            .storage
            .progress
            .completions(user_id, None)
            .await?
            .into_iter()
            .take(RECENT_TOPICS_FOR_PROMPT)
        {
            if let Some(topic) = self.storage.roadmaps.get_topic(&completion.topic_id).await? {
                recent_topics.push(topic.title);
            }
        }

        Ok(SuggestionContext {
            display_name: profile.display_name.or(profile.username),
            total_xp: profile.ledger.xp_points(),
            current_streak: profile.ledger.current_streak(),
            active_roadmaps,
            recent_topics,
        })
    }
}
