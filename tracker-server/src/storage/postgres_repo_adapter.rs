//! PostgreSQL Repository Adapters
//!
//! Implements the learner-data traits from `repository.rs` using
//! `PostgresStore`. Converts between SQL row types and domain models.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use tracker_core::models::{
    DailyActivity, Profile, ProfileSettings, RoadmapProgress, TopicCompletion, UserBadge, UserId,
};
use tracker_core::ProgressLedger;

use super::postgres::{
    CompletionRow, DailyActivityRow, PostgresError, PostgresStore, ProfileRow,
    RoadmapProgressRow, UserBadgeRow,
};
use super::repository::*;

// ============================================================================
// Type Conversion Helpers
// ============================================================================

fn non_negative(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value}")))
}

fn row_to_profile(row: ProfileRow) -> RepoResult<Profile> {
    let ledger = ProgressLedger::restore(
        non_negative(row.xp_points, "xp_points")?,
        non_negative(row.current_streak.into(), "current_streak")? as u32,
        non_negative(row.longest_streak.into(), "longest_streak")? as u32,
        row.last_activity_date,
    );
    Ok(Profile {
        id: row.id,
        username: row.username,
        display_name: row.display_name,
        ledger,
        is_public: row.is_public,
        show_streak: row.show_streak,
        show_badges: row.show_badges,
        version: row.version,
    })
}

fn row_to_completion(row: CompletionRow) -> TopicCompletion {
    TopicCompletion {
        user_id: row.user_id,
        topic_id: row.topic_id,
        roadmap_id: row.roadmap_id,
        xp_earned: row.xp_earned.max(0) as u32,
        completed_at: row.completed_at,
    }
}

fn row_to_activity(row: DailyActivityRow) -> DailyActivity {
    DailyActivity {
        user_id: row.user_id,
        activity_date: row.activity_date,
        topics_completed: row.topics_completed.max(0) as u32,
        xp_earned: row.xp_earned.max(0) as u64,
    }
}

fn row_to_user_badge(row: UserBadgeRow) -> UserBadge {
    UserBadge {
        user_id: row.user_id,
        badge_id: row.badge_id,
        earned_at: row.earned_at,
    }
}

fn row_to_roadmap_progress(row: RoadmapProgressRow) -> RoadmapProgress {
    RoadmapProgress {
        user_id: row.user_id,
        roadmap_id: row.roadmap_id,
        started_at: row.started_at,
        completed_at: row.completed_at,
        is_active: row.is_active,
    }
}

/// Map a failed compare-and-swap onto the seam's conflict variant
fn map_commit_error(err: PostgresError) -> StoreError {
    match err {
        PostgresError::VersionConflict { user_id, .. } => StoreError::Conflict(user_id),
        other => StoreError::Postgres(other),
    }
}

// ============================================================================
// Profile Repository
// ============================================================================

pub struct PgProfileRepo {
    store: Arc<PostgresStore>,
}

impl PgProfileRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProfileRepo for PgProfileRepo {
    async fn get(&self, id: UserId) -> RepoResult<Option<Profile>> {
        self.store.get_profile(id).await?.map(row_to_profile).transpose()
    }

    async fn create(&self, profile: &Profile) -> RepoResult<Profile> {
        let row = self
            .store
            .insert_profile(
                profile.id,
                profile.username.as_deref(),
                profile.display_name.as_deref(),
            )
            .await?;
        row_to_profile(row)
    }

    async fn update_settings(
        &self,
        id: UserId,
        settings: &ProfileSettings,
    ) -> RepoResult<Option<Profile>> {
        self.store
            .update_profile_settings(
                id,
                settings.display_name.as_deref(),
                settings.is_public,
                settings.show_streak,
                settings.show_badges,
            )
            .await?
            .map(row_to_profile)
            .transpose()
    }

    async fn public_profiles(&self, limit: usize) -> RepoResult<Vec<Profile>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.store
            .public_profiles(limit)
            .await?
            .into_iter()
            .map(row_to_profile)
            .collect()
    }
}

// ============================================================================
// Progress Repository
// ============================================================================

pub struct PgProgressRepo {
    store: Arc<PostgresStore>,
}

impl PgProgressRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProgressRepo for PgProgressRepo {
    async fn has_completion(&self, user_id: UserId, topic_id: &str) -> RepoResult<bool> {
        Ok(self.store.has_completion(user_id, topic_id).await?)
    }

    async fn completion_counts(
        &self,
        user_id: UserId,
        roadmap_id: Option<&str>,
    ) -> RepoResult<CompletionCounts> {
        let row = self.store.completion_counts(user_id, roadmap_id).await?;
        Ok(CompletionCounts {
            topics_completed: non_negative(row.topics_completed, "topics_completed")?,
            roadmap_topics_completed: non_negative(
                row.roadmap_topics_completed,
                "roadmap_topics_completed",
            )?,
            roadmap_completed: row.roadmap_completed,
            roadmaps_completed: non_negative(row.roadmaps_completed, "roadmaps_completed")?,
        })
    }

    async fn completions(
        &self,
        user_id: UserId,
        roadmap_id: Option<&str>,
    ) -> RepoResult<Vec<TopicCompletion>> {
        let rows = self.store.completions(user_id, roadmap_id).await?;
        Ok(rows.into_iter().map(row_to_completion).collect())
    }

    async fn owned_badges(&self, user_id: UserId) -> RepoResult<Vec<UserBadge>> {
        let rows = self.store.user_badges(user_id).await?;
        Ok(rows.into_iter().map(row_to_user_badge).collect())
    }

    async fn daily_activity(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> RepoResult<Vec<DailyActivity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self.store.daily_activity(user_id, limit).await?;
        Ok(rows.into_iter().map(row_to_activity).collect())
    }

    async fn roadmap_progress(&self, user_id: UserId) -> RepoResult<Vec<RoadmapProgress>> {
        let rows = self.store.roadmap_progress(user_id).await?;
        Ok(rows.into_iter().map(row_to_roadmap_progress).collect())
    }

    async fn start_roadmap(
        &self,
        user_id: UserId,
        roadmap_id: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<RoadmapProgress> {
        let row = self.store.start_roadmap(user_id, roadmap_id, at).await?;
        Ok(row_to_roadmap_progress(row))
    }

    async fn commit_completion(&self, commit: &CompletionCommit) -> RepoResult<CommitOutcome> {
        let recorded = self
            .store
            .commit_completion(commit)
            .await
            .map_err(map_commit_error)?;
        Ok(if recorded {
            CommitOutcome::Recorded
        } else {
            CommitOutcome::AlreadyCompleted
        })
    }

    async fn commit_badges(&self, commit: &BadgeCommit) -> RepoResult<()> {
        self.store
            .commit_badges(commit)
            .await
            .map_err(map_commit_error)
    }

    async fn delete_completion(&self, user_id: UserId, topic_id: &str) -> RepoResult<bool> {
        Ok(self.store.delete_completion(user_id, topic_id).await?)
    }
}
