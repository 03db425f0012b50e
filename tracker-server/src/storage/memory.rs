//! In-memory learner store
//!
//! Same contract as the PostgreSQL adapters, backed by ordered maps behind a
//! single `RwLock`. Every commit happens under the write lock, so a commit
//! is all-or-nothing exactly like the database transaction. Used for tests
//! and for `STORAGE_BACKEND=memory` local runs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracker_core::models::{
    DailyActivity, Profile, ProfileSettings, RoadmapProgress, TopicCompletion, UserBadge, UserId,
};
use tracker_core::ProgressLedger;

use super::repository::*;

#[derive(Default)]
struct MemoryState {
    profiles: BTreeMap<UserId, Profile>,
    completions: BTreeMap<(UserId, String), TopicCompletion>,
    activity: BTreeMap<(UserId, NaiveDate), DailyActivity>,
    badges: BTreeMap<(UserId, String), UserBadge>,
    roadmaps: BTreeMap<(UserId, String), RoadmapProgress>,
}

impl MemoryState {
    /// Compare-and-swap the engine-owned profile fields
    fn swap_ledger(
        &mut self,
        user_id: UserId,
        expected_version: i64,
        ledger: ProgressLedger,
    ) -> RepoResult<()> {
        let profile = self
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {user_id}")))?;
        if profile.version != expected_version {
            return Err(StoreError::Conflict(user_id));
        }
        profile.ledger = ledger;
        profile.version += 1;
        Ok(())
    }

    fn insert_badges(&mut self, badges: &[UserBadge]) {
        for badge in badges {
            self.badges
                .entry((badge.user_id, badge.badge_id.clone()))
                .or_insert_with(|| badge.clone());
        }
    }
}

/// Cloneable handle; clones share state
#[derive(Clone, Default)]
pub struct MemoryProgressStore {
    state: Arc<RwLock<MemoryState>>,
    injected_conflicts: Arc<AtomicU32>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with a version conflict before
    /// touching any state. Exercises the engine's retry path.
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Number of stored completion rows for a user
    pub fn completion_count(&self, user_id: UserId) -> usize {
        self.state
            .read()
            .completions
            .keys()
            .filter(|(uid, _)| *uid == user_id)
            .count()
    }
}

#[async_trait]
impl ProfileRepo for MemoryProgressStore {
    async fn get(&self, id: UserId) -> RepoResult<Option<Profile>> {
        Ok(self.state.read().profiles.get(&id).cloned())
    }

    async fn create(&self, profile: &Profile) -> RepoResult<Profile> {
        let mut state = self.state.write();
        let stored = state
            .profiles
            .entry(profile.id)
            .or_insert_with(|| profile.clone());
        Ok(stored.clone())
    }

    async fn update_settings(
        &self,
        id: UserId,
        settings: &ProfileSettings,
    ) -> RepoResult<Option<Profile>> {
        let mut state = self.state.write();
        Ok(state.profiles.get_mut(&id).map(|profile| {
            settings.apply(profile);
            profile.clone()
        }))
    }

    async fn public_profiles(&self, limit: usize) -> RepoResult<Vec<Profile>> {
        let state = self.state.read();
        let mut public: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| p.is_public)
            .cloned()
            .collect();
        public.sort_by(|a, b| {
            b.ledger
                .xp_points()
                .cmp(&a.ledger.xp_points())
                .then(a.id.cmp(&b.id))
        });
        public.truncate(limit);
        Ok(public)
    }
}

#[async_trait]
impl ProgressRepo for MemoryProgressStore {
    async fn has_completion(&self, user_id: UserId, topic_id: &str) -> RepoResult<bool> {
        Ok(self
            .state
            .read()
            .completions
            .contains_key(&(user_id, topic_id.to_string())))
    }

    async fn completion_counts(
        &self,
        user_id: UserId,
        roadmap_id: Option<&str>,
    ) -> RepoResult<CompletionCounts> {
        let state = self.state.read();
        let mut counts = CompletionCounts::default();

        for c in state.completions.values().filter(|c| c.user_id == user_id) {
            counts.topics_completed += 1;
            if Some(c.roadmap_id.as_str()) == roadmap_id {
                counts.roadmap_topics_completed += 1;
            }
        }
        for p in state.roadmaps.values().filter(|p| p.user_id == user_id) {
            if p.completed_at.is_some() {
                counts.roadmaps_completed += 1;
                if Some(p.roadmap_id.as_str()) == roadmap_id {
                    counts.roadmap_completed = true;
                }
            }
        }
        Ok(counts)
    }

    async fn completions(
        &self,
        user_id: UserId,
        roadmap_id: Option<&str>,
    ) -> RepoResult<Vec<TopicCompletion>> {
        let state = self.state.read();
        let mut rows: Vec<TopicCompletion> = state
            .completions
            .values()
            .filter(|c| c.user_id == user_id)
            .filter(|c| roadmap_id.map_or(true, |r| c.roadmap_id == r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| a.topic_id.cmp(&b.topic_id))
        });
        Ok(rows)
    }

    async fn owned_badges(&self, user_id: UserId) -> RepoResult<Vec<UserBadge>> {
        let state = self.state.read();
        let mut rows: Vec<UserBadge> = state
            .badges
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.earned_at
                .cmp(&b.earned_at)
                .then_with(|| a.badge_id.cmp(&b.badge_id))
        });
        Ok(rows)
    }

    async fn daily_activity(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> RepoResult<Vec<DailyActivity>> {
        let state = self.state.read();
        Ok(state
            .activity
            .range((user_id, NaiveDate::MIN)..=(user_id, NaiveDate::MAX))
            .rev()
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn roadmap_progress(&self, user_id: UserId) -> RepoResult<Vec<RoadmapProgress>> {
        let state = self.state.read();
        let mut rows: Vec<RoadmapProgress> = state
            .roadmaps
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(rows)
    }

    async fn start_roadmap(
        &self,
        user_id: UserId,
        roadmap_id: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<RoadmapProgress> {
        let mut state = self.state.write();
        let row = state
            .roadmaps
            .entry((user_id, roadmap_id.to_string()))
            .or_insert_with(|| RoadmapProgress {
                user_id,
                roadmap_id: roadmap_id.to_string(),
                started_at: at,
                completed_at: None,
                is_active: true,
            });
        Ok(row.clone())
    }

    async fn commit_completion(&self, commit: &CompletionCommit) -> RepoResult<CommitOutcome> {
        let mut state = self.state.write();

        let key = (commit.user_id, commit.completion.topic_id.clone());
        if state.completions.contains_key(&key) {
            return Ok(CommitOutcome::AlreadyCompleted);
        }
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict(commit.user_id));
        }

        state.swap_ledger(commit.user_id, commit.expected_version, commit.ledger)?;
        state.completions.insert(key, commit.completion.clone());

        state
            .activity
            .entry((commit.user_id, commit.activity_date))
            .or_insert_with(|| DailyActivity::empty(commit.user_id, commit.activity_date))
            .merge(&commit.activity);

        if let Some(completed_at) = commit.roadmap_completed_at {
            let progress = state
                .roadmaps
                .entry((commit.user_id, commit.completion.roadmap_id.clone()))
                .or_insert_with(|| RoadmapProgress {
                    user_id: commit.user_id,
                    roadmap_id: commit.completion.roadmap_id.clone(),
                    started_at: completed_at,
                    completed_at: None,
                    is_active: true,
                });
            progress.completed_at.get_or_insert(completed_at);
        }

        state.insert_badges(&commit.badges);
        Ok(CommitOutcome::Recorded)
    }

    async fn commit_badges(&self, commit: &BadgeCommit) -> RepoResult<()> {
        let mut state = self.state.write();
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict(commit.user_id));
        }
        state.swap_ledger(commit.user_id, commit.expected_version, commit.ledger)?;
        state.insert_badges(&commit.badges);
        Ok(())
    }

    async fn delete_completion(&self, user_id: UserId, topic_id: &str) -> RepoResult<bool> {
        let mut state = self.state.write();
        let removed = state
            .completions
            .remove(&(user_id, topic_id.to_string()))
            .is_some();
        if removed {
            // Plans built before this delete counted the row; make their commit stale.
            if let Some(profile) = state.profiles.get_mut(&user_id) {
                profile.version += 1;
            }
        }
        Ok(removed)
    }
}
