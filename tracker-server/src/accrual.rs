//! Progress Engine - the write path for learner progress
//!
//! Turns completion requests into committed XP, streak, daily activity,
//! roadmap completion and badge awards.
//!
//! ## Consistency
//! ```text
//! request ─► per-user async lock ─► read snapshot ─► plan (tracker-core)
//!                                         ▲                 │
//!                                         │ Conflict        ▼
//!                                         └──── commit (one transaction,
//!                                               CAS on profiles.version)
//! ```
//! The in-process lock serialises requests for one user on this instance;
//! the version check catches writers on other instances. Removing a
//! completion bumps the version too, so a plan built on the old counts
//! never commits. Duplicate
//! completions are detected both before planning and by the store's unique
//! key, and never credit XP twice.

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use tracker_core::accrual::{plan_badges, plan_completion, CompletionInput, CompletionOutcome};
use tracker_core::badges::BadgeEvaluation;
use tracker_core::models::{Profile, ProfileSettings, RoadmapProgress, TopicCompletion, UserBadge, UserId};

use crate::config::AccrualConfig;
use crate::storage::repository::{
    BadgeCommit, CommitOutcome, CompletionCommit, StorageManager, StoreError,
};

/// Prune idle per-user locks once the table grows past this size
const LOCK_TABLE_PRUNE_AT: usize = 4_096;

#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    /// No profile for the caller's identity
    #[error("unknown user {0}")]
    UnknownUser(UserId),
    #[error("unknown topic {0}")]
    UnknownTopic(String),
    #[error("unknown roadmap {0}")]
    UnknownRoadmap(String),
    #[error("topic {topic_id} does not belong to roadmap {roadmap_id}")]
    RoadmapMismatch { topic_id: String, roadmap_id: String },
    /// Compare-and-swap retries exhausted
    #[error("progress for user {0} is being updated concurrently")]
    Contended(UserId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Async mutex per user id
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock();
            if map.len() >= LOCK_TABLE_PRUNE_AT {
                map.retain(|_, l| Arc::strong_count(l) > 1);
            }
            map.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct ProgressEngine {
    storage: Arc<StorageManager>,
    config: AccrualConfig,
    locks: UserLocks,
}

impl ProgressEngine {
    pub fn new(storage: Arc<StorageManager>, config: AccrualConfig) -> Self {
        Self {
            storage,
            config,
            locks: UserLocks::default(),
        }
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    async fn require_profile(&self, user_id: UserId) -> Result<Profile, AccrualError> {
        self.storage
            .profiles
            .get(user_id)
            .await?
            .ok_or(AccrualError::UnknownUser(user_id))
    }

    /// Create the profile on first contact from the identity provider
    pub async fn ensure_profile(
        &self,
        user_id: UserId,
        username: Option<String>,
        display_name: Option<String>,
    ) -> Result<Profile, AccrualError> {
        let profile = Profile::new(user_id, username, display_name);
        Ok(self.storage.profiles.create(&profile).await?)
    }

    pub async fn update_settings(
        &self,
        user_id: UserId,
        settings: &ProfileSettings,
    ) -> Result<Profile, AccrualError> {
        self.storage
            .profiles
            .update_settings(user_id, settings)
            .await?
            .ok_or(AccrualError::UnknownUser(user_id))
    }

    /// Record that `user_id` finished `topic_id` on the caller's local `today`.
    ///
    /// A repeated request succeeds without crediting anything. `roadmap_id`,
    /// when given, must be the topic's roadmap.
    pub async fn complete_topic(
        &self,
        user_id: UserId,
        topic_id: &str,
        roadmap_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<CompletionOutcome, AccrualError> {
        self.require_profile(user_id).await?;

        let topic = self
            .storage
            .roadmaps
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| AccrualError::UnknownTopic(topic_id.to_string()))?;

        if let Some(requested) = roadmap_id {
            if requested != topic.roadmap_id {
                return Err(AccrualError::RoadmapMismatch {
                    topic_id: topic_id.to_string(),
                    roadmap_id: requested.to_string(),
                });
            }
        }

        let roadmap_total_topics = match self.storage.roadmaps.get_roadmap(&topic.roadmap_id).await? {
            Some(roadmap) => roadmap.total_topics,
            None => {
                warn!(topic_id, roadmap_id = %topic.roadmap_id, "Topic references a missing roadmap");
                0
            }
        };

        let _guard = self.locks.acquire(user_id).await;

        for attempt in 1..=self.config.max_commit_retries {
            let profile = self.require_profile(user_id).await?;

            if self.storage.progress.has_completion(user_id, topic_id).await? {
                debug!(user_id, topic_id, "Completion already recorded");
                return Ok(CompletionOutcome::already_recorded(&profile.ledger));
            }

            let counts = self
                .storage
                .progress
                .completion_counts(user_id, Some(&topic.roadmap_id))
                .await?;
            let catalog = self.storage.badges.get_all().await?;
            let owned = self.owned_badge_ids(user_id).await?;

            let input = CompletionInput {
                topic: &topic,
                today,
                topics_completed: counts.topics_completed,
                roadmap_topics_completed: counts.roadmap_topics_completed,
                roadmap_total_topics,
                roadmap_already_completed: counts.roadmap_completed,
                roadmaps_completed: counts.roadmaps_completed,
            };
            let plan = plan_completion(profile.ledger, &input, &catalog, &owned);

            let now = Utc::now();
            let commit = CompletionCommit {
                user_id,
                expected_version: profile.version,
                ledger: plan.ledger,
                completion: TopicCompletion {
                    user_id,
                    topic_id: topic.id.clone(),
                    roadmap_id: topic.roadmap_id.clone(),
                    xp_earned: plan.xp_earned,
                    completed_at: now,
                },
                activity_date: today,
                activity: plan.activity,
                roadmap_completed_at: plan.completes_roadmap.then_some(now),
                badges: user_badges(user_id, &plan.badges, now),
            };

            match self.storage.progress.commit_completion(&commit).await {
                Ok(CommitOutcome::Recorded) => {
                    info!(
                        user_id,
                        topic_id,
                        xp = plan.xp_earned,
                        streak = plan.ledger.current_streak(),
                        change = ?plan.streak_change,
                        "Topic completed"
                    );
                    if plan.completes_roadmap {
                        info!(user_id, roadmap_id = %topic.roadmap_id, "Roadmap completed");
                    }
                    for award in &plan.badges.awards {
                        info!(user_id, badge = %award.name, bonus_xp = award.xp_reward, "Badge awarded");
                    }
                    return Ok(CompletionOutcome::recorded(&plan));
                }
                Ok(CommitOutcome::AlreadyCompleted) => {
                    debug!(user_id, topic_id, "Completion raced with a duplicate");
                    let profile = self.require_profile(user_id).await?;
                    return Ok(CompletionOutcome::already_recorded(&profile.ledger));
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(user_id, topic_id, attempt, "Profile version moved, retrying");
                }
                Err(e) => {
                    error!(user_id, topic_id, "Completion commit failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        Err(AccrualError::Contended(user_id))
    }

    /// Remove a completion. XP, streak, daily activity and badges stay as
    /// they are. Returns whether a completion existed.
    pub async fn uncomplete_topic(
        &self,
        user_id: UserId,
        topic_id: &str,
    ) -> Result<bool, AccrualError> {
        self.require_profile(user_id).await?;
        let _guard = self.locks.acquire(user_id).await;

        let removed = self.storage.progress.delete_completion(user_id, topic_id).await?;
        if removed {
            info!(user_id, topic_id, "Completion removed");
        } else {
            debug!(user_id, topic_id, "No completion to remove");
        }
        Ok(removed)
    }

    /// Run a standalone badge pass against current stats
    pub async fn evaluate_badges(&self, user_id: UserId) -> Result<BadgeEvaluation, AccrualError> {
        let _guard = self.locks.acquire(user_id).await;

        for attempt in 1..=self.config.max_commit_retries {
            let profile = self.require_profile(user_id).await?;
            let counts = self.storage.progress.completion_counts(user_id, None).await?;
            let catalog = self.storage.badges.get_all().await?;
            let owned = self.owned_badge_ids(user_id).await?;

            let (ledger, evaluation) = plan_badges(
                profile.ledger,
                counts.topics_completed,
                counts.roadmaps_completed,
                &catalog,
                &owned,
            );
            if evaluation.is_empty() {
                return Ok(evaluation);
            }

            let commit = BadgeCommit {
                user_id,
                expected_version: profile.version,
                ledger,
                badges: user_badges(user_id, &evaluation, Utc::now()),
            };
            match self.storage.progress.commit_badges(&commit).await {
                Ok(()) => {
                    info!(user_id, badges = ?evaluation.badge_names(), bonus_xp = evaluation.bonus_xp, "Badges awarded");
                    return Ok(evaluation);
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(user_id, attempt, "Profile version moved during badge pass, retrying");
                }
                Err(e) => {
                    error!(user_id, "Badge commit failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        Err(AccrualError::Contended(user_id))
    }

    /// Enrol in a roadmap (idempotent)
    pub async fn start_roadmap(
        &self,
        user_id: UserId,
        roadmap_id: &str,
    ) -> Result<RoadmapProgress, AccrualError> {
        self.require_profile(user_id).await?;
        if self.storage.roadmaps.get_roadmap(roadmap_id).await?.is_none() {
            return Err(AccrualError::UnknownRoadmap(roadmap_id.to_string()));
        }

        let progress = self
            .storage
            .progress
            .start_roadmap(user_id, roadmap_id, Utc::now())
            .await?;
        debug!(user_id, roadmap_id, "Roadmap enrolment ensured");
        Ok(progress)
    }

    async fn owned_badge_ids(&self, user_id: UserId) -> Result<HashSet<String>, AccrualError> {
        Ok(self
            .storage
            .progress
            .owned_badges(user_id)
            .await?
            .into_iter()
            .map(|b| b.badge_id)
            .collect())
    }
}

fn user_badges(
    user_id: UserId,
    evaluation: &BadgeEvaluation,
    earned_at: chrono::DateTime<Utc>,
) -> Vec<UserBadge> {
    evaluation
        .awards
        .iter()
        .map(|award| UserBadge {
            user_id,
            badge_id: award.badge_id.clone(),
            earned_at,
        })
        .collect()
}
