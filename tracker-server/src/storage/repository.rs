//! Repository traits - abstraction layer for data access
//!
//! The accrual engine and the read models talk to storage only through these
//! traits, so the progress backend can be swapped (PostgreSQL in production,
//! in-memory for tests and local runs) without touching engine code.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use tracker_core::models::{
    ActivityDelta, Badge, DailyActivity, Profile, ProfileSettings, Roadmap, RoadmapProgress,
    Section, Topic, TopicCompletion, UserBadge, UserId,
};
use tracker_core::ProgressLedger;

use super::lmdb_catalog::CatalogStoreError;
use super::postgres::PostgresError;

/// Error surfaced at the repository seam
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogStoreError),
    #[error("database error: {0}")]
    Postgres(#[from] PostgresError),
    /// Compare-and-swap on the profile version failed
    #[error("profile {0} was modified concurrently")]
    Conflict(UserId),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid stored data: {0}")]
    Corrupt(String),
}

/// Generic result type for repository operations
pub type RepoResult<T> = Result<T, StoreError>;

// ============================================================================
// Commit payloads
// ============================================================================

/// Everything a single CompleteTopic writes, committed atomically
#[derive(Debug, Clone)]
pub struct CompletionCommit {
    pub user_id: UserId,
    /// Profile version the plan was computed against
    pub expected_version: i64,
    pub ledger: ProgressLedger,
    pub completion: TopicCompletion,
    pub activity_date: NaiveDate,
    pub activity: ActivityDelta,
    /// Set when this completion finishes the roadmap
    pub roadmap_completed_at: Option<DateTime<Utc>>,
    pub badges: Vec<UserBadge>,
}

/// A standalone badge pass
#[derive(Debug, Clone)]
pub struct BadgeCommit {
    pub user_id: UserId,
    pub expected_version: i64,
    pub ledger: ProgressLedger,
    pub badges: Vec<UserBadge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Recorded,
    /// A completion for (user, topic) already existed; nothing was written
    AlreadyCompleted,
}

/// Counts feeding completion planning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionCounts {
    pub topics_completed: u64,
    pub roadmap_topics_completed: u64,
    pub roadmap_completed: bool,
    pub roadmaps_completed: u64,
}

// ============================================================================
// Catalog Repositories (Read-only, LMDB-backed)
// ============================================================================

/// Repository for roadmaps, sections and topics
#[async_trait]
pub trait RoadmapCatalogRepo: Send + Sync {
    async fn get_roadmap(&self, id: &str) -> RepoResult<Option<Roadmap>>;
    async fn list_roadmaps(&self, public_only: bool) -> RepoResult<Vec<Roadmap>>;
    /// Sections of a roadmap ordered by `order_index`
    async fn sections(&self, roadmap_id: &str) -> RepoResult<Vec<Section>>;
    /// Topics of a roadmap ordered by (section order, topic order)
    async fn topics(&self, roadmap_id: &str) -> RepoResult<Vec<Topic>>;
    async fn get_topic(&self, id: &str) -> RepoResult<Option<Topic>>;
}

/// Repository for badge definitions
#[async_trait]
pub trait BadgeCatalogRepo: Send + Sync {
    async fn get(&self, id: &str) -> RepoResult<Option<Badge>>;
    /// All badges ordered by requirement threshold ascending
    async fn get_all(&self) -> RepoResult<Vec<Badge>>;
}

// ============================================================================
// Learner Data Repositories (Read-write)
// ============================================================================

#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn get(&self, id: UserId) -> RepoResult<Option<Profile>>;
    /// Insert if absent; returns the stored profile either way
    async fn create(&self, profile: &Profile) -> RepoResult<Profile>;
    async fn update_settings(
        &self,
        id: UserId,
        settings: &ProfileSettings,
    ) -> RepoResult<Option<Profile>>;
    /// Public profiles ordered by XP descending, then id ascending
    async fn public_profiles(&self, limit: usize) -> RepoResult<Vec<Profile>>;
}

#[async_trait]
pub trait ProgressRepo: Send + Sync {
    async fn has_completion(&self, user_id: UserId, topic_id: &str) -> RepoResult<bool>;
    /// Roadmap-scoped fields are zero/false when `roadmap_id` is `None`
    async fn completion_counts(
        &self,
        user_id: UserId,
        roadmap_id: Option<&str>,
    ) -> RepoResult<CompletionCounts>;
    /// Completions newest first, optionally limited to one roadmap
    async fn completions(
        &self,
        user_id: UserId,
        roadmap_id: Option<&str>,
    ) -> RepoResult<Vec<TopicCompletion>>;
    async fn owned_badges(&self, user_id: UserId) -> RepoResult<Vec<UserBadge>>;
    /// Daily activity rows newest first
    async fn daily_activity(&self, user_id: UserId, limit: usize)
        -> RepoResult<Vec<DailyActivity>>;
    async fn roadmap_progress(&self, user_id: UserId) -> RepoResult<Vec<RoadmapProgress>>;
    /// Idempotent: returns the existing row when already enrolled
    async fn start_roadmap(
        &self,
        user_id: UserId,
        roadmap_id: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<RoadmapProgress>;
    /// Atomic commit of one completion. `Err(StoreError::Conflict)` when the
    /// profile version moved.
    async fn commit_completion(&self, commit: &CompletionCommit) -> RepoResult<CommitOutcome>;
    async fn commit_badges(&self, commit: &BadgeCommit) -> RepoResult<()>;
    /// Removes the completion row and bumps the profile version
    async fn delete_completion(&self, user_id: UserId, topic_id: &str) -> RepoResult<bool>;
}

// ============================================================================
// Unified Storage Manager
// ============================================================================

/// Central storage manager that holds all repositories
pub struct StorageManager {
    // Catalog (LMDB)
    pub roadmaps: Box<dyn RoadmapCatalogRepo>,
    pub badges: Box<dyn BadgeCatalogRepo>,

    // Learner data (PostgreSQL or in-memory)
    pub profiles: Box<dyn ProfileRepo>,
    pub progress: Box<dyn ProgressRepo>,
}
