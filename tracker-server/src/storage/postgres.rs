//! PostgreSQL Storage - Learner progress persistence
//!
//! Profiles, completions, daily activity, earned badges and roadmap
//! enrolment. Uses `sqlx` with runtime-checked queries.
//!
//! ## Tables
//! - profiles (engine counters + `version` for compare-and-swap)
//! - topic_completions, daily_activity
//! - user_badges, user_roadmap_progress
//!
//! Completion commits run in one transaction: the completion insert, the
//! versioned profile update, the additive daily activity upsert, roadmap
//! completion and badge inserts either all land or none do.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::{debug, info};

use tracker_core::models::UserBadge;
use tracker_core::ProgressLedger;

use super::migrations;
use super::repository::{BadgeCommit, CompletionCommit};

/// PostgreSQL connection pool wrapper
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// Error type for PostgreSQL operations
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Version conflict on profile {user_id} (expected {expected})")]
    VersionConflict { user_id: i64, expected: i64 },
}

impl PostgresStore {
    /// Connect to PostgreSQL and run migrations
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("PostgreSQL connected (max_connections={})", max_connections);

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Wrap an existing pool
    /// Run all pending migrations
    pub async fn run_migrations(&self) -> Result<(), PostgresError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name VARCHAR(100) PRIMARY KEY,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        for (name, sql) in migrations::get_migrations() {
            let applied: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = $1)")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;

            if !applied {
                info!("Running migration: {}", name);
                sqlx::raw_sql(sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| PostgresError::Migration(format!("{}: {}", name, e)))?;

                sqlx::query("INSERT INTO _migrations (name) VALUES ($1)")
                    .bind(name)
                    .execute(&self.pool)
                    .await?;

                info!("Migration applied: {}", name);
            } else {
                debug!("Migration already applied: {}", name);
            }
        }

        Ok(())
    }

    // ========================================================================
    // Profile Operations
    // ========================================================================

    pub async fn get_profile(&self, id: i64) -> Result<Option<ProfileRow>, PostgresError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, username, display_name, xp_points, current_streak, longest_streak,
                    last_activity_date, is_public, show_streak, show_badges, version
             FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a profile unless one exists; returns the stored row
    pub async fn insert_profile(
        &self,
        id: i64,
        username: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<ProfileRow, PostgresError> {
        let inserted = sqlx::query(
            "INSERT INTO profiles (id, username, display_name)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(username)
        .bind(display_name)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!("Created profile {}", id);
        }

        self.get_profile(id)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("profile {}", id)))
    }

    /// Update user-owned fields; `None` leaves a field untouched
    pub async fn update_profile_settings(
        &self,
        id: i64,
        display_name: Option<&str>,
        is_public: Option<bool>,
        show_streak: Option<bool>,
        show_badges: Option<bool>,
    ) -> Result<Option<ProfileRow>, PostgresError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "UPDATE profiles SET
                display_name = COALESCE($2, display_name),
                is_public = COALESCE($3, is_public),
                show_streak = COALESCE($4, show_streak),
                show_badges = COALESCE($5, show_badges),
                updated_at = NOW()
             WHERE id = $1
             RETURNING id, username, display_name, xp_points, current_streak, longest_streak,
                       last_activity_date, is_public, show_streak, show_badges, version",
        )
        .bind(id)
        .bind(display_name)
        .bind(is_public)
        .bind(show_streak)
        .bind(show_badges)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn public_profiles(&self, limit: i64) -> Result<Vec<ProfileRow>, PostgresError> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, username, display_name, xp_points, current_streak, longest_streak,
                    last_activity_date, is_public, show_streak, show_badges, version
             FROM profiles WHERE is_public
             ORDER BY xp_points DESC, id ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ========================================================================
    // Progress Reads
    // ========================================================================

    pub async fn has_completion(
        &self,
        user_id: i64,
        topic_id: &str,
    ) -> Result<bool, PostgresError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM topic_completions WHERE user_id = $1 AND topic_id = $2)",
        )
        .bind(user_id)
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn completion_counts(
        &self,
        user_id: i64,
        roadmap_id: Option<&str>,
    ) -> Result<CountsRow, PostgresError> {
        let row = sqlx::query_as::<_, CountsRow>(
            "SELECT
                (SELECT COUNT(*) FROM topic_completions WHERE user_id = $1) AS topics_completed,
                (SELECT COUNT(*) FROM topic_completions
                  WHERE user_id = $1 AND roadmap_id = $2) AS roadmap_topics_completed,
                EXISTS(SELECT 1 FROM user_roadmap_progress
                  WHERE user_id = $1 AND roadmap_id = $2 AND completed_at IS NOT NULL)
                  AS roadmap_completed,
                (SELECT COUNT(*) FROM user_roadmap_progress
                  WHERE user_id = $1 AND completed_at IS NOT NULL) AS roadmaps_completed",
        )
        .bind(user_id)
        .bind(roadmap_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn completions(
        &self,
        user_id: i64,
        roadmap_id: Option<&str>,
    ) -> Result<Vec<CompletionRow>, PostgresError> {
        let rows = sqlx::query_as::<_, CompletionRow>(
            "SELECT user_id, topic_id, roadmap_id, xp_earned, completed_at
             FROM topic_completions
             WHERE user_id = $1 AND ($2::VARCHAR IS NULL OR roadmap_id = $2)
             ORDER BY completed_at DESC, topic_id ASC",
        )
        .bind(user_id)
        .bind(roadmap_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn user_badges(&self, user_id: i64) -> Result<Vec<UserBadgeRow>, PostgresError> {
        let rows = sqlx::query_as::<_, UserBadgeRow>(
            "SELECT user_id, badge_id, earned_at FROM user_badges
             WHERE user_id = $1 ORDER BY earned_at ASC, badge_id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn daily_activity(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<DailyActivityRow>, PostgresError> {
        let rows = sqlx::query_as::<_, DailyActivityRow>(
            "SELECT user_id, activity_date, topics_completed, xp_earned FROM daily_activity
             WHERE user_id = $1 ORDER BY activity_date DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn roadmap_progress(
        &self,
        user_id: i64,
    ) -> Result<Vec<RoadmapProgressRow>, PostgresError> {
        let rows = sqlx::query_as::<_, RoadmapProgressRow>(
            "SELECT user_id, roadmap_id, started_at, completed_at, is_active
             FROM user_roadmap_progress WHERE user_id = $1 ORDER BY started_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Enrol a user; existing enrolment is returned unchanged
    pub async fn start_roadmap(
        &self,
        user_id: i64,
        roadmap_id: &str,
        at: DateTime<Utc>,
    ) -> Result<RoadmapProgressRow, PostgresError> {
        sqlx::query(
            "INSERT INTO user_roadmap_progress (user_id, roadmap_id, started_at, is_active)
             VALUES ($1, $2, $3, TRUE)
             ON CONFLICT (user_id, roadmap_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(roadmap_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, RoadmapProgressRow>(
            "SELECT user_id, roadmap_id, started_at, completed_at, is_active
             FROM user_roadmap_progress WHERE user_id = $1 AND roadmap_id = $2",
        )
        .bind(user_id)
        .bind(roadmap_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    // ========================================================================
    // Accrual Commits
    // ========================================================================

    /// Commit one completion atomically.
    ///
    /// Returns `Ok(false)` when the completion already existed (nothing is
    /// written) and `VersionConflict` when the profile moved since planning.
    pub async fn commit_completion(
        &self,
        commit: &CompletionCommit,
    ) -> Result<bool, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO topic_completions (user_id, topic_id, roadmap_id, xp_earned, completed_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, topic_id) DO NOTHING",
        )
        .bind(commit.user_id)
        .bind(&commit.completion.topic_id)
        .bind(&commit.completion.roadmap_id)
        .bind(commit.completion.xp_earned as i32)
        .bind(commit.completion.completed_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        update_ledger(&mut tx, commit.user_id, commit.expected_version, &commit.ledger).await?;

        sqlx::query(
            "INSERT INTO daily_activity (user_id, activity_date, topics_completed, xp_earned)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, activity_date) DO UPDATE SET
                topics_completed = daily_activity.topics_completed + EXCLUDED.topics_completed,
                xp_earned = daily_activity.xp_earned + EXCLUDED.xp_earned",
        )
        .bind(commit.user_id)
        .bind(commit.activity_date)
        .bind(commit.activity.topics_completed as i32)
        .bind(commit.activity.xp_earned as i64)
        .execute(&mut *tx)
        .await?;

        if let Some(completed_at) = commit.roadmap_completed_at {
            sqlx::query(
                "INSERT INTO user_roadmap_progress (user_id, roadmap_id, started_at, completed_at, is_active)
                 VALUES ($1, $2, $3, $3, TRUE)
                 ON CONFLICT (user_id, roadmap_id) DO UPDATE SET
                    completed_at = COALESCE(user_roadmap_progress.completed_at, EXCLUDED.completed_at)",
            )
            .bind(commit.user_id)
            .bind(&commit.completion.roadmap_id)
            .bind(completed_at)
            .execute(&mut *tx)
            .await?;
        }

        insert_badges(&mut tx, &commit.badges).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Commit a standalone badge pass atomically
    pub async fn commit_badges(&self, commit: &BadgeCommit) -> Result<(), PostgresError> {
        let mut tx = self.pool.begin().await?;
        update_ledger(&mut tx, commit.user_id, commit.expected_version, &commit.ledger).await?;
        insert_badges(&mut tx, &commit.badges).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove one completion and bump the profile version in the same
    /// transaction, so completions planned against the old counts conflict.
    pub async fn delete_completion(
        &self,
        user_id: i64,
        topic_id: &str,
    ) -> Result<bool, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM topic_completions WHERE user_id = $1 AND topic_id = $2")
            .bind(user_id)
            .bind(topic_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted > 0 {
            sqlx::query(
                "UPDATE profiles SET version = version + 1, updated_at = NOW() WHERE id = $1",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(deleted > 0)
    }
}

/// Versioned write of the engine-owned profile columns
async fn update_ledger(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    expected_version: i64,
    ledger: &ProgressLedger,
) -> Result<(), PostgresError> {
    let updated = sqlx::query(
        "UPDATE profiles SET
            xp_points = $3,
            current_streak = $4,
            longest_streak = $5,
            last_activity_date = $6,
            version = version + 1,
            updated_at = NOW()
         WHERE id = $1 AND version = $2",
    )
    .bind(user_id)
    .bind(expected_version)
    .bind(i64::try_from(ledger.xp_points()).unwrap_or(i64::MAX))
    .bind(ledger.current_streak() as i32)
    .bind(ledger.longest_streak() as i32)
    .bind(ledger.last_activity_date())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(PostgresError::VersionConflict {
            user_id,
            expected: expected_version,
        });
    }
    Ok(())
}

async fn insert_badges(
    tx: &mut Transaction<'_, Postgres>,
    badges: &[UserBadge],
) -> Result<(), PostgresError> {
    for badge in badges {
        sqlx::query(
            "INSERT INTO user_badges (user_id, badge_id, earned_at) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, badge_id) DO NOTHING",
        )
        .bind(badge.user_id)
        .bind(&badge.badge_id)
        .bind(badge.earned_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub xp_points: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub is_public: bool,
    pub show_streak: bool,
    pub show_badges: bool,
    pub version: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CountsRow {
    pub topics_completed: i64,
    pub roadmap_topics_completed: i64,
    pub roadmap_completed: bool,
    pub roadmaps_completed: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CompletionRow {
    pub user_id: i64,
    pub topic_id: String,
    pub roadmap_id: String,
    pub xp_earned: i32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyActivityRow {
    pub user_id: i64,
    pub activity_date: NaiveDate,
    pub topics_completed: i32,
    pub xp_earned: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserBadgeRow {
    pub user_id: i64,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RoadmapProgressRow {
    pub user_id: i64,
    pub roadmap_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}
