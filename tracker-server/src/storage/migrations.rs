//! Database Migrations - PostgreSQL schema for learner progress
//!
//! Only engine-owned, learner-mutable data lives here. The curriculum and
//! badge definitions live in LMDB, so tables reference them by text id
//! without foreign keys.

/// SQL migration for creating all tables
pub const MIGRATION_V1: &str = r#"
-- ============================================================================
-- Learning Tracker Schema v1
-- ============================================================================

-- ============================================================================
-- 1. Profiles
-- ============================================================================

CREATE TABLE IF NOT EXISTS profiles (
    id                  BIGINT PRIMARY KEY,
    username            VARCHAR(50) UNIQUE,
    display_name        VARCHAR(100),
    created_at          TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
    updated_at          TIMESTAMP WITH TIME ZONE DEFAULT NOW(),

    -- Engine-owned counters
    xp_points           BIGINT NOT NULL DEFAULT 0 CHECK (xp_points >= 0),
    current_streak      INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
    longest_streak      INTEGER NOT NULL DEFAULT 0 CHECK (longest_streak >= 0),
    last_activity_date  DATE,

    -- User-owned visibility
    is_public           BOOLEAN NOT NULL DEFAULT TRUE,
    show_streak         BOOLEAN NOT NULL DEFAULT TRUE,
    show_badges         BOOLEAN NOT NULL DEFAULT TRUE,

    -- Compare-and-swap token for engine commits
    version             BIGINT NOT NULL DEFAULT 0,

    CONSTRAINT check_longest_streak CHECK (longest_streak >= current_streak)
);

CREATE INDEX IF NOT EXISTS idx_profiles_leaderboard ON profiles(xp_points DESC, id ASC) WHERE is_public;

-- ============================================================================
-- 2. Completions
-- ============================================================================

CREATE TABLE IF NOT EXISTS topic_completions (
    id              BIGSERIAL PRIMARY KEY,
    user_id         BIGINT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    topic_id        VARCHAR(100) NOT NULL,
    roadmap_id      VARCHAR(100) NOT NULL,
    xp_earned       INTEGER NOT NULL CHECK (xp_earned >= 0),
    completed_at    TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    UNIQUE(user_id, topic_id)
);

CREATE INDEX IF NOT EXISTS idx_completions_user_roadmap ON topic_completions(user_id, roadmap_id);
CREATE INDEX IF NOT EXISTS idx_completions_user_time ON topic_completions(user_id, completed_at DESC);

-- ============================================================================
-- 3. Daily activity (additive aggregate)
-- ============================================================================

CREATE TABLE IF NOT EXISTS daily_activity (
    user_id             BIGINT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    activity_date       DATE NOT NULL,
    topics_completed    INTEGER NOT NULL DEFAULT 0,
    xp_earned           BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, activity_date)
);

-- ============================================================================
-- 4. Badges & roadmap enrolment
-- ============================================================================

CREATE TABLE IF NOT EXISTS user_badges (
    user_id     BIGINT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    badge_id    VARCHAR(100) NOT NULL,
    earned_at   TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    PRIMARY KEY (user_id, badge_id)
);

CREATE TABLE IF NOT EXISTS user_roadmap_progress (
    user_id         BIGINT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    roadmap_id      VARCHAR(100) NOT NULL,
    started_at      TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    completed_at    TIMESTAMP WITH TIME ZONE,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    PRIMARY KEY (user_id, roadmap_id)
);

CREATE INDEX IF NOT EXISTS idx_roadmap_progress_completed
    ON user_roadmap_progress(user_id) WHERE completed_at IS NOT NULL;
"#;

/// Get all migrations in order
pub fn get_migrations() -> Vec<(&'static str, &'static str)> {
    vec![("v1_initial_schema", MIGRATION_V1)]
}
