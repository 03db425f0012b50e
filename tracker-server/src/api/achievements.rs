//! AchievementService - badges and the public leaderboard
//!
//! Endpoints:
//! - POST /tracker.AchievementService/GetBadges
//! - POST /tracker.AchievementService/EvaluateBadges
//! - POST /tracker.AchievementService/GetLeaderboard

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use tracker_core::badges::BadgeStatus;
use tracker_core::leaderboard::LeaderboardEntry;

use super::{ApiResult, ApiState, AuthenticatedUser};

/// Hard cap on a requested leaderboard size
const MAX_LEADERBOARD_LIMIT: usize = 100;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/tracker.AchievementService/GetBadges", post(get_badges))
        .route(
            "/tracker.AchievementService/EvaluateBadges",
            post(evaluate_badges),
        )
        .route(
            "/tracker.AchievementService/GetLeaderboard",
            post(get_leaderboard),
        )
}

#[derive(Serialize)]
pub struct BadgesResponse {
    pub badges: Vec<BadgeStatus>,
    pub earned: usize,
}

#[derive(Serialize)]
pub struct EvaluateBadgesResponse {
    pub new_badges: Vec<String>,
    pub bonus_xp: u64,
}

#[derive(Deserialize, Default)]
pub struct LeaderboardRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}

async fn get_badges(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<BadgesResponse> {
    let badges = state.dashboard.badge_board(user_id).await?;
    let earned = badges.iter().filter(|b| b.is_earned()).count();
    Ok(Json(BadgesResponse { badges, earned }))
}

async fn evaluate_badges(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<EvaluateBadgesResponse> {
    let evaluation = state.engine.evaluate_badges(user_id).await?;
    state
        .metrics
        .record_badges(evaluation.awards.len(), evaluation.bonus_xp);

    Ok(Json(EvaluateBadgesResponse {
        new_badges: evaluation.badge_names(),
        bonus_xp: evaluation.bonus_xp,
    }))
}

/// Public view; no identity required
async fn get_leaderboard(
    State(state): State<ApiState>,
    req: Option<Json<LeaderboardRequest>>,
) -> ApiResult<LeaderboardResponse> {
    let limit = req
        .and_then(|Json(r)| r.limit)
        .unwrap_or(state.leaderboard_limit)
        .min(MAX_LEADERBOARD_LIMIT);
    let entries = state.dashboard.leaderboard(limit).await?;
    Ok(Json(LeaderboardResponse { entries }))
}
