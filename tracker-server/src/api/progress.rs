//! ProgressService - topic completion and learner stats
//!
//! Endpoints:
//! - POST /tracker.ProgressService/CompleteTopic
//! - POST /tracker.ProgressService/UncompleteTopic
//! - POST /tracker.ProgressService/GetStats

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use tracker_core::accrual::CompletionOutcome;

use super::{resolve_local_date, ApiResult, ApiState, AuthenticatedUser};
use crate::dashboard::StatsView;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/tracker.ProgressService/CompleteTopic", post(complete_topic))
        .route(
            "/tracker.ProgressService/UncompleteTopic",
            post(uncomplete_topic),
        )
        .route("/tracker.ProgressService/GetStats", post(get_stats))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct CompleteTopicRequest {
    #[serde(alias = "topicId")]
    pub topic_id: String,
    #[serde(default, alias = "roadmapId")]
    pub roadmap_id: Option<String>,
    /// Caller's calendar day, `YYYY-MM-DD`
    #[serde(default, alias = "localDate")]
    pub local_date: Option<String>,
}

#[derive(Deserialize)]
pub struct UncompleteTopicRequest {
    #[serde(alias = "topicId")]
    pub topic_id: String,
}

#[derive(Serialize)]
pub struct UncompleteTopicResponse {
    pub removed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn complete_topic(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<CompleteTopicRequest>,
) -> ApiResult<CompletionOutcome> {
    let today = resolve_local_date(req.local_date.as_deref())?;
    let outcome = state
        .engine
        .complete_topic(user_id, &req.topic_id, req.roadmap_id.as_deref(), today)
        .await?;

    state.metrics.record_completion(&outcome);
    Ok(Json(outcome))
}

async fn uncomplete_topic(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<UncompleteTopicRequest>,
) -> ApiResult<UncompleteTopicResponse> {
    let removed = state.engine.uncomplete_topic(user_id, &req.topic_id).await?;
    Ok(Json(UncompleteTopicResponse { removed }))
}

async fn get_stats(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<StatsView> {
    Ok(Json(state.dashboard.stats(user_id).await?))
}
