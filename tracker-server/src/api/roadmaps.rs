//! RoadmapService - catalog browsing and enrolment
//!
//! Endpoints:
//! - POST /tracker.RoadmapService/ListRoadmaps
//! - POST /tracker.RoadmapService/GetRoadmap
//! - POST /tracker.RoadmapService/StartRoadmap

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use tracker_core::models::{Roadmap, RoadmapProgress};

use super::{ApiResult, ApiState, AuthenticatedUser};
use crate::dashboard::RoadmapOverview;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/tracker.RoadmapService/ListRoadmaps", post(list_roadmaps))
        .route("/tracker.RoadmapService/GetRoadmap", post(get_roadmap))
        .route("/tracker.RoadmapService/StartRoadmap", post(start_roadmap))
}

#[derive(Deserialize)]
pub struct RoadmapRequest {
    #[serde(alias = "roadmapId")]
    pub roadmap_id: String,
}

#[derive(Serialize)]
pub struct RoadmapListResponse {
    pub roadmaps: Vec<Roadmap>,
}

async fn list_roadmaps(State(state): State<ApiState>) -> ApiResult<RoadmapListResponse> {
    let roadmaps = state.dashboard.list_roadmaps().await?;
    Ok(Json(RoadmapListResponse { roadmaps }))
}

async fn get_roadmap(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<RoadmapRequest>,
) -> ApiResult<RoadmapOverview> {
    Ok(Json(
        state
            .dashboard
            .roadmap_overview(user_id, &req.roadmap_id)
            .await?,
    ))
}

async fn start_roadmap(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<RoadmapRequest>,
) -> ApiResult<RoadmapProgress> {
    Ok(Json(
        state.engine.start_roadmap(user_id, &req.roadmap_id).await?,
    ))
}
