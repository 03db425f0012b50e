//! ProfileService - profile creation, settings and public cards
//!
//! Endpoints:
//! - POST /tracker.ProfileService/EnsureProfile
//! - POST /tracker.ProfileService/GetProfile
//! - POST /tracker.ProfileService/UpdateSettings
//! - POST /tracker.ProfileService/GetPublicProfile

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use tracker_core::models::{Profile, ProfileSettings, UserId};

use super::{ApiError, ApiResult, ApiState, AuthenticatedUser};
use crate::dashboard::PublicProfile;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/tracker.ProfileService/EnsureProfile", post(ensure_profile))
        .route("/tracker.ProfileService/GetProfile", post(get_profile))
        .route(
            "/tracker.ProfileService/UpdateSettings",
            post(update_settings),
        )
        .route(
            "/tracker.ProfileService/GetPublicProfile",
            post(get_public_profile),
        )
}

#[derive(Deserialize, Default)]
pub struct EnsureProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct PublicProfileRequest {
    #[serde(alias = "userId")]
    pub user_id: UserId,
}

/// Called after sign-in; returns the existing profile untouched if present
async fn ensure_profile(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    req: Option<Json<EnsureProfileRequest>>,
) -> ApiResult<Profile> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .engine
            .ensure_profile(user_id, req.username, req.display_name)
            .await?,
    ))
}

async fn get_profile(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<Profile> {
    Ok(Json(state.dashboard.profile(user_id).await?))
}

async fn update_settings(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(settings): Json<ProfileSettings>,
) -> ApiResult<Profile> {
    Ok(Json(state.engine.update_settings(user_id, &settings).await?))
}

async fn get_public_profile(
    State(state): State<ApiState>,
    Json(req): Json<PublicProfileRequest>,
) -> ApiResult<PublicProfile> {
    state
        .dashboard
        .public_profile(req.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("profile not found"))
}
