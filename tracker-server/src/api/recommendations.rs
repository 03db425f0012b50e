//! RecommendationService - suggested next steps
//!
//! Endpoints:
//! - POST /tracker.RecommendationService/Suggest
//!
//! Always answers 200 for a known user; upstream trouble is hidden behind
//! the fallback list.

use axum::{extract::State, routing::post, Json, Router};

use super::{ApiResult, ApiState, AuthenticatedUser};
use crate::recommendations::Recommendations;

pub fn routes() -> Router<ApiState> {
    Router::new().route("/tracker.RecommendationService/Suggest", post(suggest))
}

async fn suggest(
    State(state): State<ApiState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<Recommendations> {
    let ctx = state.dashboard.suggestion_context(user_id).await?;
    let recs = state.recommender.suggest(&ctx).await;
    state.metrics.record_recommendation(recs.fallback);
    Ok(Json(recs))
}
