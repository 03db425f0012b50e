//! HTTP/JSON API Layer
//!
//! REST-like endpoints following gRPC path conventions.
//!
//! ## Architecture
//! ```text
//! Web client
//!       ↓ HTTP POST, JSON body, x-user-id header
//! Axum Router (port 50051)
//!       ↓
//! Service Handlers (progress, achievements, roadmaps, profiles, recommendations)
//!       ↓
//! ProgressEngine (writes) / Dashboard (reads)
//!       ↓
//! StorageManager (LMDB catalog + PostgreSQL or memory)
//! ```
//!
//! ## Endpoint Convention
//! All endpoints follow the gRPC path pattern: `POST /tracker.<Service>/<Method>`
//! Example: `POST /tracker.ProgressService/CompleteTopic`
//!
//! ## Identity
//! The identity provider sits in front of this service and forwards the
//! verified user id in `x-user-id`. Requests without it are rejected before
//! any store access.

pub mod achievements;
pub mod profiles;
pub mod progress;
pub mod recommendations;
pub mod roadmaps;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use tracker_core::models::UserId;
use tracker_core::streak::parse_local_date;

use crate::accrual::{AccrualError, ProgressEngine};
use crate::dashboard::Dashboard;
use crate::metrics::ServerMetrics;
use crate::recommendations::RecommendationService;
use crate::storage::repository::StorageManager;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ProgressEngine>,
    pub dashboard: Arc<Dashboard>,
    pub recommender: Arc<RecommendationService>,
    /// Server-wide metrics (lock-free atomics)
    pub metrics: Arc<ServerMetrics>,
    pub leaderboard_limit: usize,
}

impl ApiState {
    pub fn new(
        storage: StorageManager,
        config: &crate::config::ServerConfig,
        recommender: RecommendationService,
    ) -> Self {
        let storage = Arc::new(storage);
        Self {
            engine: Arc::new(ProgressEngine::new(storage.clone(), config.accrual)),
            dashboard: Arc::new(Dashboard::new(
                storage,
                config.accrual.activity_window_days,
            )),
            recommender: Arc::new(recommender),
            metrics: ServerMetrics::new(),
            leaderboard_limit: config.leaderboard_limit,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl From<AccrualError> for ApiError {
    fn from(err: AccrualError) -> Self {
        match err {
            AccrualError::UnknownUser(_) => Self::unauthorized("unknown user"),
            AccrualError::UnknownTopic(_) | AccrualError::UnknownRoadmap(_) => {
                Self::not_found(err.to_string())
            }
            AccrualError::RoadmapMismatch { .. } => Self::bad_request(err.to_string()),
            AccrualError::Contended(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "busy",
                "Progress could not be saved, please try again",
            ),
            AccrualError::Store(e) => {
                error!("Store failure: {}", e);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Something went wrong, please try again",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Identity
// ============================================================================

/// Caller identity taken from the `x-user-id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .map(AuthenticatedUser)
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}

/// The caller's calendar day: an explicit `YYYY-MM-DD`, else today in UTC
pub(crate) fn resolve_local_date(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    match raw {
        Some(raw) => parse_local_date(raw).map_err(|e| ApiError::bad_request(e.to_string())),
        None => Ok(Utc::now().date_naive()),
    }
}

// ============================================================================
// Router
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the full API router with all service endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .merge(progress::routes())
        .merge(achievements::routes())
        .merge(roadmaps::routes())
        .merge(profiles::routes())
        .merge(recommendations::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn start_api_server<F>(
    state: ApiState,
    port: u16,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
