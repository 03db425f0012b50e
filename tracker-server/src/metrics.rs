//! Server Metrics - request and progress counters with Prometheus + JSON export
//!
//! Uses lock-free atomics for all counters. No external metrics crate needed.
//!
//! ## Endpoints
//! - `GET /metrics` - Prometheus text format
//! - `GET /metrics/json` - JSON format

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracker_core::accrual::CompletionOutcome;

use crate::api::ApiState;

/// Shared metrics state (all lock-free atomics)
#[derive(Debug)]
pub struct ServerMetrics {
    /// Total HTTP requests served
    pub total_requests: AtomicU64,
    /// Total request errors (4xx + 5xx)
    pub total_errors: AtomicU64,
    /// Cumulative request duration in microseconds (for computing average)
    pub total_duration_us: AtomicU64,
    pub completions_recorded: AtomicU64,
    /// Repeated completion requests answered without crediting
    pub duplicate_completions: AtomicU64,
    pub badges_awarded: AtomicU64,
    /// Topic XP plus badge bonuses
    pub xp_awarded: AtomicU64,
    pub recommendation_fallbacks: AtomicU64,
    pub start_time: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            completions_recorded: AtomicU64::new(0),
            duplicate_completions: AtomicU64::new(0),
            badges_awarded: AtomicU64::new(0),
            xp_awarded: AtomicU64::new(0),
            recommendation_fallbacks: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, duration_us: u64, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us.fetch_add(duration_us, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_completion(&self, outcome: &CompletionOutcome) {
        if !outcome.completion_recorded {
            self.duplicate_completions.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.completions_recorded.fetch_add(1, Ordering::Relaxed);
        self.record_badges(outcome.new_badges.len(), 0);
        self.xp_awarded.fetch_add(
            u64::from(outcome.xp_earned).saturating_add(outcome.badge_xp),
            Ordering::Relaxed,
        );
    }

    pub fn record_badges(&self, count: usize, bonus_xp: u64) {
        self.badges_awarded.fetch_add(count as u64, Ordering::Relaxed);
        self.xp_awarded.fetch_add(bonus_xp, Ordering::Relaxed);
    }

    pub fn record_recommendation(&self, fallback: bool) {
        if fallback {
            self.recommendation_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn requests_per_second(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed) as f64;
        let uptime = self.uptime_secs();
        if uptime > 0.0 { total / uptime } else { 0.0 }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let dur_us = self.total_duration_us.load(Ordering::Relaxed);
        if total > 0 {
            (dur_us as f64 / total as f64) / 1000.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// Axum Middleware - Automatic request tracking
// ============================================================================

/// Middleware that records request count and duration for every HTTP request.
pub async fn metrics_middleware(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let resp = next.run(req).await;
    let duration_us = start.elapsed().as_micros() as u64;
    let is_error = resp.status().is_client_error() || resp.status().is_server_error();

    state.metrics.record_request(duration_us, is_error);
    resp
}

// ============================================================================
// GET /metrics - Prometheus text exposition format
// ============================================================================

pub async fn prometheus_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let m = &state.metrics;
    let total_requests = m.total_requests.load(Ordering::Relaxed);
    let total_errors = m.total_errors.load(Ordering::Relaxed);
    let completions = m.completions_recorded.load(Ordering::Relaxed);
    let duplicates = m.duplicate_completions.load(Ordering::Relaxed);
    let badges = m.badges_awarded.load(Ordering::Relaxed);
    let xp = m.xp_awarded.load(Ordering::Relaxed);
    let fallbacks = m.recommendation_fallbacks.load(Ordering::Relaxed);
    let uptime = m.uptime_secs();
    let rps = m.requests_per_second();
    let avg_req_duration_s = m.avg_duration_ms() / 1000.0;

    let body = format!(
        "# HELP tracker_requests_total Total HTTP requests served\n\
         # TYPE tracker_requests_total counter\n\
         tracker_requests_total {total_requests}\n\
         \n\
         # HELP tracker_request_errors_total Total HTTP request errors (4xx/5xx)\n\
         # TYPE tracker_request_errors_total counter\n\
         tracker_request_errors_total {total_errors}\n\
         \n\
         # HELP tracker_request_duration_seconds Average request duration\n\
         # TYPE tracker_request_duration_seconds gauge\n\
         tracker_request_duration_seconds {avg_req_duration_s:.6}\n\
         \n\
         # HELP tracker_requests_per_second Current request throughput\n\
         # TYPE tracker_requests_per_second gauge\n\
         tracker_requests_per_second {rps:.2}\n\
         \n\
         # HELP tracker_completions_total Topic completions recorded\n\
         # TYPE tracker_completions_total counter\n\
         tracker_completions_total {completions}\n\
         \n\
         # HELP tracker_duplicate_completions_total Repeated completion requests\n\
         # TYPE tracker_duplicate_completions_total counter\n\
         tracker_duplicate_completions_total {duplicates}\n\
         \n\
         # HELP tracker_badges_awarded_total Badges awarded\n\
         # TYPE tracker_badges_awarded_total counter\n\
         tracker_badges_awarded_total {badges}\n\
         \n\
         # HELP tracker_xp_awarded_total XP credited (topics and badge bonuses)\n\
         # TYPE tracker_xp_awarded_total counter\n\
         tracker_xp_awarded_total {xp}\n\
         \n\
         # HELP tracker_recommendation_fallbacks_total Suggestion requests served the static list\n\
         # TYPE tracker_recommendation_fallbacks_total counter\n\
         tracker_recommendation_fallbacks_total {fallbacks}\n\
         \n\
         # HELP tracker_uptime_seconds Server uptime\n\
         # TYPE tracker_uptime_seconds gauge\n\
         tracker_uptime_seconds {uptime:.2}\n",
    );

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ============================================================================
// GET /metrics/json
// ============================================================================

#[derive(Serialize)]
pub struct JsonMetrics {
    pub uptime_secs: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub rps: f64,
    pub avg_request_duration_ms: f64,
    pub completions_recorded: u64,
    pub duplicate_completions: u64,
    pub badges_awarded: u64,
    pub xp_awarded: u64,
    pub recommendation_fallbacks: u64,
}

pub async fn json_metrics_handler(State(state): State<ApiState>) -> Json<JsonMetrics> {
    let m = &state.metrics;
    Json(JsonMetrics {
        uptime_secs: m.uptime_secs(),
        total_requests: m.total_requests.load(Ordering::Relaxed),
        total_errors: m.total_errors.load(Ordering::Relaxed),
        rps: m.requests_per_second(),
        avg_request_duration_ms: m.avg_duration_ms(),
        completions_recorded: m.completions_recorded.load(Ordering::Relaxed),
        duplicate_completions: m.duplicate_completions.load(Ordering::Relaxed),
        badges_awarded: m.badges_awarded.load(Ordering::Relaxed),
        xp_awarded: m.xp_awarded.load(Ordering::Relaxed),
        recommendation_fallbacks: m.recommendation_fallbacks.load(Ordering::Relaxed),
    })
}
