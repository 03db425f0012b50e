//! API Smoke Tests
//!
//! Validates the HTTP router end to end against a temporary LMDB catalog and
//! the in-memory learner store. No PostgreSQL or network access required;
//! the recommender has no key and always serves its fallback list.

use axum::body::Body;
use http::Request;
use serde_json::Value;
use tower::ServiceExt;

use tracker_server::api;
use tracker_server::recommendations::RecommendationService;
use tracker_server::storage;
use tracker_server::{MemoryProgressStore, ServerConfig};

/// Returns (router, temp_dir); temp_dir must stay alive for the duration.
fn create_test_router() -> (axum::Router, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let catalog = storage::open_catalog(tmp.path().join("catalog"), 10 * 1024 * 1024)
        .expect("Failed to init LMDB");
    let manager = storage::with_memory_backend(catalog, MemoryProgressStore::new());

    let config = ServerConfig::from_lookup(|_| None).expect("default config");
    let recommender = RecommendationService::from_config(&config.recommender);
    let state = api::ApiState::new(manager, &config, recommender);

    (api::build_router(state), tmp)
}

fn post(uri: &str, user: Option<i64>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(api::USER_ID_HEADER, user.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(router: &axum::Router, req: Request<Body>) -> (u16, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn sign_up(router: &axum::Router, user: i64) {
    let (status, _) = call(
        router,
        post(
            "/tracker.ProfileService/EnsureProfile",
            Some(user),
            &format!(r#"{{"username": "user{user}"}}"#),
        ),
    )
    .await;
    assert_eq!(status, 200);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (router, _tmp) = create_test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = call(&router, req).await;

    assert_eq!(status, 200);
    assert_eq!(json["status"], "ok");
    assert!(!json["version"].as_str().unwrap().is_empty());
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test]
async fn test_complete_topic_flow() {
    let (router, _tmp) = create_test_router();
    sign_up(&router, 7).await;

    let body = r#"{"topic_id": "webdev-html", "roadmap_id": "webdev", "local_date": "2024-03-01"}"#;
    let (status, json) = call(
        &router,
        post("/tracker.ProgressService/CompleteTopic", Some(7), body),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["completionRecorded"], true);
    assert_eq!(json["xpEarned"], 10);
    assert_eq!(json["totalXp"], 20);
    assert_eq!(json["newBadges"][0], "First Steps");

    let (status, json) = call(
        &router,
        post("/tracker.ProgressService/CompleteTopic", Some(7), body),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["completionRecorded"], false);
    assert_eq!(json["totalXp"], 20);

    let (status, json) = call(&router, post("/tracker.ProgressService/GetStats", Some(7), "")).await;
    assert_eq!(status, 200);
    assert_eq!(json["total_xp"], 20);
    assert_eq!(json["topics_completed"], 1);
    assert_eq!(json["current_streak"], 1);
    assert_eq!(json["recent_activity"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (router, _tmp) = create_test_router();

    let (status, json) = call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            None,
            r#"{"topic_id": "webdev-html"}"#,
        ),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(json["code"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_profile_is_unauthorized() {
    let (router, _tmp) = create_test_router();

    let (status, _) = call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(99),
            r#"{"topic_id": "webdev-html"}"#,
        ),
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_unknown_profile_with_unknown_topic_is_unauthorized() {
    let (router, _tmp) = create_test_router();

    let (status, json) = call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(99),
            r#"{"topic_id": "no-such-topic"}"#,
        ),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(json["code"], "unauthorized");
}

#[tokio::test]
async fn test_bad_topic_and_bad_date() {
    let (router, _tmp) = create_test_router();
    sign_up(&router, 1).await;

    let (status, _) = call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(1),
            r#"{"topic_id": "no-such-topic"}"#,
        ),
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(1),
            r#"{"topic_id": "webdev-html", "local_date": "03/01/2024"}"#,
        ),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(1),
            r#"{"topic_id": "webdev-html", "roadmap_id": "dsa"}"#,
        ),
    )
    .await;
    assert_eq!(status, 400);
}

// ============================================================================
// Roadmaps, badges, leaderboard
// ============================================================================

#[tokio::test]
async fn test_roadmap_overview_reflects_completion() {
    let (router, _tmp) = create_test_router();
    sign_up(&router, 3).await;

    let (status, _) = call(
        &router,
        post("/tracker.RoadmapService/StartRoadmap", Some(3), r#"{"roadmap_id": "security"}"#),
    )
    .await;
    assert_eq!(status, 200);

    call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(3),
            r#"{"topic_id": "security-cia-triad"}"#,
        ),
    )
    .await;

    let (status, json) = call(
        &router,
        post("/tracker.RoadmapService/GetRoadmap", Some(3), r#"{"roadmap_id": "security"}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["completed_topics"], 1);
    assert_eq!(json["percent"], 20);
    assert_eq!(json["sections"][0]["topics"][0]["completed"], true);
    assert!(json["enrolment"]["started_at"].is_string());
}

#[tokio::test]
async fn test_badge_board_and_leaderboard() {
    let (router, _tmp) = create_test_router();
    sign_up(&router, 1).await;
    sign_up(&router, 2).await;

    call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(2),
            r#"{"topic_id": "system-caching"}"#,
        ),
    )
    .await;

    let (status, json) = call(&router, post("/tracker.AchievementService/GetBadges", Some(2), "")).await;
    assert_eq!(status, 200);
    assert_eq!(json["badges"].as_array().unwrap().len(), 9);
    assert_eq!(json["earned"], 1);

    let (status, json) = call(
        &router,
        post("/tracker.AchievementService/GetLeaderboard", None, r#"{"limit": 5}"#),
    )
    .await;
    assert_eq!(status, 200);
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["user_id"], 2);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[1]["user_id"], 1);
}

#[tokio::test]
async fn test_private_profile_leaves_leaderboard() {
    let (router, _tmp) = create_test_router();
    sign_up(&router, 1).await;

    let (status, json) = call(
        &router,
        post("/tracker.ProfileService/UpdateSettings", Some(1), r#"{"is_public": false}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["is_public"], false);

    let (_, json) = call(
        &router,
        post("/tracker.AchievementService/GetLeaderboard", None, "{}"),
    )
    .await;
    assert!(json["entries"].as_array().unwrap().is_empty());

    let (status, _) = call(
        &router,
        post("/tracker.ProfileService/GetPublicProfile", None, r#"{"user_id": 1}"#),
    )
    .await;
    assert_eq!(status, 404);
}

// ============================================================================
// Recommendations
// ============================================================================

#[tokio::test]
async fn test_suggest_without_key_serves_fallback() {
    let (router, _tmp) = create_test_router();
    sign_up(&router, 1).await;

    let (status, json) = call(
        &router,
        post("/tracker.RecommendationService/Suggest", Some(1), ""),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["fallback"], true);
    assert_eq!(json["suggestions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_metrics_count_completions() {
    let (router, _tmp) = create_test_router();
    sign_up(&router, 1).await;
    call(
        &router,
        post(
            "/tracker.ProgressService/CompleteTopic",
            Some(1),
            r#"{"topic_id": "dsa-heaps"}"#,
        ),
    )
    .await;

    let req = Request::builder()
        .method("GET")
        .uri("/metrics/json")
        .body(Body::empty())
        .unwrap();
    let (status, json) = call(&router, req).await;
    assert_eq!(status, 200);
    assert_eq!(json["completions_recorded"], 1);
    assert_eq!(json["xp_awarded"], 30);
}
