//! Progress Engine Tests
//!
//! Runs the engine against a seeded LMDB catalog in a temp dir and the
//! in-memory learner store. No PostgreSQL required.

use chrono::NaiveDate;
use std::sync::Arc;

use tracker_server::accrual::{AccrualError, ProgressEngine};
use tracker_server::config::AccrualConfig;
use tracker_server::storage::{self, repository::ProgressRepo};
use tracker_server::MemoryProgressStore;

struct Harness {
    engine: Arc<ProgressEngine>,
    memory: MemoryProgressStore,
    _tmp: tempfile::TempDir,
}

fn harness() -> Harness {
    let tmp = tempfile::tempdir().expect("temp dir");
    let catalog = storage::open_catalog(tmp.path().join("catalog"), 10 * 1024 * 1024)
        .expect("catalog");
    let memory = MemoryProgressStore::new();
    let manager = storage::with_memory_backend(catalog, memory.clone());
    let engine = Arc::new(ProgressEngine::new(Arc::new(manager), AccrualConfig::default()));
    Harness {
        engine,
        memory,
        _tmp: tmp,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

async fn signed_up(h: &Harness, user: i64) {
    h.engine
        .ensure_profile(user, Some(format!("user{user}")), None)
        .await
        .unwrap();
}

const SECURITY: [&str; 5] = [
    "security-cia-triad",
    "security-threat-modeling",
    "security-tcp-ip-basics",
    "security-firewalls",
    "security-tls",
];

// ============================================================================
// Completion basics
// ============================================================================

#[tokio::test]
async fn test_first_completion_credits_xp_streak_and_first_badge() {
    let h = harness();
    signed_up(&h, 1).await;

    let out = h
        .engine
        .complete_topic(1, "webdev-html", Some("webdev"), day(1))
        .await
        .unwrap();

    assert!(out.completion_recorded);
    assert_eq!(out.xp_earned, 10);
    assert_eq!(out.new_streak, 1);
    assert_eq!(out.new_badges, vec!["First Steps".to_string()]);
    assert_eq!(out.badge_xp, 10);
    assert_eq!(out.total_xp, 20);

    let activity = h.memory.daily_activity(1, 10).await.unwrap();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].topics_completed, 1);
    assert_eq!(activity[0].xp_earned, 10);
}

#[tokio::test]
async fn test_duplicate_completion_is_a_no_op() {
    let h = harness();
    signed_up(&h, 1).await;

    h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();
    let again = h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();

    assert!(!again.completion_recorded);
    assert_eq!(again.xp_earned, 0);
    assert!(again.new_badges.is_empty());
    assert_eq!(again.total_xp, 20);
    assert_eq!(h.memory.completion_count(1), 1);

    let activity = h.memory.daily_activity(1, 10).await.unwrap();
    assert_eq!(activity[0].topics_completed, 1);
}

#[tokio::test]
async fn test_same_day_completions_accumulate_activity() {
    let h = harness();
    signed_up(&h, 1).await;

    h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();
    let out = h.engine.complete_topic(1, "webdev-css", None, day(1)).await.unwrap();

    assert_eq!(out.new_streak, 1);
    let activity = h.memory.daily_activity(1, 10).await.unwrap();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].topics_completed, 2);
    assert_eq!(activity[0].xp_earned, 20);
}

// ============================================================================
// Streaks
// ============================================================================

#[tokio::test]
async fn test_three_consecutive_days_award_on_fire() {
    let h = harness();
    signed_up(&h, 1).await;

    h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();
    h.engine.complete_topic(1, "webdev-css", None, day(2)).await.unwrap();
    let out = h
        .engine
        .complete_topic(1, "webdev-javascript", None, day(3))
        .await
        .unwrap();

    assert_eq!(out.new_streak, 3);
    assert_eq!(out.longest_streak, 3);
    assert_eq!(out.new_badges, vec!["On Fire".to_string()]);
    assert_eq!(out.total_xp, 10 + 10 + 15 + 10 + 25);
}

#[tokio::test]
async fn test_gap_resets_streak_but_keeps_longest() {
    let h = harness();
    signed_up(&h, 1).await;

    h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();
    h.engine.complete_topic(1, "webdev-css", None, day(2)).await.unwrap();
    let out = h
        .engine
        .complete_topic(1, "webdev-javascript", None, day(5))
        .await
        .unwrap();

    assert_eq!(out.new_streak, 1);
    assert_eq!(out.longest_streak, 2);
}

#[tokio::test]
async fn test_backwards_local_date_does_not_move_streak() {
    let h = harness();
    signed_up(&h, 1).await;

    h.engine.complete_topic(1, "webdev-html", None, day(5)).await.unwrap();
    let out = h.engine.complete_topic(1, "webdev-css", None, day(3)).await.unwrap();
    assert_eq!(out.new_streak, 1);

    // The next day after the latest activity still continues the streak
    let out = h
        .engine
        .complete_topic(1, "webdev-javascript", None, day(6))
        .await
        .unwrap();
    assert_eq!(out.new_streak, 2);

    let stats = h.engine.storage().profiles.get(1).await.unwrap().unwrap();
    assert_eq!(stats.ledger.last_activity_date(), Some(day(6)));
}

// ============================================================================
// Roadmaps and badges
// ============================================================================

#[tokio::test]
async fn test_finishing_a_roadmap_marks_it_and_awards_finisher() {
    let h = harness();
    signed_up(&h, 1).await;
    h.engine.start_roadmap(1, "security").await.unwrap();

    let mut last = None;
    for topic in SECURITY {
        last = Some(h.engine.complete_topic(1, topic, None, day(1)).await.unwrap());
    }
    let last = last.unwrap();

    assert!(last.roadmap_completed);
    assert!(last.new_badges.contains(&"Roadmap Finisher".to_string()));
    assert_eq!(last.total_xp, 75 + 10 + 100);

    let progress = h.memory.roadmap_progress(1).await.unwrap();
    assert_eq!(progress.len(), 1);
    assert!(progress[0].completed_at.is_some());
}

#[tokio::test]
async fn test_roadmap_completion_is_marked_once() {
    let h = harness();
    signed_up(&h, 1).await;

    for topic in SECURITY {
        h.engine.complete_topic(1, topic, None, day(1)).await.unwrap();
    }
    let first_mark = h.memory.roadmap_progress(1).await.unwrap()[0].completed_at;

    assert!(h.engine.uncomplete_topic(1, "security-tls").await.unwrap());
    let again = h.engine.complete_topic(1, "security-tls", None, day(2)).await.unwrap();

    assert!(again.completion_recorded);
    assert_eq!(again.xp_earned, 20);
    assert_eq!(again.total_xp, 185 + 20);
    assert!(!again.roadmap_completed);
    assert_eq!(h.memory.roadmap_progress(1).await.unwrap()[0].completed_at, first_mark);
}

#[tokio::test]
async fn test_tenth_topic_awards_getting_started() {
    let h = harness();
    signed_up(&h, 1).await;

    let topics = [
        "dsa-big-o-notation",
        "dsa-arrays-strings",
        "dsa-hash-maps",
        "dsa-linked-lists",
        "dsa-stacks-queues",
        "dsa-binary-trees",
        "dsa-heaps",
        "webdev-html",
        "webdev-css",
    ];
    for t in topics {
        let out = h.engine.complete_topic(1, t, None, day(1)).await.unwrap();
        assert!(!out.new_badges.contains(&"Getting Started".to_string()));
    }

    let tenth = h
        .engine
        .complete_topic(1, "webdev-javascript", None, day(1))
        .await
        .unwrap();
    assert!(tenth.new_badges.contains(&"Getting Started".to_string()));
    assert_eq!(tenth.badge_xp, 50);
}

#[tokio::test]
async fn test_standalone_evaluation_after_completions_finds_nothing_new() {
    let h = harness();
    signed_up(&h, 1).await;
    h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();

    let evaluation = h.engine.evaluate_badges(1).await.unwrap();
    assert!(evaluation.is_empty());
    assert_eq!(h.memory.owned_badges(1).await.unwrap().len(), 1);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_unknown_user_is_rejected_before_any_write() {
    let h = harness();

    let err = h.engine.complete_topic(42, "webdev-html", None, day(1)).await;
    assert!(matches!(err, Err(AccrualError::UnknownUser(42))));
    assert_eq!(h.memory.completion_count(42), 0);
}

#[tokio::test]
async fn test_unknown_user_wins_over_unknown_topic() {
    let h = harness();

    let err = h.engine.complete_topic(42, "nope", Some("dsa"), day(1)).await;
    assert!(matches!(err, Err(AccrualError::UnknownUser(42))));
}

#[tokio::test]
async fn test_unknown_topic_and_roadmap_mismatch() {
    let h = harness();
    signed_up(&h, 1).await;

    assert!(matches!(
        h.engine.complete_topic(1, "nope", None, day(1)).await,
        Err(AccrualError::UnknownTopic(_))
    ));
    assert!(matches!(
        h.engine.complete_topic(1, "webdev-html", Some("dsa"), day(1)).await,
        Err(AccrualError::RoadmapMismatch { .. })
    ));
    assert!(matches!(
        h.engine.start_roadmap(1, "underwater-basket-weaving").await,
        Err(AccrualError::UnknownRoadmap(_))
    ));
    assert_eq!(h.memory.completion_count(1), 0);
}

// ============================================================================
// Contention
// ============================================================================

#[tokio::test]
async fn test_version_conflicts_are_retried() {
    let h = harness();
    signed_up(&h, 1).await;
    h.memory.inject_conflicts(2);

    let out = h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();
    assert!(out.completion_recorded);
    assert_eq!(out.total_xp, 20);
}

#[tokio::test]
async fn test_exhausted_retries_write_nothing() {
    let h = harness();
    signed_up(&h, 1).await;
    h.memory.inject_conflicts(AccrualConfig::default().max_commit_retries);

    let err = h.engine.complete_topic(1, "webdev-html", None, day(1)).await;
    assert!(matches!(err, Err(AccrualError::Contended(1))));
    assert_eq!(h.memory.completion_count(1), 0);
    assert!(h.memory.daily_activity(1, 10).await.unwrap().is_empty());

    let profile = h.engine.storage().profiles.get(1).await.unwrap().unwrap();
    assert_eq!(profile.ledger.xp_points(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicates_credit_once() {
    let h = harness();
    signed_up(&h, 1).await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.complete_topic(1, "dsa-heaps", None, day(1)).await })
        })
        .collect();

    let mut recorded = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().completion_recorded {
            recorded += 1;
        }
    }

    assert_eq!(recorded, 1);
    let profile = h.engine.storage().profiles.get(1).await.unwrap().unwrap();
    assert_eq!(profile.ledger.xp_points(), 20 + 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_topics_lose_no_updates() {
    let h = harness();
    signed_up(&h, 1).await;

    let handles: Vec<_> = SECURITY
        .iter()
        .map(|t| {
            let engine = h.engine.clone();
            let topic = t.to_string();
            tokio::spawn(async move { engine.complete_topic(1, &topic, None, day(1)).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().completion_recorded);
    }

    let profile = h.engine.storage().profiles.get(1).await.unwrap().unwrap();
    assert_eq!(profile.ledger.xp_points(), 75 + 10 + 100);
    let activity = h.memory.daily_activity(1, 10).await.unwrap();
    assert_eq!(activity[0].topics_completed, 5);
    assert_eq!(activity[0].xp_earned, 75);
}

// ============================================================================
// Uncomplete
// ============================================================================

#[tokio::test]
async fn test_uncomplete_keeps_xp_and_streak() {
    let h = harness();
    signed_up(&h, 1).await;
    h.engine.complete_topic(1, "webdev-html", None, day(1)).await.unwrap();

    assert!(h.engine.uncomplete_topic(1, "webdev-html").await.unwrap());
    assert!(!h.engine.uncomplete_topic(1, "webdev-html").await.unwrap());

    let profile = h.engine.storage().profiles.get(1).await.unwrap().unwrap();
    assert_eq!(profile.ledger.xp_points(), 20);
    assert_eq!(profile.ledger.current_streak(), 1);
    assert_eq!(h.memory.completion_count(1), 0);
    assert_eq!(h.memory.owned_badges(1).await.unwrap().len(), 1);
    // one commit, one real removal
    assert_eq!(profile.version, 2);
}
