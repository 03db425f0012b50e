//! Catalog Store Integration Tests
//!
//! Seeds the LMDB catalog in a temp dir and reads it back through the
//! repository adapters the engine uses.

use std::sync::Arc;

use tracker_core::badges::RequirementKind;
use tracker_server::storage::lmdb_repo_adapter::{LmdbBadgeRepo, LmdbRoadmapRepo};
use tracker_server::storage::repository::{BadgeCatalogRepo, RoadmapCatalogRepo};
use tracker_server::storage::{open_catalog, seed_data};
use tracker_server::LmdbCatalogStore;

fn seeded() -> (Arc<LmdbCatalogStore>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("temp dir");
    let catalog = open_catalog(tmp.path().join("catalog"), 10 * 1024 * 1024).expect("catalog");
    (catalog, tmp)
}

#[test]
fn test_seed_counts() {
    let (catalog, _tmp) = seeded();
    let stats = catalog.stats().unwrap();

    assert_eq!(stats.roadmaps, 5);
    assert_eq!(stats.sections, 13);
    assert_eq!(stats.topics, 32);
    assert_eq!(stats.badges, 9);
}

#[test]
fn test_reseeding_is_idempotent() {
    let (catalog, _tmp) = seeded();
    let before = catalog.stats().unwrap();

    seed_data::seed_all(&catalog).unwrap();
    assert_eq!(catalog.stats().unwrap(), before);
    assert_eq!(catalog.get_roadmap("webdev").unwrap().unwrap().total_topics, 7);
}

#[tokio::test]
async fn test_roadmap_repo_orders_sections_and_topics() {
    let (catalog, _tmp) = seeded();
    let repo = LmdbRoadmapRepo::new(catalog);

    let sections = repo.sections("dsa").await.unwrap();
    let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Foundations", "Linear Structures", "Trees & Graphs"]);

    let topics = repo.topics("dsa").await.unwrap();
    assert_eq!(topics.len(), 8);
    assert_eq!(topics.first().unwrap().id, "dsa-big-o-notation");
    assert_eq!(topics.last().unwrap().id, "dsa-graph-traversal");
    assert!(topics.iter().all(|t| t.roadmap_id == "dsa"));
}

#[tokio::test]
async fn test_topic_lookup_through_cache() {
    let (catalog, _tmp) = seeded();
    let repo = LmdbRoadmapRepo::with_capacity(catalog, 2);

    let first = repo.get_topic("system-caching").await.unwrap().unwrap();
    let second = repo.get_topic("system-caching").await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.xp_reward, 20);
    assert!(repo.get_topic("system-nothing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_public_roadmaps_listed() {
    let (catalog, _tmp) = seeded();
    let repo = LmdbRoadmapRepo::new(catalog);

    let mut ids: Vec<String> = repo
        .list_roadmaps(true)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["ai", "dsa", "security", "system", "webdev"]);
}

#[tokio::test]
async fn test_badges_sorted_by_threshold() {
    let (catalog, _tmp) = seeded();
    let repo = LmdbBadgeRepo::new(catalog);

    let badges = repo.get_all().await.unwrap();
    assert_eq!(badges.len(), 9);
    let thresholds: Vec<u64> = badges.iter().map(|b| b.requirement.threshold()).collect();
    let mut sorted = thresholds.clone();
    sorted.sort();
    assert_eq!(thresholds, sorted);

    let on_fire = repo.get("on-fire").await.unwrap().unwrap();
    assert_eq!(on_fire.requirement.kind(), RequirementKind::StreakDays);
    assert_eq!(on_fire.requirement.threshold(), 3);
}
