//! LMDB Repository Adapters
//!
//! Implements the catalog traits from `repository.rs` on top of
//! `LmdbCatalogStore`. Topic lookups sit on the completion hot path and go
//! through a small LRU in front of LMDB.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tracker_core::models::{Badge, Roadmap, Section, Topic};

use super::lmdb_catalog::LmdbCatalogStore;
use super::repository::*;

const TOPIC_CACHE_CAPACITY: usize = 512;

/// Adapter for RoadmapCatalogRepo
pub struct LmdbRoadmapRepo {
    store: Arc<LmdbCatalogStore>,
    topic_cache: Mutex<LruCache<String, Topic>>,
}

impl LmdbRoadmapRepo {
    pub fn new(store: Arc<LmdbCatalogStore>) -> Self {
        Self::with_capacity(store, TOPIC_CACHE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<LmdbCatalogStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            topic_cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl RoadmapCatalogRepo for LmdbRoadmapRepo {
    async fn get_roadmap(&self, id: &str) -> RepoResult<Option<Roadmap>> {
        Ok(self.store.get_roadmap(id)?)
    }

    async fn list_roadmaps(&self, public_only: bool) -> RepoResult<Vec<Roadmap>> {
        let all: Vec<Roadmap> = self.store.get_all(self.store.roadmaps)?;
        Ok(all
            .into_iter()
            .filter(|r| !public_only || r.is_public)
            .collect())
    }

    async fn sections(&self, roadmap_id: &str) -> RepoResult<Vec<Section>> {
        Ok(self.store.sections_of(roadmap_id)?)
    }

    async fn topics(&self, roadmap_id: &str) -> RepoResult<Vec<Topic>> {
        Ok(self.store.topics_of(roadmap_id)?)
    }

    async fn get_topic(&self, id: &str) -> RepoResult<Option<Topic>> {
        if let Some(cached) = self.topic_cache.lock().get(id) {
            return Ok(Some(cached.clone()));
        }
        let topic = self.store.get_topic(id)?;
        if let Some(topic) = &topic {
            self.topic_cache.lock().put(id.to_string(), topic.clone());
        }
        Ok(topic)
    }
}

/// Adapter for BadgeCatalogRepo
pub struct LmdbBadgeRepo {
    store: Arc<LmdbCatalogStore>,
}

impl LmdbBadgeRepo {
    pub fn new(store: Arc<LmdbCatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BadgeCatalogRepo for LmdbBadgeRepo {
    async fn get(&self, id: &str) -> RepoResult<Option<Badge>> {
        Ok(self.store.get_badge(id)?)
    }

    async fn get_all(&self) -> RepoResult<Vec<Badge>> {
        let mut all: Vec<Badge> = self.store.get_all(self.store.badges)?;
        all.sort_by(|a, b| {
            a.requirement
                .threshold()
                .cmp(&b.requirement.threshold())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(all)
    }
}
