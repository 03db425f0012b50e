//! LMDB Catalog Store - Persistent storage for the static curriculum
//!
//! Roadmaps, sections, topics and badge definitions are read on every
//! completion and written only at seed time, so they live in LMDB rather
//! than in the relational store. Values are bincode-encoded serde records.
//!
//! ## Performance
//! - Read: memory-mapped, no copy until decode
//! - Write: one ACID transaction per bulk seed

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use tracker_core::models::{Badge, Roadmap, Section, Topic};

type CatalogDb = Database<Str, Bytes>;

/// LMDB-backed catalog store
pub struct LmdbCatalogStore {
    env: Arc<Env>,
    pub roadmaps: CatalogDb,
    pub sections: CatalogDb,
    pub topics: CatalogDb,
    pub badges: CatalogDb,
}

/// Error type for LMDB catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogStoreError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Entry counts per database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub roadmaps: usize,
    pub sections: usize,
    pub topics: usize,
    pub badges: usize,
}

impl CatalogStats {
    pub fn summary(&self) -> String {
        format!(
            "Catalog: {} roadmaps, {} sections, {} topics, {} badges",
            self.roadmaps, self.sections, self.topics, self.badges
        )
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CatalogStoreError> {
    bincode::serialize(value).map_err(|e| CatalogStoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CatalogStoreError> {
    bincode::deserialize(bytes).map_err(|e| CatalogStoreError::Serialization(e.to_string()))
}

impl LmdbCatalogStore {
    /// Open or create the catalog store
    ///
    /// # Arguments
    /// * `path` - Directory for LMDB data files
    /// * `max_size` - Maximum map size in bytes (must be page aligned)
    pub fn new<P: AsRef<Path>>(path: P, max_size: usize) -> Result<Self, CatalogStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size)
                .max_dbs(4)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let roadmaps = env.create_database::<Str, Bytes>(&mut wtxn, Some("roadmaps"))?;
        let sections = env.create_database::<Str, Bytes>(&mut wtxn, Some("sections"))?;
        let topics = env.create_database::<Str, Bytes>(&mut wtxn, Some("topics"))?;
        let badges = env.create_database::<Str, Bytes>(&mut wtxn, Some("badges"))?;
        wtxn.commit()?;

        info!(
            "LMDB catalog store initialized with 4 databases ({}MB)",
            max_size / (1024 * 1024)
        );

        Ok(Self {
            env: Arc::new(env),
            roadmaps,
            sections,
            topics,
            badges,
        })
    }

    // ========================================================================
    // Generic CRUD operations
    // ========================================================================

    pub fn put<T: Serialize>(
        &self,
        db: CatalogDb,
        key: &str,
        value: &T,
    ) -> Result<(), CatalogStoreError> {
        let bytes = encode(value)?;
        let mut wtxn = self.env.write_txn()?;
        db.put(&mut wtxn, key, &bytes)?;
        wtxn.commit()?;
        debug!("Stored catalog entry: {}", key);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        db: CatalogDb,
        key: &str,
    ) -> Result<Option<T>, CatalogStoreError> {
        let rtxn = self.env.read_txn()?;
        match db.get(&rtxn, key)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// All entries of a database in key order
    pub fn get_all<T: DeserializeOwned>(
        &self,
        db: CatalogDb,
    ) -> Result<Vec<T>, CatalogStoreError> {
        let rtxn = self.env.read_txn()?;
        let mut results = Vec::new();
        for item in db.iter(&rtxn)? {
            let (_, bytes) = item?;
            results.push(decode(bytes)?);
        }
        Ok(results)
    }

    pub fn count(&self, db: CatalogDb) -> Result<usize, CatalogStoreError> {
        let rtxn = self.env.read_txn()?;
        Ok(db.len(&rtxn)? as usize)
    }

    /// Bulk insert (single transaction)
    pub fn bulk_put<T: Serialize>(
        &self,
        db: CatalogDb,
        items: &[(&str, &T)],
    ) -> Result<usize, CatalogStoreError> {
        let mut wtxn = self.env.write_txn()?;
        for (key, value) in items {
            db.put(&mut wtxn, key, &encode(value)?)?;
        }
        wtxn.commit()?;
        debug!("Bulk inserted {} catalog entries", items.len());
        Ok(items.len())
    }

    pub fn stats(&self) -> Result<CatalogStats, CatalogStoreError> {
        Ok(CatalogStats {
            roadmaps: self.count(self.roadmaps)?,
            sections: self.count(self.sections)?,
            topics: self.count(self.topics)?,
            badges: self.count(self.badges)?,
        })
    }

    // ========================================================================
    // Typed accessors
    // ========================================================================

    pub fn put_roadmap(&self, roadmap: &Roadmap) -> Result<(), CatalogStoreError> {
        self.put(self.roadmaps, &roadmap.id, roadmap)
    }

    pub fn get_roadmap(&self, id: &str) -> Result<Option<Roadmap>, CatalogStoreError> {
        self.get(self.roadmaps, id)
    }

    pub fn put_section(&self, section: &Section) -> Result<(), CatalogStoreError> {
        self.put(self.sections, &section.id, section)
    }

    pub fn put_topic(&self, topic: &Topic) -> Result<(), CatalogStoreError> {
        self.put(self.topics, &topic.id, topic)
    }

    pub fn get_topic(&self, id: &str) -> Result<Option<Topic>, CatalogStoreError> {
        self.get(self.topics, id)
    }

    pub fn put_badge(&self, badge: &Badge) -> Result<(), CatalogStoreError> {
        self.put(self.badges, &badge.id, badge)
    }

    pub fn get_badge(&self, id: &str) -> Result<Option<Badge>, CatalogStoreError> {
        self.get(self.badges, id)
    }

    pub fn sections_of(&self, roadmap_id: &str) -> Result<Vec<Section>, CatalogStoreError> {
        let mut sections: Vec<Section> = self
            .get_all::<Section>(self.sections)?
            .into_iter()
            .filter(|s| s.roadmap_id == roadmap_id)
            .collect();
        sections.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));
        Ok(sections)
    }

    pub fn topics_of(&self, roadmap_id: &str) -> Result<Vec<Topic>, CatalogStoreError> {
        let section_order: HashMap<String, u32> = self
            .sections_of(roadmap_id)?
            .into_iter()
            .map(|s| (s.id, s.order_index))
            .collect();

        let mut topics: Vec<Topic> = self
            .get_all::<Topic>(self.topics)?
            .into_iter()
            .filter(|t| t.roadmap_id == roadmap_id)
            .collect();
        topics.sort_by_key(|t| {
            (
                section_order.get(&t.section_id).copied().unwrap_or(u32::MAX),
                t.order_index,
                t.id.clone(),
            )
        });
        Ok(topics)
    }

    /// Rewrite every roadmap's `total_topics` from the topics actually stored
    pub fn recount_topics(&self) -> Result<usize, CatalogStoreError> {
        let mut per_roadmap: HashMap<String, u32> = HashMap::new();
        for topic in self.get_all::<Topic>(self.topics)? {
            *per_roadmap.entry(topic.roadmap_id).or_default() += 1;
        }

        let mut roadmaps: Vec<Roadmap> = self.get_all(self.roadmaps)?;
        for roadmap in &mut roadmaps {
            roadmap.total_topics = per_roadmap.get(&roadmap.id).copied().unwrap_or(0);
        }
        let items: Vec<(&str, &Roadmap)> = roadmaps.iter().map(|r| (r.id.as_str(), r)).collect();
        self.bulk_put(self.roadmaps, &items)
    }
}
