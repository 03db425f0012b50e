//! Storage Layer - Unified data access for the learning tracker
//!
//! Implements the Repository pattern over two tiers:
//! - **LMDB**: static catalog (roadmaps, sections, topics, badge definitions)
//! - **PostgreSQL** (or in-memory): profiles and everything the progress
//!   engine writes
//!
//! ## Architecture
//! ```text
//! [ProgressEngine / read models]
//!       ↓
//! [Repository Traits]
//!       ↓
//! ┌──────────────────┬──────────────────────────┐
//! │ LmdbCatalogStore │ PostgresStore            │
//! │ (curriculum)     │ or MemoryProgressStore   │
//! │ + RepoAdapters   │ + RepoAdapters           │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let config = ServerConfig::from_env()?;
//! let storage = init_storage(&config.storage).await?;
//! let topic = storage.roadmaps.get_topic("dsa-heaps").await?;
//! ```

pub mod lmdb_catalog;
pub mod lmdb_repo_adapter;
pub mod memory;
pub mod migrations;
pub mod postgres;
pub mod postgres_repo_adapter;
pub mod repository;
pub mod seed_data;

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

use self::lmdb_catalog::LmdbCatalogStore;
use self::lmdb_repo_adapter::{LmdbBadgeRepo, LmdbRoadmapRepo};
use self::memory::MemoryProgressStore;
use self::postgres::PostgresStore;
use self::postgres_repo_adapter::{PgProfileRepo, PgProgressRepo};
use self::repository::{StorageManager, StoreError};

/// Open the LMDB catalog and seed it
pub fn open_catalog<P: AsRef<Path>>(
    path: P,
    max_size: usize,
) -> Result<Arc<LmdbCatalogStore>, StoreError> {
    let catalog = Arc::new(LmdbCatalogStore::new(path, max_size)?);
    seed_data::seed_all(&catalog)?;
    info!("{}", catalog.stats()?.summary());
    Ok(catalog)
}

/// Catalog from LMDB, learner data in process memory
pub fn with_memory_backend(
    catalog: Arc<LmdbCatalogStore>,
    memory: MemoryProgressStore,
) -> StorageManager {
    StorageManager {
        roadmaps: Box::new(LmdbRoadmapRepo::new(catalog.clone())),
        badges: Box::new(LmdbBadgeRepo::new(catalog)),
        profiles: Box::new(memory.clone()),
        progress: Box::new(memory),
    }
}

/// Catalog from LMDB, learner data in PostgreSQL
pub fn with_postgres_backend(
    catalog: Arc<LmdbCatalogStore>,
    pg: Arc<PostgresStore>,
) -> StorageManager {
    StorageManager {
        roadmaps: Box::new(LmdbRoadmapRepo::new(catalog.clone())),
        badges: Box::new(LmdbBadgeRepo::new(catalog)),
        profiles: Box::new(PgProfileRepo::new(pg.clone())),
        progress: Box::new(PgProgressRepo::new(pg)),
    }
}

/// Initialize the complete storage layer
///
/// Opens and seeds the LMDB catalog, then connects the configured learner
/// data backend (running migrations for PostgreSQL).
pub async fn init_storage(config: &StorageConfig) -> Result<StorageManager, StoreError> {
    let catalog = open_catalog(&config.lmdb_path, config.lmdb_max_size)?;
    info!("LMDB catalog store initialized at: {}", config.lmdb_path);

    let manager = match config.backend {
        StorageBackend::Postgres => {
            let pg = PostgresStore::new(&config.database_url, config.pg_max_connections).await?;
            info!("PostgreSQL progress store initialized");
            with_postgres_backend(catalog, Arc::new(pg))
        }
        StorageBackend::Memory => {
            info!("In-memory progress store initialized (data is not persisted)");
            with_memory_backend(catalog, MemoryProgressStore::new())
        }
    };

    Ok(manager)
}
