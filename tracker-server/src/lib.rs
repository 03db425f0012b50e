//! Roadmap Tracker Server Library
//!
//! This library provides the service around `tracker-core`:
//! - Environment-driven configuration
//! - Storage tiers: LMDB catalog, PostgreSQL (or in-memory) learner data
//! - The progress engine (serialised, compare-and-swap accrual)
//! - Read models for dashboards, badges, roadmaps and the leaderboard
//! - Suggested next steps with a static fallback
//! - HTTP/JSON API and server metrics

pub mod accrual;  // Progress engine (write path)
pub mod api;  // HTTP/JSON API endpoints
pub mod config;  // Environment configuration
pub mod dashboard;  // Read models
pub mod metrics;  // Server metrics (Prometheus + JSON export)
pub mod recommendations;  // Generative suggestions with fallback
pub mod storage;  // Unified data storage (LMDB + PostgreSQL)

// Re-export commonly used types
pub use accrual::{AccrualError, ProgressEngine};
pub use config::ServerConfig;
pub use storage::lmdb_catalog::LmdbCatalogStore;
pub use storage::memory::MemoryProgressStore;
pub use storage::postgres::PostgresStore;
