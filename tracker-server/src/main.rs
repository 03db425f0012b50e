use anyhow::Context;
use tracing::info;

use tracker_core::logging::init_tracing_default;
use tracker_server::{api, recommendations::RecommendationService, storage, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing_default();
    info!("Starting roadmap tracker server v{}", env!("CARGO_PKG_VERSION"));

    // ========================================================================
    // 1. Configuration
    // ========================================================================
    let config = ServerConfig::from_env().context("invalid configuration")?;
    info!(
        port = config.api_port,
        backend = ?config.storage.backend,
        recommender = config.recommender.api_key.is_some(),
        "Configuration loaded"
    );

    // ========================================================================
    // 2. Storage (LMDB catalog + learner data backend)
    // ========================================================================
    let storage = storage::init_storage(&config.storage)
        .await
        .context("failed to initialize storage")?;

    // ========================================================================
    // 3. Services and HTTP API
    // ========================================================================
    let recommender = RecommendationService::from_config(&config.recommender);
    let state = api::ApiState::new(storage, &config, recommender);

    api::start_api_server(state, config.api_port, shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("API server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
