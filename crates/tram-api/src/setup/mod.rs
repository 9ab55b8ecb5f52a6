//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use tram_core::{Config, FileModelManager};
use tram_db::{AttackObjectRepository, IngestionRepository, ReportRepository};

use crate::state::AppState;

/// Validate config, install tracing, connect to Postgres and storage, and
/// build the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let models = Arc::new(FileModelManager::new(config.ml_model_metadata_path.clone()));
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(AttackObjectRepository::new(pool.clone())),
        Arc::new(IngestionRepository::new(pool.clone())),
        Arc::new(ReportRepository::new(pool)),
        storage,
        models,
    ));

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
