//! Storage setup and initialization

use std::sync::Arc;

use anyhow::{Context, Result};
use tram_core::Config;
use tram_storage::{create_storage, Storage};

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(
        backend = ?storage.backend_type(),
        path = %config.local_storage_path.display(),
        "Storage initialized"
    );
    Ok(storage)
}
