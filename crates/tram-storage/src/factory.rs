use crate::{LocalStorage, Storage, StorageBackend, StorageResult};
use std::sync::Arc;
use tram_core::Config;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.local_storage_path.clone()).await?;
            Ok(Arc::new(storage))
        }
    }
}
