//! Shared application state

use std::sync::Arc;

use tram_core::{Config, ModelManager};
use tram_db::{AttackObjectStore, IngestionStore, ReportStore};
use tram_processing::{DocumentIngestion, UploadValidator};
use tram_storage::Storage;

/// Everything a handler needs, behind `Arc<AppState>`.
///
/// Repositories are held as trait objects so the router can be built over
/// Postgres in production and over in-memory stores in tests.
pub struct AppState {
    pub config: Config,
    pub attack_objects: Arc<dyn AttackObjectStore>,
    pub ingestion: Arc<dyn IngestionStore>,
    pub reports: Arc<dyn ReportStore>,
    pub storage: Arc<dyn Storage>,
    pub models: Arc<dyn ModelManager>,
    pub document_ingestion: DocumentIngestion,
}

impl AppState {
    pub fn new(
        config: Config,
        attack_objects: Arc<dyn AttackObjectStore>,
        ingestion: Arc<dyn IngestionStore>,
        reports: Arc<dyn ReportStore>,
        storage: Arc<dyn Storage>,
        models: Arc<dyn ModelManager>,
    ) -> Self {
        let document_ingestion = DocumentIngestion::new(
            storage.clone(),
            ingestion.clone(),
            UploadValidator::new(config.max_upload_size_bytes()),
        );
        Self {
            config,
            attack_objects,
            ingestion,
            reports,
            storage,
            models,
            document_ingestion,
        }
    }
}
