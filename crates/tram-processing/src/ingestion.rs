//! Document ingestion
//!
//! Stores an uploaded document and queues it for the ML pipeline.

use std::sync::Arc;

use tram_core::models::{Document, DocumentProcessingJob, NewDocument};
use tram_core::AppError;
use tram_db::IngestionStore;
use tram_storage::{document_key, Storage};

use crate::validator::UploadValidator;

/// A fully read upload. The bytes are owned, so nothing depends on the
/// request body once ingestion starts.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

#[derive(Clone)]
pub struct DocumentIngestion {
    storage: Arc<dyn Storage>,
    store: Arc<dyn IngestionStore>,
    validator: UploadValidator,
}

impl DocumentIngestion {
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<dyn IngestionStore>,
        validator: UploadValidator,
    ) -> Self {
        Self {
            storage,
            store,
            validator,
        }
    }

    /// Store the file under its content-addressed key, then create the
    /// document and its pending job in one transaction.
    ///
    /// Identical content maps to the same key, so an object that already
    /// exists is left untouched. If the database write fails the object is
    /// removed again, but only when this call created it and no document
    /// row references it.
    #[tracing::instrument(skip(self, file), fields(content_type = %file.content_type, size = file.data.len()))]
    pub async fn create_from_file(
        &self,
        file: UploadedFile,
        creator: &str,
    ) -> Result<(Document, DocumentProcessingJob), AppError> {
        self.validator.validate_file_size(file.data.len())?;

        let storage_key = document_key(&file.data, &file.content_type, &file.file_name);
        let file_size = file.data.len() as i64;

        let existed = self
            .storage
            .exists(&storage_key)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        if existed {
            tracing::debug!(storage_key = %storage_key, "Document content already stored");
        } else {
            self.storage
                .upload_with_key(&storage_key, file.data, &file.content_type)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, storage_key = %storage_key, "Failed to store uploaded document");
                    AppError::Storage(e.to_string())
                })?;
        }

        let new_document = NewDocument {
            storage_key: storage_key.clone(),
            original_name: if file.file_name.trim().is_empty() {
                "upload".to_string()
            } else {
                file.file_name
            },
            content_type: file.content_type,
            file_size,
            created_by: creator.to_string(),
        };

        match self.store.create_document_with_job(new_document).await {
            Ok((document, job)) => Ok((document, job)),
            Err(e) => {
                if !existed {
                    self.remove_unreferenced(&storage_key).await;
                }
                Err(e)
            }
        }
    }

    /// Delete a stored object no document points at. Anything uncertain
    /// leaves the object in place.
    async fn remove_unreferenced(&self, storage_key: &str) {
        match self.store.storage_key_in_use(storage_key).await {
            Ok(false) => {
                if let Err(e) = self.storage.delete(storage_key).await {
                    tracing::warn!(
                        error = %e,
                        storage_key = %storage_key,
                        "Failed to remove stored document after database error"
                    );
                }
            }
            Ok(true) => {
                tracing::debug!(storage_key = %storage_key, "Stored document is referenced by another row, keeping it");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    storage_key = %storage_key,
                    "Could not check document references, keeping stored object"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tram_core::models::JobStatus;
    use tram_db::test_helpers::InMemoryStore;
    use tram_storage::{LocalStorage, StorageBackend, StorageResult};

    /// Local storage that counts writes.
    struct CountingStorage {
        inner: LocalStorage,
        uploads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Storage for CountingStorage {
        async fn upload_with_key(
            &self,
            storage_key: &str,
            data: Vec<u8>,
            content_type: &str,
        ) -> StorageResult<()> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.inner.upload_with_key(storage_key, data, content_type).await
        }

        async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
            self.inner.download(storage_key).await
        }

        async fn delete(&self, storage_key: &str) -> StorageResult<()> {
            self.inner.delete(storage_key).await
        }

        async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
            self.inner.exists(storage_key).await
        }

        fn backend_type(&self) -> StorageBackend {
            self.inner.backend_type()
        }
    }

    async fn setup() -> (tempfile::TempDir, Arc<LocalStorage>, InMemoryStore, DocumentIngestion) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let store = InMemoryStore::new();
        let ingestion = DocumentIngestion::new(
            storage.clone(),
            Arc::new(store.clone()),
            UploadValidator::new(1024),
        );
        (dir, storage, store, ingestion)
    }

    fn pdf(data: &[u8]) -> UploadedFile {
        UploadedFile {
            data: data.to_vec(),
            content_type: "application/pdf".to_string(),
            file_name: "report.pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stores_exact_bytes_and_queues_job() {
        let (_dir, storage, store, ingestion) = setup().await;
        let data = b"%PDF-1.7\n\x00\x01binary".to_vec();

        let (document, job) = ingestion.create_from_file(pdf(&data), "alice").await.unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.document_id, document.id);
        assert_eq!(document.file_size, data.len() as i64);
        assert_eq!(document.original_name, "report.pdf");
        assert!(document.storage_key.starts_with("documents/"));
        assert!(document.storage_key.ends_with(".pdf"));
        assert_eq!(storage.download(&document.storage_key).await.unwrap(), data);
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_and_oversized_files_are_rejected() {
        let (_dir, _storage, store, ingestion) = setup().await;

        let err = ingestion.create_from_file(pdf(b""), "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = ingestion
            .create_from_file(pdf(&vec![b'a'; 2048]), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn test_database_failure_removes_new_object() {
        let (_dir, storage, store, ingestion) = setup().await;
        store.set_fail_writes(true);

        let data = b"%PDF-1.4 orphan".to_vec();
        let key = document_key(&data, "application/pdf", "report.pdf");
        assert!(ingestion.create_from_file(pdf(&data), "alice").await.is_err());
        assert!(!storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_database_failure_keeps_shared_object() {
        let (_dir, storage, store, ingestion) = setup().await;
        let data = b"%PDF-1.4 shared".to_vec();
        let (first, _) = ingestion.create_from_file(pdf(&data), "alice").await.unwrap();

        store.set_fail_writes(true);
        assert!(ingestion.create_from_file(pdf(&data), "bob").await.is_err());
        assert!(storage.exists(&first.storage_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_identical_upload_does_not_rewrite_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(CountingStorage {
            inner: LocalStorage::new(dir.path()).await.unwrap(),
            uploads: AtomicUsize::new(0),
        });
        let store = InMemoryStore::new();
        let ingestion = DocumentIngestion::new(
            storage.clone(),
            Arc::new(store.clone()),
            UploadValidator::new(1024),
        );
        let data = b"%PDF-1.4 same content".to_vec();

        let (first, _) = ingestion.create_from_file(pdf(&data), "alice").await.unwrap();
        let (second, _) = ingestion.create_from_file(pdf(&data), "bob").await.unwrap();

        assert_eq!(first.storage_key, second.storage_key);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(store.document_count(), 2);
        assert_eq!(storage.download(&second.storage_key).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_database_failure_keeps_object_referenced_by_another_row() {
        let (_dir, storage, store, ingestion) = setup().await;
        let data = b"%PDF-1.4 raced".to_vec();
        let (first, _) = ingestion.create_from_file(pdf(&data), "alice").await.unwrap();

        // The object is missing when the next upload looks, but a row for the
        // same key is committed by the time its own insert fails.
        storage.delete(&first.storage_key).await.unwrap();
        store.set_fail_writes(true);

        assert!(ingestion.create_from_file(pdf(&data), "bob").await.is_err());
        assert!(storage.exists(&first.storage_key).await.unwrap());
        assert_eq!(storage.download(&first.storage_key).await.unwrap(), data);
    }
}
