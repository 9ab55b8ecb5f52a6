//! Repository traits
//!
//! Handlers depend on these rather than on the Postgres repositories so the
//! HTTP layer can be exercised without a database.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tram_core::models::{
    AttackObject, Disposition, Document, DocumentProcessingJob, JobStatusUpdate, Mapping,
    MappingFilter, NewDocument, NewReport, Report, ReportAggregate, ReportSummary, Sentence,
    SentenceFilter, TechniqueSentenceCount,
};
use tram_core::AppError;

#[async_trait]
pub trait AttackObjectStore: Send + Sync {
    /// All techniques ordered by attack id.
    async fn list_attack_objects(&self) -> Result<Vec<AttackObject>, AppError>;

    async fn get_attack_object(&self, id: i64) -> Result<Option<AttackObject>, AppError>;

    /// Distinct mapped sentences per technique, ordered by attack id.
    async fn sentence_counts(&self) -> Result<Vec<TechniqueSentenceCount>, AppError>;
}

#[async_trait]
pub trait IngestionStore: Send + Sync {
    /// Insert the document and its pending job atomically.
    async fn create_document_with_job(
        &self,
        document: NewDocument,
    ) -> Result<(Document, DocumentProcessingJob), AppError>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>, AppError>;

    /// Whether any document row still points at this storage object.
    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool, AppError>;

    async fn get_job(&self, id: i64) -> Result<Option<DocumentProcessingJob>, AppError>;

    /// Jobs with their documents, oldest first.
    async fn list_jobs(&self) -> Result<Vec<(DocumentProcessingJob, Document)>, AppError>;

    /// Move a job along its lifecycle. Unknown ids are `NotFound`, illegal
    /// transitions are `Validation` errors on `status`.
    async fn update_job_status(
        &self,
        id: i64,
        update: JobStatusUpdate,
    ) -> Result<DocumentProcessingJob, AppError>;

    /// Delete a job, and its document when no report was built from it.
    async fn delete_job(&self, id: i64) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Create the report with all sentences and mappings in one transaction.
    ///
    /// Every mapping's `attack_id` must name a known technique; otherwise
    /// nothing is written.
    async fn create_report(&self, report: NewReport) -> Result<Report, AppError>;

    async fn list_reports(&self) -> Result<Vec<ReportSummary>, AppError>;

    async fn get_report(&self, id: i64) -> Result<Option<ReportSummary>, AppError>;

    /// Report with its sentences (by `(order, id)`) and mappings (by id).
    async fn load_aggregate(&self, id: i64) -> Result<Option<ReportAggregate>, AppError>;

    /// Delete the report, its sentences and mappings, and its source document.
    async fn delete_report(&self, id: i64) -> Result<bool, AppError>;

    async fn find_sentences(&self, filter: &SentenceFilter) -> Result<Vec<Sentence>, AppError>;

    async fn get_sentence(&self, id: i64) -> Result<Option<Sentence>, AppError>;

    async fn update_sentence_disposition(
        &self,
        id: i64,
        disposition: Option<Disposition>,
    ) -> Result<Option<Sentence>, AppError>;

    async fn find_mappings(&self, filter: &MappingFilter) -> Result<Vec<Mapping>, AppError>;

    async fn get_mapping(&self, id: i64) -> Result<Option<Mapping>, AppError>;

    /// Map a sentence to a technique. Unknown sentence or attack id is a
    /// `Validation` error on `sentence` / `attack_id`.
    async fn create_mapping(
        &self,
        sentence_id: i64,
        attack_id: &str,
        confidence: Decimal,
    ) -> Result<Mapping, AppError>;

    async fn update_mapping_confidence(
        &self,
        id: i64,
        confidence: Decimal,
    ) -> Result<Option<Mapping>, AppError>;

    async fn delete_mapping(&self, id: i64) -> Result<bool, AppError>;
}
