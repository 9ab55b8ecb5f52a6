use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tram_core::models::{
    Document, DocumentProcessingJob, JobStatus, JobStatusUpdate, NewDocument,
};
use tram_core::{AppError, FieldErrors};

use crate::traits::IngestionStore;

/// Channel the ML pipeline listens on for new jobs.
pub const NEW_JOB_CHANNEL: &str = "tram_new_job";

const DOCUMENT_COLUMNS: &str =
    "id, storage_key, original_name, content_type, file_size, created_by, created_on";
const JOB_COLUMNS: &str =
    "id, document_id, status, message, created_by, created_on, updated_on";

/// Documents and their processing jobs
#[derive(Clone)]
pub struct IngestionRepository {
    pool: PgPool,
}

impl IngestionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Wake the ML pipeline. Sent on its own connection once the job row is
    /// committed; a failure here never affects the ingestion itself.
    async fn notify_new_job(&self, job_id: i64) {
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NEW_JOB_CHANNEL)
            .bind(job_id.to_string())
            .execute(&self.pool)
            .await
        {
            tracing::warn!(
                error = %e,
                job_id,
                "Failed to send pg_notify for new job, pipeline will discover it via polling"
            );
        }
    }
}

#[async_trait]
impl IngestionStore for IngestionRepository {
    #[tracing::instrument(skip(self, document), fields(db.table = "documents", db.operation = "insert"))]
    async fn create_document_with_job(
        &self,
        document: NewDocument,
    ) -> Result<(Document, DocumentProcessingJob), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for document ingestion")?;

        let doc = sqlx::query_as::<Postgres, Document>(&format!(
            r#"
            INSERT INTO documents (storage_key, original_name, content_type, file_size, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(&document.storage_key)
        .bind(&document.original_name)
        .bind(&document.content_type)
        .bind(document.file_size)
        .bind(&document.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                storage_key = %document.storage_key,
                "Failed to insert document into database"
            );
            AppError::from(e)
        })?;

        let job = sqlx::query_as::<Postgres, DocumentProcessingJob>(&format!(
            r#"
            INSERT INTO document_processing_jobs (document_id, status, message, created_by)
            VALUES ($1, $2, '', $3)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(doc.id)
        .bind(JobStatus::Pending)
        .bind(&document.created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!(
                error = %e,
                job_id = job.id,
                "Failed to commit transaction for document ingestion"
            );
            AppError::from(e)
        })?;

        self.notify_new_job(job.id).await;

        tracing::info!(
            document_id = doc.id,
            job_id = job.id,
            content_type = %doc.content_type,
            file_size = doc.file_size,
            created_by = %doc.created_by,
            "Document queued for processing"
        );

        Ok((doc, job))
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", db.record_id = %id))]
    async fn get_document(&self, id: i64) -> Result<Option<Document>, AppError> {
        let doc = sqlx::query_as::<Postgres, Document>(&format!(
            "SELECT {} FROM documents WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool, AppError> {
        let in_use = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE storage_key = $1)",
        )
        .bind(storage_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(in_use)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_processing_jobs", db.operation = "select", db.record_id = %id))]
    async fn get_job(&self, id: i64) -> Result<Option<DocumentProcessingJob>, AppError> {
        let job = sqlx::query_as::<Postgres, DocumentProcessingJob>(&format!(
            "SELECT {} FROM document_processing_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_processing_jobs", db.operation = "select"))]
    async fn list_jobs(&self) -> Result<Vec<(DocumentProcessingJob, Document)>, AppError> {
        let jobs = sqlx::query_as::<Postgres, DocumentProcessingJob>(&format!(
            "SELECT {} FROM document_processing_jobs ORDER BY created_on ASC, id ASC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let document_ids: Vec<i64> = jobs.iter().map(|j| j.document_id).collect();
        let documents = sqlx::query_as::<Postgres, Document>(&format!(
            "SELECT {} FROM documents WHERE id = ANY($1)",
            DOCUMENT_COLUMNS
        ))
        .bind(&document_ids)
        .fetch_all(&self.pool)
        .await?;

        // document_id is a NOT NULL foreign key, so every job has its document
        Ok(jobs
            .into_iter()
            .filter_map(|job| {
                let doc = documents.iter().find(|d| d.id == job.document_id)?.clone();
                Some((job, doc))
            })
            .collect())
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "document_processing_jobs", db.operation = "update", db.record_id = %id))]
    async fn update_job_status(
        &self,
        id: i64,
        update: JobStatusUpdate,
    ) -> Result<DocumentProcessingJob, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for job update")?;

        let current = sqlx::query_scalar::<Postgres, JobStatus>(
            "SELECT status FROM document_processing_jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        if !current.can_transition_to(update.status) {
            return Err(AppError::Validation(FieldErrors::single(
                "status",
                format!("Cannot move job from {} to {}", current, update.status),
            )));
        }

        let job = sqlx::query_as::<Postgres, DocumentProcessingJob>(&format!(
            r#"
            UPDATE document_processing_jobs
            SET status = $2, message = COALESCE($3, message), updated_on = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(update.status)
        .bind(update.message.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit()
            .await
            .context("Failed to commit transaction for job update")?;

        tracing::info!(job_id = id, from = %current, to = %job.status, "Job status updated");

        Ok(job)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_processing_jobs", db.operation = "delete", db.record_id = %id))]
    async fn delete_job(&self, id: i64) -> Result<bool, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for job deletion")?;

        let document_id = sqlx::query_scalar::<Postgres, i64>(
            "DELETE FROM document_processing_jobs WHERE id = $1 RETURNING document_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(document_id) = document_id else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            DELETE FROM documents d
            WHERE d.id = $1
              AND NOT EXISTS (SELECT 1 FROM reports r WHERE r.document_id = d.id)
              AND NOT EXISTS (SELECT 1 FROM document_processing_jobs j WHERE j.document_id = d.id)
            "#,
        )
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .context("Failed to commit transaction for job deletion")?;

        tracing::info!(job_id = id, document_id, "Job deleted");

        Ok(true)
    }
}
