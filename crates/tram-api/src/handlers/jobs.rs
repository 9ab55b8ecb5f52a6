//! Processing job queue, as seen by analysts and the ML pipeline.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tram_core::models::{JobResponse, JobStatusUpdate};
use tram_core::AppError;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

fn job_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Job {} not found", id))
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JobResponse>>, HttpAppError> {
    let jobs = state
        .ingestion
        .list_jobs()
        .await?
        .into_iter()
        .map(|(job, document)| JobResponse::new(job, &document))
        .collect();
    Ok(Json(jobs))
}

async fn job_response(state: &AppState, job_id: i64) -> Result<JobResponse, AppError> {
    let job = state
        .ingestion
        .get_job(job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    let document = state
        .ingestion
        .get_document(job.document_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("Job {} references a missing document", job_id))
        })?;
    Ok(JobResponse::new(job, &document))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<JobResponse>, HttpAppError> {
    Ok(Json(job_response(&state, id).await?))
}

/// Status updates posted by the pipeline as it picks up and finishes work.
#[tracing::instrument(skip(state, update), fields(job_id = id, status = %update.status))]
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(update): ValidatedJson<JobStatusUpdate>,
) -> Result<Json<JobResponse>, HttpAppError> {
    let job = state.ingestion.update_job_status(id, update).await?;
    tracing::info!(job_id = job.id, status = %job.status, "Job status updated");
    Ok(Json(job_response(&state, job.id).await?))
}

pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpAppError> {
    if !state.ingestion.delete_job(id).await? {
        return Err(job_not_found(id).into());
    }
    tracing::info!(job_id = id, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}
