//! `POST /upload`: the single entry point for new reports.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tram_core::{classify, AppError, UploadRoute};
use tram_processing::import_report;

use crate::auth::RemoteUser;
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::upload::extract_multipart_file;

pub const UPLOAD_ACCEPTED: &str = "File saved for processing.";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    #[serde(rename = "job-id", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
    #[serde(rename = "doc-id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<i64>,
}

/// Route the upload by its declared content type: documents are stored and
/// queued for the ML pipeline, JSON exports are imported as reports directly.
#[tracing::instrument(skip(state, multipart), fields(user = %user.name()))]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    user: RemoteUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let file = extract_multipart_file(multipart).await?;
    let route = classify(&file.content_type);
    tracing::debug!(content_type = %file.content_type, route = %route, "Classified upload");

    match route {
        UploadRoute::DocumentIngest => {
            let (document, job) = state
                .document_ingestion
                .create_from_file(file, user.name())
                .await?;
            tracing::info!(
                document_id = document.id,
                job_id = job.id,
                storage_key = %document.storage_key,
                "Document queued for processing"
            );
            Ok(Json(UploadResponse {
                message: UPLOAD_ACCEPTED,
                job_id: Some(job.id),
                doc_id: Some(document.id),
            }))
        }
        UploadRoute::JsonImport => {
            let report = import_report(
                state.reports.as_ref(),
                state.attack_objects.as_ref(),
                &file.data,
                user.name(),
            )
            .await?;
            tracing::info!(report_id = report.id, "Report imported");
            Ok(Json(UploadResponse {
                message: UPLOAD_ACCEPTED,
                job_id: None,
                doc_id: None,
            }))
        }
        UploadRoute::Unsupported => Err(AppError::UnsupportedMediaType(file.content_type).into()),
    }
}

pub async fn method_not_allowed() -> HttpAppError {
    AppError::MethodNotAllowed("Request method must be POST".to_string()).into()
}
