//! Report listing, deletion and export.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tram_core::models::{ReportAggregate, ReportSummary};
use tram_core::AppError;
use tram_processing::{render_docx, ReportExport, DOCX_CONTENT_TYPE};

use crate::error::HttpAppError;
use crate::handlers::{attachment, AttachmentName};
use crate::state::AppState;

fn report_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Report {} not found", id))
}

/// Report name with every non-alphanumeric byte percent-encoded.
pub(crate) fn export_filename(name: &str, extension: &str) -> String {
    format!("{}.{}", urlencoding::encode(name), extension)
}

async fn load_aggregate(state: &AppState, id: i64) -> Result<ReportAggregate, AppError> {
    state
        .reports
        .load_aggregate(id)
        .await?
        .ok_or_else(|| report_not_found(id))
}

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReportSummary>>, HttpAppError> {
    Ok(Json(state.reports.list_reports().await?))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ReportSummary>, HttpAppError> {
    let report = state
        .reports
        .get_report(id)
        .await?
        .ok_or_else(|| report_not_found(id))?;
    Ok(Json(report))
}

#[tracing::instrument(skip(state), fields(report_id = id))]
pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpAppError> {
    if !state.reports.delete_report(id).await? {
        return Err(report_not_found(id).into());
    }
    tracing::info!(report_id = id, "Report deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state), fields(report_id = id))]
pub async fn export_json(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let aggregate = load_aggregate(&state, id).await?;
    let export = ReportExport::from_aggregate(&aggregate);
    let bytes = export
        .to_json_bytes()
        .map_err(|e| AppError::Internal(format!("Failed to serialize report: {}", e)))?;

    Ok(attachment(
        bytes,
        "application/json",
        AttachmentName::Quoted(&export_filename(&export.name, "json")),
    )?)
}

/// The archive is fully built before any byte is sent, so a render failure
/// is still a clean error response.
#[tracing::instrument(skip(state), fields(report_id = id))]
pub async fn export_docx(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let aggregate = load_aggregate(&state, id).await?;
    let export = ReportExport::from_aggregate(&aggregate);
    let techniques = state.attack_objects.list_attack_objects().await?;
    let bytes = render_docx(&export, &techniques).map_err(AppError::from)?;

    tracing::debug!(size = bytes.len(), "Rendered report document");
    Ok(attachment(
        bytes,
        DOCX_CONTENT_TYPE,
        AttachmentName::Quoted(&export_filename(&export.name, "docx")),
    )?)
}
