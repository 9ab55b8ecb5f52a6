//! Analyst edits to sentence-to-technique mappings.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use tram_core::models::{
    confidence_in_range, CreateMappingRequest, Mapping, MappingFilter, UpdateMappingRequest,
};
use tram_core::{AppError, FieldErrors};

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Mappings added by hand carry full confidence unless told otherwise.
const ANALYST_CONFIDENCE: Decimal = Decimal::ONE_HUNDRED;

fn mapping_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Mapping {} not found", id))
}

fn check_confidence(confidence: Decimal) -> Result<Decimal, AppError> {
    if confidence_in_range(confidence) {
        Ok(confidence)
    } else {
        Err(AppError::Validation(FieldErrors::single(
            "confidence",
            "Ensure this value is between 0 and 100.",
        )))
    }
}

pub async fn list_mappings(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MappingFilter>,
) -> Result<Json<Vec<Mapping>>, HttpAppError> {
    Ok(Json(state.reports.find_mappings(&filter).await?))
}

pub async fn get_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Mapping>, HttpAppError> {
    let mapping = state
        .reports
        .get_mapping(id)
        .await?
        .ok_or_else(|| mapping_not_found(id))?;
    Ok(Json(mapping))
}

#[tracing::instrument(skip(state, request), fields(sentence_id = request.sentence_id, attack_id = %request.attack_id))]
pub async fn create_mapping(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateMappingRequest>,
) -> Result<(StatusCode, Json<Mapping>), HttpAppError> {
    let confidence = check_confidence(request.confidence.unwrap_or(ANALYST_CONFIDENCE))?;
    let mapping = state
        .reports
        .create_mapping(request.sentence_id, &request.attack_id, confidence)
        .await?;
    tracing::info!(mapping_id = mapping.id, "Mapping created");
    Ok((StatusCode::CREATED, Json(mapping)))
}

pub async fn update_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateMappingRequest>,
) -> Result<Json<Mapping>, HttpAppError> {
    let confidence = check_confidence(request.confidence)?;
    let mapping = state
        .reports
        .update_mapping_confidence(id, confidence)
        .await?
        .ok_or_else(|| mapping_not_found(id))?;
    Ok(Json(mapping))
}

pub async fn delete_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpAppError> {
    if !state.reports.delete_mapping(id).await? {
        return Err(mapping_not_found(id).into());
    }
    tracing::info!(mapping_id = id, "Mapping deleted");
    Ok(StatusCode::NO_CONTENT)
}
