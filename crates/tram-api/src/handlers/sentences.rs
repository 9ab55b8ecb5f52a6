use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tram_core::models::{Sentence, SentenceFilter, UpdateSentenceRequest};
use tram_core::AppError;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

fn sentence_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Sentence {} not found", id))
}

/// `?report-id=` and `?attack-id=` narrow the listing; both may be combined.
pub async fn list_sentences(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SentenceFilter>,
) -> Result<Json<Vec<Sentence>>, HttpAppError> {
    Ok(Json(state.reports.find_sentences(&filter).await?))
}

pub async fn get_sentence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Sentence>, HttpAppError> {
    let sentence = state
        .reports
        .get_sentence(id)
        .await?
        .ok_or_else(|| sentence_not_found(id))?;
    Ok(Json(sentence))
}

/// Accept or reject a sentence; `null` puts it back under review.
#[tracing::instrument(skip(state, request), fields(sentence_id = id))]
pub async fn update_sentence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateSentenceRequest>,
) -> Result<Json<Sentence>, HttpAppError> {
    let sentence = state
        .reports
        .update_sentence_disposition(id, request.disposition)
        .await?
        .ok_or_else(|| sentence_not_found(id))?;
    tracing::info!(sentence_id = id, disposition = ?sentence.disposition, "Sentence reviewed");
    Ok(Json(sentence))
}
