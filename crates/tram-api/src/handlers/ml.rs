//! Read-only views over the ML pipeline's output.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tram_core::models::{AttackObject, TechniqueSentenceCount};
use tram_core::{AppError, ModelMetadata};

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MlOverview {
    pub techniques: Vec<TechniqueSentenceCount>,
    #[serde(rename = "ML_ACCEPT_THRESHOLD")]
    pub ml_accept_threshold: u32,
    #[serde(rename = "ML_CONFIDENCE_THRESHOLD")]
    pub ml_confidence_threshold: u32,
    pub models: Vec<ModelMetadata>,
}

#[derive(Debug, Serialize)]
pub struct TechniqueSentences {
    pub attack_id: String,
    pub attack_techniques: Vec<AttackObject>,
}

#[derive(Debug, Serialize)]
pub struct ReportAnalysis {
    pub report_id: i64,
    pub report_name: String,
    pub attack_techniques: Vec<AttackObject>,
}

pub async fn ml_home(State(state): State<Arc<AppState>>) -> Result<Json<MlOverview>, HttpAppError> {
    let techniques = state.attack_objects.sentence_counts().await?;
    let models = state.models.all_model_metadata().await?;
    Ok(Json(MlOverview {
        techniques,
        ml_accept_threshold: state.config.ml_accept_threshold,
        ml_confidence_threshold: state.config.ml_confidence_threshold,
        models,
    }))
}

pub async fn technique_sentences(
    State(state): State<Arc<AppState>>,
    Path(attack_id): Path<String>,
) -> Result<Json<TechniqueSentences>, HttpAppError> {
    let attack_techniques = state.attack_objects.list_attack_objects().await?;
    Ok(Json(TechniqueSentences {
        attack_id,
        attack_techniques,
    }))
}

pub async fn model_detail(
    State(state): State<Arc<AppState>>,
    Path(model_key): Path<String>,
) -> Result<Json<ModelMetadata>, HttpAppError> {
    Ok(Json(state.models.model_metadata(&model_key).await?))
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<i64>,
) -> Result<Json<ReportAnalysis>, HttpAppError> {
    let summary = state
        .reports
        .get_report(report_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))?;
    let attack_techniques = state.attack_objects.list_attack_objects().await?;
    Ok(Json(ReportAnalysis {
        report_id,
        report_name: summary.report.name,
        attack_techniques,
    }))
}
