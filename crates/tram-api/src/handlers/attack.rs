use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tram_core::models::AttackObject;
use tram_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

pub async fn list_attack_objects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AttackObject>>, HttpAppError> {
    Ok(Json(state.attack_objects.list_attack_objects().await?))
}

pub async fn get_attack_object(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<AttackObject>, HttpAppError> {
    let object = state
        .attack_objects
        .get_attack_object(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attack object {} not found", id)))?;
    Ok(Json(object))
}
