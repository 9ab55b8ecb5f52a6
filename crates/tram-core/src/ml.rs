//! ML model metadata
//!
//! The ML pipeline runs outside this service. It publishes metadata about its
//! trained models; this module only reads it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Key the model is addressed by (`/ml/models/{key}`).
    #[serde(default)]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_trained: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trained_techniques_count: Option<u32>,
    #[serde(default)]
    pub average_f1_score: Option<f64>,
    /// Anything else the pipeline reports passes through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait ModelManager: Send + Sync {
    /// All known models, ordered by key.
    async fn all_model_metadata(&self) -> Result<Vec<ModelMetadata>, AppError>;

    /// Metadata for one model. Unknown keys are `AppError::NotFound`.
    async fn model_metadata(&self, key: &str) -> Result<ModelMetadata, AppError> {
        self.all_model_metadata()
            .await?
            .into_iter()
            .find(|m| m.key == key)
            .ok_or_else(|| AppError::NotFound(format!("Model {} not found", key)))
    }
}

/// Reads a JSON object of `{ "<key>": { ...metadata } }` on every call, so a
/// retrained model shows up without restarting the service.
#[derive(Debug, Clone)]
pub struct FileModelManager {
    path: Option<PathBuf>,
}

impl FileModelManager {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ModelManager for FileModelManager {
    async fn all_model_metadata(&self) -> Result<Vec<ModelMetadata>, AppError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };

        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Model metadata file not present");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let models: BTreeMap<String, ModelMetadata> =
            serde_json::from_slice(&raw).map_err(|e| {
                AppError::Internal(format!(
                    "Invalid model metadata in {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(models
            .into_iter()
            .map(|(key, mut metadata)| {
                metadata.key = key;
                metadata
            })
            .collect())
    }
}
