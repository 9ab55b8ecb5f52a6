//! `GET /docs/{id}`: hand back an ingested document byte for byte.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tram_core::AppError;

use crate::error::HttpAppError;
use crate::handlers::{attachment, AttachmentName};
use crate::state::AppState;

/// Everything but unreserved characters and `/` is escaped.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// The stored object is re-read on every request. A missing row and a
/// missing or unreadable object are both reported as not found.
#[tracing::instrument(skip(state), fields(document_id = id))]
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let document = state
        .ingestion
        .get_document(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

    let bytes = state
        .storage
        .download(&document.storage_key)
        .await
        .map_err(|e| {
            tracing::warn!(
                error = %e,
                storage_key = %document.storage_key,
                "Stored document could not be read"
            );
            AppError::StorageUnreadable(document.storage_key.clone())
        })?;

    let filename = utf8_percent_encode(document.file_name(), FILENAME_ENCODE_SET).to_string();
    Ok(attachment(
        bytes,
        "application/octet-stream",
        AttachmentName::Bare(&filename),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_encoding_keeps_unreserved() {
        let encoded = utf8_percent_encode("a b/c-d_e.f~g&h", FILENAME_ENCODE_SET).to_string();
        assert_eq!(encoded, "a%20b/c-d_e.f~g%26h");
    }
}
