//! Multipart upload helpers

use axum::extract::Multipart;
use tram_core::AppError;
use tram_processing::UploadedFile;

/// Read the single `file` field of a multipart form into memory.
///
/// The part's own content type is what the file is classified by; a part
/// without one is treated as `application/octet-stream`.
pub async fn extract_multipart_file(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if upload.is_some() {
            return Err(AppError::BadRequest(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {}", e)))?;

        upload = Some(UploadedFile {
            data: data.to_vec(),
            content_type,
            file_name,
        });
    }

    upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))
}
