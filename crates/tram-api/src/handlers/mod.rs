//! HTTP handlers, one module per resource.

pub mod attack;
pub mod documents;
pub mod health;
pub mod jobs;
pub mod mappings;
pub mod ml;
pub mod reports;
pub mod sentences;
pub mod upload;

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
};
use tram_core::AppError;

/// Percent-encoded attachment name, written quoted or bare in the
/// `Content-Disposition` header.
pub(crate) enum AttachmentName<'a> {
    Quoted(&'a str),
    Bare(&'a str),
}

impl AttachmentName<'_> {
    fn content_disposition(&self) -> String {
        match self {
            AttachmentName::Quoted(name) => format!("attachment; filename=\"{}\"", name),
            AttachmentName::Bare(name) => format!("attachment; filename={}", name),
        }
    }
}

/// Build a download response.
pub(crate) fn attachment(
    bytes: Vec<u8>,
    content_type: &str,
    name: AttachmentName<'_>,
) -> Result<Response<Body>, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, name.content_disposition())
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_quoting() {
        assert_eq!(
            AttachmentName::Quoted("Acme%20Report.json").content_disposition(),
            "attachment; filename=\"Acme%20Report.json\""
        );
        assert_eq!(
            AttachmentName::Bare("report.pdf").content_disposition(),
            "attachment; filename=report.pdf"
        );
    }

    #[test]
    fn test_attachment_sets_headers() {
        let response = attachment(
            b"{}".to_vec(),
            "application/json",
            AttachmentName::Quoted("r.json"),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "2");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"r.json\""
        );
    }
}
