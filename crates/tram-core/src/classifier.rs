//! Upload classification
//!
//! Decides which ingestion path an uploaded file takes from its declared
//! content type alone.

use std::fmt::{Display, Formatter, Result as FmtResult};

pub const PDF: &str = "application/pdf";
pub const HTML: &str = "text/html";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PLAIN_TEXT: &str = "text/plain";
pub const JSON: &str = "application/json";

/// Content types handed to the document ingestion pipeline.
pub const DOCUMENT_CONTENT_TYPES: [&str; 4] = [PDF, HTML, DOCX, PLAIN_TEXT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRoute {
    /// Store the file and queue a processing job for the ML pipeline.
    DocumentIngest,
    /// Parse the file as a canonical report export and create the report directly.
    JsonImport,
    Unsupported,
}

impl Display for UploadRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadRoute::DocumentIngest => write!(f, "document_ingest"),
            UploadRoute::JsonImport => write!(f, "json_import"),
            UploadRoute::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Strip parameters (`; charset=...`), surrounding whitespace and case.
pub fn normalize_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub fn classify(content_type: &str) -> UploadRoute {
    let media_type = normalize_media_type(content_type);
    if DOCUMENT_CONTENT_TYPES.contains(&media_type.as_str()) {
        UploadRoute::DocumentIngest
    } else if media_type == JSON {
        UploadRoute::JsonImport
    } else {
        UploadRoute::Unsupported
    }
}

/// File extension used for the content-addressed storage key.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match normalize_media_type(content_type).as_str() {
        PDF => Some("pdf"),
        HTML => Some("html"),
        DOCX => Some("docx"),
        PLAIN_TEXT => Some("txt"),
        JSON => Some("json"),
        _ => None,
    }
}
