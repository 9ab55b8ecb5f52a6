//! TRAM Processing Library
//!
//! Everything between an uploaded file and a stored or exported report:
//! upload validation, document ingestion, the canonical report export
//! (serialize and validated import) and DOCX rendering.

pub mod docx;
pub mod export;
pub mod import;
pub mod ingestion;
pub mod validator;

pub use docx::{render_docx, technique_summary, RenderError, TechniqueRow, DOCX_CONTENT_TYPE};
pub use export::{MappingExport, ReportExport, ReportImport, SentenceExport};
pub use import::import_report;
pub use ingestion::{DocumentIngestion, UploadedFile};
pub use validator::{UploadValidator, ValidationError};
