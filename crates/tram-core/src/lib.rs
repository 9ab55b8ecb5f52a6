//! TRAM Core Library
//!
//! This crate provides the domain models, error types, configuration, upload
//! classification and the ML model metadata interface shared by all TRAM
//! components.

pub mod classifier;
pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use classifier::{classify, UploadRoute};
pub use config::Config;
pub use error::{AppError, ErrorMetadata, FieldErrors, LogLevel};
pub use ml::{FileModelManager, ModelManager, ModelMetadata};
pub use storage_types::StorageBackend;
// Note: Storage, StorageError, StorageResult live in tram-storage
