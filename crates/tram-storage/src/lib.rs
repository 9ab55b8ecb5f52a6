//! TRAM Storage Library
//!
//! Storage abstraction for uploaded documents and its local filesystem
//! implementation.
//!
//! # Storage key format
//!
//! Documents are content-addressed: `documents/{sha256-hex}.{ext}`. Uploading
//! the same bytes twice yields the same key. Keys must not contain `..` or a
//! leading `/`. Key generation lives in the `keys` module.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::document_key;
pub use local::LocalStorage;
pub use tram_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult};
