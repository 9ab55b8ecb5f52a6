//! TRAM Database Layer
//!
//! Repository traits used by the API, their Postgres implementations and,
//! behind the `test-helpers` feature, an in-memory implementation.

pub mod db;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-exports: Postgres repositories
pub use db::{AttackObjectRepository, IngestionRepository, ReportRepository};

// Re-exports: Repository traits
pub use traits::{AttackObjectStore, IngestionStore, ReportStore};
