//! Postgres repositories
//!
//! One repository per aggregate: reference techniques, ingested documents
//! with their processing jobs, and reports with sentences and mappings.

pub mod attack;
pub mod ingestion;
pub mod report;

pub use attack::AttackObjectRepository;
pub use ingestion::IngestionRepository;
pub use report::ReportRepository;
