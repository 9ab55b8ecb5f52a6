//! Data models for the application
//!
//! Row types mirror the database tables; the `New*` and `*Update` types are
//! the inputs repositories accept.

mod attack;
mod document;
mod job;
mod report;

pub use attack::*;
pub use document::*;
pub use job::*;
pub use report::*;
