//! TRAM API Library
//!
//! HTTP surface of the report service: uploads, review, export and
//! document retrieval.

mod handlers;
mod telemetry;
mod utils;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
