//! Test helpers
//!
//! An in-memory implementation of every repository trait, so handlers and
//! services can be tested without a database.

pub mod memory;

pub use memory::InMemoryStore;
