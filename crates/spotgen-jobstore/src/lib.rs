//! Persisted job records.
//!
//! This crate provides:
//! - The `JobStore` trait with explicit stage-transition events
//! - An in-memory last-writer-wins implementation

pub mod error;
pub mod memory;
pub mod store;

pub use error::{JobStoreError, JobStoreResult};
pub use memory::MemoryJobStore;
pub use store::{JobStore, StageUpdate};
