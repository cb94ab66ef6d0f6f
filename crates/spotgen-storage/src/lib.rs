//! S3-compatible asset store.
//!
//! This crate provides:
//! - The `AssetStore` trait the pipeline renders against
//! - An aws-sdk-s3 implementation with presigned GET URLs
//! - An in-memory implementation for tests

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3AssetStore, S3Config};
pub use error::{StorageError, StorageResult};
pub use store::{AssetStore, MemoryAssetStore};
