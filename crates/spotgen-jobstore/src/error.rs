//! Job store error types.

use thiserror::Error;

use spotgen_models::JobId;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Errors that can occur against the job store.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {0} is frozen: {1}")]
    Frozen(JobId, String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl JobStoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
