//! Pipeline error types.
//!
//! Every failure carries enough context to tell the caller what stage
//! broke and why. Cancellation and deadline expiry are distinct kinds,
//! never conflated with provider or composition failures.

use thiserror::Error;

use spotgen_jobstore::JobStoreError;
use spotgen_media::MediaError;
use spotgen_models::JobId;
use spotgen_providers::ProviderError;
use spotgen_storage::StorageError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job store error: {0}")]
    JobStore(#[from] JobStoreError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("Scene {scene} failed: {source}")]
    Scene {
        scene: u32,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Job {0} is already being processed")]
    JobActive(JobId),

    #[error("Job cancelled")]
    Canceled,

    #[error("Job deadline exceeded after {0} seconds")]
    DeadlineExceeded(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, PipelineError::Canceled)
    }

    /// Attach the failing scene number. Cancellation and deadline
    /// expiry pass through unwrapped so callers can still match them.
    pub fn with_scene(self, scene: u32) -> Self {
        match self {
            PipelineError::Canceled | PipelineError::DeadlineExceeded(_) => self,
            other => PipelineError::Scene {
                scene,
                source: Box::new(other),
            },
        }
    }
}

// Provider cancellation folds into the pipeline's own cancellation
// kind so callers see one cancel signal regardless of where it landed.
impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Canceled => PipelineError::Canceled,
            other => PipelineError::Provider(other),
        }
    }
}
