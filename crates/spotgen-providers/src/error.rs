//! Provider error types.

use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur against remote generative services.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation cancelled by provider: {0}")]
    CanceledByProvider(String),

    #[error("Polling timed out after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    #[error("Polling cancelled")]
    Canceled,

    #[error("Provider returned no output")]
    MissingOutput,

    #[error("Unexpected response: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether the error is the distinct cancellation kind rather than
    /// a provider failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ProviderError::Canceled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::PollTimeout { .. })
    }
}
