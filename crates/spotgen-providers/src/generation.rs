//! The polymorphic generation provider abstraction.

use async_trait::async_trait;

use spotgen_models::AspectRatio;

use crate::error::ProviderResult;

/// A request to render one clip (scene video or music track).
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Prompt describing the desired output
    pub prompt: String,
    /// Clip duration in seconds
    pub duration_secs: u32,
    /// Target aspect ratio
    pub aspect_ratio: AspectRatio,
    /// Continuity seed or product image (video models only)
    pub start_image_url: Option<String>,
    /// Negative prompt, when the model supports one
    pub negative_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, duration_secs: u32, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            duration_secs,
            aspect_ratio,
            start_image_url: None,
            negative_prompt: None,
        }
    }

    pub fn with_start_image(mut self, url: impl Into<String>) -> Self {
        self.start_image_url = Some(url.into());
        self
    }

    pub fn with_negative_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(prompt.into());
        self
    }
}

/// Polled state of an in-flight prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Still queued or running
    Processing,
    /// Finished; the rendered media is at the URL
    Completed { media_url: String },
    /// Terminal failure reported by the provider
    Failed { message: String },
}

/// A remote generative model driven by submit-then-poll.
///
/// The prediction ID returned by `submit` is opaque; it is only ever
/// handed back to `poll` and discarded once a terminal outcome is
/// observed.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Human-readable provider/model name for logs.
    fn name(&self) -> &str;

    /// Start a generation, returning the prediction handle.
    async fn submit(&self, request: &GenerationRequest) -> ProviderResult<String>;

    /// Poll an in-flight prediction.
    async fn poll(&self, prediction_id: &str) -> ProviderResult<PollOutcome>;
}
