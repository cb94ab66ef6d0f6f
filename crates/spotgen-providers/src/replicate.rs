//! Replicate-backed generation providers.
//!
//! One client drives both the video models (per-scene clips) and the
//! music model; the input payload differs per model family.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::generation::{GenerationProvider, GenerationRequest, PollOutcome};

const REPLICATE_API_BASE: &str = "https://api.replicate.com/v1";

/// Video generation model variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoModel {
    /// Kling v1.6 image+text to video
    Kling,
    /// Wan 2.1 text/image to video
    Wan,
}

impl VideoModel {
    fn model_path(&self) -> &'static str {
        match self {
            VideoModel::Kling => "kwaivgi/kling-v1.6-standard",
            VideoModel::Wan => "wavespeedai/wan-2.1-i2v-480p",
        }
    }
}

/// Music generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicModel {
    /// MusicGen stereo
    MusicGen,
}

impl MusicModel {
    fn model_path(&self) -> &'static str {
        match self {
            MusicModel::MusicGen => "meta/musicgen",
        }
    }
}

enum ModelFamily {
    Video(VideoModel),
    Music(MusicModel),
}

/// Replicate API client implementing `GenerationProvider`.
pub struct ReplicateProvider {
    client: Client,
    api_token: String,
    family: ModelFamily,
    name: String,
}

impl ReplicateProvider {
    /// Create a video provider for a model variant.
    pub fn video(model: VideoModel) -> ProviderResult<Self> {
        let api_token = std::env::var("REPLICATE_API_TOKEN")
            .map_err(|_| ProviderError::config("REPLICATE_API_TOKEN not set"))?;
        Ok(Self {
            client: Client::new(),
            api_token,
            name: format!("replicate:{}", model.model_path()),
            family: ModelFamily::Video(model),
        })
    }

    /// Create a music provider.
    pub fn music(model: MusicModel) -> ProviderResult<Self> {
        let api_token = std::env::var("REPLICATE_API_TOKEN")
            .map_err(|_| ProviderError::config("REPLICATE_API_TOKEN not set"))?;
        Ok(Self {
            client: Client::new(),
            api_token,
            name: format!("replicate:{}", model.model_path()),
            family: ModelFamily::Music(model),
        })
    }

    fn model_path(&self) -> &'static str {
        match &self.family {
            ModelFamily::Video(m) => m.model_path(),
            ModelFamily::Music(m) => m.model_path(),
        }
    }

    fn build_input(&self, request: &GenerationRequest) -> serde_json::Value {
        match &self.family {
            ModelFamily::Video(_) => {
                let mut input = json!({
                    "prompt": request.prompt,
                    "duration": request.duration_secs,
                    "aspect_ratio": request.aspect_ratio.as_str(),
                });
                if let Some(url) = &request.start_image_url {
                    input["start_image"] = json!(url);
                }
                if let Some(neg) = &request.negative_prompt {
                    input["negative_prompt"] = json!(neg);
                }
                input
            }
            ModelFamily::Music(_) => json!({
                "prompt": request.prompt,
                "duration": request.duration_secs,
                "output_format": "mp3",
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Pull the media URL out of a prediction output, which Replicate
/// returns either as a bare string or an array of strings.
fn extract_media_url(output: &serde_json::Value) -> Option<String> {
    match output {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => items
            .iter()
            .find_map(|v| v.as_str().map(|s| s.to_string())),
        _ => None,
    }
}

/// Map a prediction's lifecycle status onto a poll outcome. A
/// provider-side cancellation is its own error kind, distinct from a
/// generation failure.
fn prediction_outcome(prediction: PredictionResponse) -> ProviderResult<PollOutcome> {
    match prediction.status.as_str() {
        "starting" | "processing" => Ok(PollOutcome::Processing),
        "succeeded" => {
            let media_url = prediction
                .output
                .as_ref()
                .and_then(extract_media_url)
                .ok_or(ProviderError::MissingOutput)?;
            Ok(PollOutcome::Completed { media_url })
        }
        "canceled" => Err(ProviderError::CanceledByProvider(prediction.id)),
        _ => Ok(PollOutcome::Failed {
            message: prediction
                .error
                .unwrap_or_else(|| format!("status {}", prediction.status)),
        }),
    }
}

#[async_trait]
impl GenerationProvider for ReplicateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let url = format!(
            "{}/models/{}/predictions",
            REPLICATE_API_BASE,
            self.model_path()
        );
        let body = json!({ "input": self.build_input(request) });

        debug!(model = self.model_path(), "Submitting prediction");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), message));
        }

        let prediction: PredictionResponse = response.json().await?;
        info!(
            model = self.model_path(),
            prediction_id = %prediction.id,
            "Prediction submitted"
        );
        Ok(prediction.id)
    }

    async fn poll(&self, prediction_id: &str) -> ProviderResult<PollOutcome> {
        let url = format!("{}/predictions/{}", REPLICATE_API_BASE, prediction_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), message));
        }

        let prediction: PredictionResponse = response.json().await?;
        prediction_outcome(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_media_url_string() {
        let v = json!("https://cdn.example.com/out.mp4");
        assert_eq!(
            extract_media_url(&v).as_deref(),
            Some("https://cdn.example.com/out.mp4")
        );
    }

    #[test]
    fn test_extract_media_url_array() {
        let v = json!(["https://cdn.example.com/a.mp4", "https://cdn.example.com/b.mp4"]);
        assert_eq!(
            extract_media_url(&v).as_deref(),
            Some("https://cdn.example.com/a.mp4")
        );
    }

    #[test]
    fn test_extract_media_url_object_is_none() {
        assert!(extract_media_url(&json!({"frames": 10})).is_none());
    }

    fn prediction(status: &str) -> PredictionResponse {
        PredictionResponse {
            id: "pred-1".to_string(),
            status: status.to_string(),
            output: None,
            error: None,
        }
    }

    #[test]
    fn test_outcome_processing_states() {
        for status in ["starting", "processing"] {
            let outcome = prediction_outcome(prediction(status)).unwrap();
            assert!(matches!(outcome, PollOutcome::Processing));
        }
    }

    #[test]
    fn test_outcome_succeeded_carries_url() {
        let outcome = prediction_outcome(PredictionResponse {
            output: Some(json!("https://cdn.example.com/out.mp4")),
            ..prediction("succeeded")
        })
        .unwrap();
        assert!(matches!(
            outcome,
            PollOutcome::Completed { media_url } if media_url == "https://cdn.example.com/out.mp4"
        ));
    }

    #[test]
    fn test_outcome_canceled_is_distinct_error() {
        let err = prediction_outcome(prediction("canceled")).unwrap_err();
        assert!(matches!(err, ProviderError::CanceledByProvider(id) if id == "pred-1"));
    }

    #[test]
    fn test_outcome_failed_keeps_provider_message() {
        let outcome = prediction_outcome(PredictionResponse {
            error: Some("NSFW content detected".to_string()),
            ..prediction("failed")
        })
        .unwrap();
        assert!(matches!(
            outcome,
            PollOutcome::Failed { message } if message == "NSFW content detected"
        ));
    }
}
