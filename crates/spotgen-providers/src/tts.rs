//! Text-to-speech provider.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use spotgen_models::Voice;

use crate::error::{ProviderError, ProviderResult};

/// Synthesizes narration audio from text.
///
/// `speed` is the baseline synthesis rate; the disclosure speed-up is
/// applied afterwards as a local time-domain transform, not here.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice, speed: f64) -> ProviderResult<Vec<u8>>;
}

/// ElevenLabs text-to-speech client.
pub struct ElevenLabsTts {
    client: Client,
    api_key: String,
    male_voice_id: String,
    female_voice_id: String,
}

impl ElevenLabsTts {
    /// Create a client from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| ProviderError::config("ELEVENLABS_API_KEY not set"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            male_voice_id: std::env::var("ELEVENLABS_MALE_VOICE_ID")
                .unwrap_or_else(|_| "onwK4e9ZLuTAKqWW03F9".to_string()),
            female_voice_id: std::env::var("ELEVENLABS_FEMALE_VOICE_ID")
                .unwrap_or_else(|_| "EXAVITQu4vr4xnSDxMaL".to_string()),
        })
    }

    fn voice_id(&self, voice: Voice) -> &str {
        match voice {
            Voice::Male => &self.male_voice_id,
            Voice::Female => &self.female_voice_id,
        }
    }
}

#[async_trait]
impl TtsProvider for ElevenLabsTts {
    async fn synthesize(&self, text: &str, voice: Voice, speed: f64) -> ProviderResult<Vec<u8>> {
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id(voice)
        );

        debug!(voice = voice.as_str(), chars = text.len(), "Synthesizing narration");

        let body = json!({
            "text": text,
            "model_id": "eleven_multilingual_v2",
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
                "speed": speed,
            },
            "output_format": "mp3_44100_128",
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), message));
        }

        let bytes = response.bytes().await?.to_vec();
        info!(
            voice = voice.as_str(),
            bytes = bytes.len(),
            "Narration synthesized"
        );
        Ok(bytes)
    }
}
