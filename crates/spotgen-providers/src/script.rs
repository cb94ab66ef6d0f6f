//! Script generation via a text model.
//!
//! Turns the campaign prompt into an ordered scene script plus music
//! direction, as strict JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use spotgen_models::{Scene, Script};

use crate::error::{ProviderError, ProviderResult};

/// Parameters for script generation.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    /// Campaign / product prompt
    pub prompt: String,
    /// Target ad duration in seconds
    pub duration_secs: u32,
}

/// Generates the ad script from a prompt.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, request: &ScriptRequest) -> ProviderResult<Script>;
}

const SCRIPT_PROMPT: &str = r#"You are an advertising creative director. Write a scene-by-scene
script for a short video advertisement based on the brief below.

Rules:
- Scenes are numbered from 1 and contiguous.
- Each scene has start_time and duration in seconds; durations sum to the target length.
- Each scene has a generation_prompt: one vivid sentence a video model can render,
  plus optional location, action, camera, and lighting notes.
- Also pick a music_mood and music_style fitting the ad.

Respond with JSON only:
{"scenes": [{"number": 1, "start_time": 0.0, "duration": 5.0,
"generation_prompt": "...", "location": "...", "action": "...",
"camera": "...", "lighting": "..."}], "music_mood": "...", "music_style": "..."}"#;

/// Gemini API client implementing `ScriptGenerator`.
pub struct GeminiScriptClient {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// The JSON shape the model is asked to produce.
#[derive(Debug, Deserialize)]
struct ScriptPayload {
    scenes: Vec<ScenePayload>,
    music_mood: Option<String>,
    music_style: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScenePayload {
    number: u32,
    start_time: f64,
    duration: f64,
    generation_prompt: String,
    location: Option<String>,
    action: Option<String>,
    camera: Option<String>,
    lighting: Option<String>,
}

impl GeminiScriptClient {
    /// Create a client from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ProviderError::config("GEMINI_API_KEY not set"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
        })
    }

    fn build_prompt(request: &ScriptRequest) -> String {
        format!(
            "{}\n\nTarget length: {} seconds.\n\nBrief:\n{}",
            SCRIPT_PROMPT, request.duration_secs, request.prompt
        )
    }
}

/// Convert the model payload into the domain `Script`, validating the
/// numbering invariant.
fn into_script(payload: ScriptPayload) -> ProviderResult<Script> {
    let scenes = payload
        .scenes
        .into_iter()
        .map(|s| Scene {
            number: s.number,
            start_time: s.start_time,
            duration: s.duration,
            generation_prompt: s.generation_prompt,
            start_image_url: None,
            location: s.location,
            action: s.action,
            camera: s.camera,
            lighting: s.lighting,
        })
        .collect();

    let script = Script {
        id: Uuid::new_v4().to_string(),
        scenes,
        music_mood: payload.music_mood,
        music_style: payload.music_style,
    };

    if script.scenes.is_empty() {
        return Err(ProviderError::GenerationFailed(
            "script has no scenes".to_string(),
        ));
    }
    script
        .validate_numbering()
        .map_err(ProviderError::GenerationFailed)?;

    Ok(script)
}

#[async_trait]
impl ScriptGenerator for GeminiScriptClient {
    async fn generate(&self, request: &ScriptRequest) -> ProviderResult<Script> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        debug!(duration = request.duration_secs, "Generating ad script");

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::build_prompt(request),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), message));
        }

        let gemini: GeminiResponse = response.json().await?;
        let text = gemini
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or(ProviderError::MissingOutput)?;

        let payload: ScriptPayload = serde_json::from_str(text)?;
        let script = into_script(payload)?;

        info!(
            script_id = %script.id,
            scenes = script.scenes.len(),
            "Ad script generated"
        );
        Ok(script)
    }
}
