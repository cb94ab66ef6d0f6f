//! Scene script types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Target aspect ratio for generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 9:16 vertical (default for social ads)
    #[default]
    Portrait,
    /// 16:9 horizontal
    Landscape,
    /// 1:1 square
    Square,
}

impl AspectRatio {
    /// Ratio string understood by the generation providers.
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
        }
    }

    /// Nominal frame width in pixels, used to plan text overlays.
    pub fn frame_width(&self) -> u32 {
        match self {
            AspectRatio::Portrait => 1080,
            AspectRatio::Landscape => 1920,
            AspectRatio::Square => 1080,
        }
    }
}

/// Narrator voice selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
    Male,
    Female,
}

impl Voice {
    /// Parse a caller-supplied voice selector. Unknown selectors are a
    /// caller error and must be rejected before the pipeline starts.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "male" => Some(Voice::Male),
            "female" => Some(Voice::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Male => "male",
            Voice::Female => "female",
        }
    }
}

/// A single scene of the generated script.
///
/// The descriptive attributes (location, action, camera, lighting) are
/// opaque to the orchestrator; they are passed through to the
/// generation provider as part of the prompt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 1-based contiguous scene number
    pub number: u32,
    /// Start time within the final video (seconds)
    pub start_time: f64,
    /// Scene duration (seconds)
    pub duration: f64,
    /// Prompt sent to the generation provider
    pub generation_prompt: String,
    /// Continuity seed: previous scene's last frame, a caller-supplied
    /// image, or none (text-only generation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,
}

/// A generated ad script: ordered scenes plus music direction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Script {
    /// Script identifier assigned at generation time
    pub id: String,
    /// Scenes in playback order, numbered 1..=N
    pub scenes: Vec<Scene>,
    /// Music mood derived from the script (e.g. "uplifting")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_mood: Option<String>,
    /// Music style derived from the script (e.g. "acoustic pop")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_style: Option<String>,
}

impl Script {
    /// Validate scene numbering: 1-based and contiguous.
    pub fn validate_numbering(&self) -> Result<(), String> {
        for (i, scene) in self.scenes.iter().enumerate() {
            let expected = (i + 1) as u32;
            if scene.number != expected {
                return Err(format!(
                    "scene numbering broken at index {}: expected {}, got {}",
                    i, expected, scene.number
                ));
            }
        }
        Ok(())
    }
}
