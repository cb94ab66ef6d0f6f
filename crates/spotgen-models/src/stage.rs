//! Pipeline stage state machine.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named point in the job's progress, persisted to the job store and
/// exposed to status queries.
///
/// Stages advance in a fixed order:
/// `ScriptGenerating → ScriptComplete → [NarratorGenerating →
/// NarratorComplete] → SceneGenerating(1) → SceneComplete(1) → … →
/// AudioGenerating → AudioComplete → Composing → Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "stage", content = "scene")]
pub enum Stage {
    Pending,
    ScriptGenerating,
    ScriptComplete,
    NarratorGenerating,
    NarratorComplete,
    SceneGenerating(u32),
    SceneComplete(u32),
    AudioGenerating,
    AudioComplete,
    Composing,
    Complete,
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Pending
    }
}

impl Stage {
    /// Stage tag as persisted and exposed to callers, e.g. `scene_2_generating`.
    pub fn as_tag(&self) -> String {
        match self {
            Stage::Pending => "pending".to_string(),
            Stage::ScriptGenerating => "script_generating".to_string(),
            Stage::ScriptComplete => "script_complete".to_string(),
            Stage::NarratorGenerating => "narrator_generating".to_string(),
            Stage::NarratorComplete => "narrator_complete".to_string(),
            Stage::SceneGenerating(n) => format!("scene_{}_generating", n),
            Stage::SceneComplete(n) => format!("scene_{}_complete", n),
            Stage::AudioGenerating => "audio_generating".to_string(),
            Stage::AudioComplete => "audio_complete".to_string(),
            Stage::Composing => "composing".to_string(),
            Stage::Complete => "complete".to_string(),
        }
    }

    /// Derive a progress percentage from the stage.
    ///
    /// Scene stages interpolate across the 15..=70 band based on the
    /// total scene count; `scene_count` of zero is treated as one to
    /// keep the math defined for malformed jobs.
    pub fn progress_percent(&self, scene_count: u32) -> u8 {
        let scenes = scene_count.max(1);
        match self {
            Stage::Pending => 0,
            Stage::ScriptGenerating => 5,
            Stage::ScriptComplete => 10,
            Stage::NarratorGenerating => 12,
            Stage::NarratorComplete => 15,
            Stage::SceneGenerating(n) => {
                let done = n.saturating_sub(1).min(scenes);
                15 + (done * 55 / scenes) as u8
            }
            Stage::SceneComplete(n) => {
                let done = (*n).min(scenes);
                15 + (done * 55 / scenes) as u8
            }
            Stage::AudioGenerating => 75,
            Stage::AudioComplete => 80,
            Stage::Composing => 90,
            Stage::Complete => 100,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}
