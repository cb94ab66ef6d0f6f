//! The persisted job record.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scene::{AspectRatio, Scene, Voice};
use crate::stage::Stage;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Caller-supplied request parameters, immutable for the lifetime of
/// the job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRequest {
    /// Product / campaign prompt driving script generation
    pub prompt: String,
    /// Target ad duration in seconds
    pub duration_secs: u32,
    /// Target aspect ratio
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Full narration script (absent = no narration stage)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_text: Option<String>,
    /// Narrator voice selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    /// Disclosure text burned in near the end of the video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosure_text: Option<String>,
    /// When the disclosure begins (seconds); narration after this point
    /// plays at the accelerated disclosure rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosure_start_secs: Option<f64>,
    /// Caller-supplied start images keyed by scene number (e.g. a
    /// product shot for scene 1 or the closing scene)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scene_image_overrides: HashMap<u32, String>,
}

impl JobRequest {
    pub fn new(prompt: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            prompt: prompt.into(),
            duration_secs,
            aspect_ratio: AspectRatio::default(),
            narration_text: None,
            voice: None,
            disclosure_text: None,
            disclosure_start_secs: None,
            scene_image_overrides: HashMap::new(),
        }
    }

    pub fn with_narration(mut self, text: impl Into<String>, voice: Voice) -> Self {
        self.narration_text = Some(text.into());
        self.voice = Some(voice);
        self
    }

    pub fn with_disclosure(mut self, text: impl Into<String>, start_secs: f64) -> Self {
        self.disclosure_text = Some(text.into());
        self.disclosure_start_secs = Some(start_secs);
        self
    }

    pub fn with_scene_image(mut self, scene: u32, url: impl Into<String>) -> Self {
        self.scene_image_overrides.insert(scene, url.into());
        self
    }

    /// Whether the narration stage runs for this job.
    pub fn wants_narration(&self) -> bool {
        self.narration_text.is_some()
    }
}

/// A video generation job.
///
/// The active orchestrator run exclusively owns mutation of stage,
/// status, and outputs; the regeneration controller is the only other
/// writer and only while no run is active.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Owning user
    pub user_id: String,
    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,
    /// Current pipeline stage
    #[serde(default)]
    pub stage: Stage,
    /// Caller request parameters
    pub request: JobRequest,

    /// Script identifier once generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    /// Generated scenes in order
    #[serde(default)]
    pub scenes: Vec<Scene>,
    /// Clip URLs ordered by scene number; length never exceeds the
    /// number of scenes attempted so far
    #[serde(default)]
    pub scene_video_urls: Vec<String>,
    /// Job thumbnail (first scene frame)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Background music URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Narrator voiceover URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrator_audio_url: Option<String>,
    /// Asset key of the composed final video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_key: Option<String>,
    /// Per-scene regeneration versions (scene number → version)
    #[serde(default)]
    pub scene_versions: HashMap<u32, u32>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Job {
    /// Create a new pending job for a user.
    pub fn new(user_id: impl Into<String>, request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            status: JobStatus::Pending,
            stage: Stage::Pending,
            request,
            script_id: None,
            scenes: Vec::new(),
            scene_video_urls: Vec::new(),
            thumbnail_url: None,
            audio_url: None,
            narrator_audio_url: None,
            video_key: None,
            scene_versions: HashMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    /// Number of scenes in the generated script.
    pub fn scene_count(&self) -> u32 {
        self.scenes.len() as u32
    }

    /// Current version of a scene's artifacts (1 = original render).
    pub fn scene_version(&self, scene: u32) -> u32 {
        self.scene_versions.get(&scene).copied().unwrap_or(1)
    }

    /// Progress percent derived from the current stage.
    pub fn progress_percent(&self) -> u8 {
        self.stage.progress_percent(self.scene_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new("user-1", JobRequest::new("a fizzy drink ad", 30));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.stage, Stage::Pending);
        assert_eq!(job.progress_percent(), 0);
        assert!(job.scene_video_urls.is_empty());
    }

    #[test]
    fn test_request_builders() {
        let req = JobRequest::new("ad", 30)
            .with_narration("Buy now", Voice::Female)
            .with_disclosure("Side effects may include...", 24.0)
            .with_scene_image(1, "https://example.com/product.jpg");

        assert!(req.wants_narration());
        assert_eq!(req.disclosure_start_secs, Some(24.0));
        assert_eq!(
            req.scene_image_overrides.get(&1).map(String::as_str),
            Some("https://example.com/product.jpg")
        );
    }

    #[test]
    fn test_scene_version_defaults_to_one() {
        let mut job = Job::new("u", JobRequest::new("ad", 15));
        assert_eq!(job.scene_version(2), 1);
        job.scene_versions.insert(2, 3);
        assert_eq!(job.scene_version(2), 3);
    }
}
