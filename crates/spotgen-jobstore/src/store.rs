//! The job store abstraction.

use async_trait::async_trait;

use spotgen_models::{Job, JobId, Scene, Stage};

use crate::error::JobStoreResult;

/// Stage-specific metadata carried by a stage transition.
///
/// Replaces ad hoc progress callbacks: the orchestrator emits one
/// explicit event per transition and the store applies it atomically.
#[derive(Debug, Clone, Default)]
pub struct StageUpdate {
    /// Script identifier (script stage)
    pub script_id: Option<String>,
    /// Generated scenes (script stage)
    pub scenes: Option<Vec<Scene>>,
    /// Clip URL for a scene, recorded at its 1-based index
    pub scene_clip: Option<(u32, String)>,
    /// Version counter for a scene
    pub scene_version: Option<(u32, u32)>,
    /// Continuity seed actually used for a scene
    pub scene_start_image: Option<(u32, String)>,
    /// Job thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Background music URL (music stage)
    pub audio_url: Option<String>,
    /// Narrator voiceover URL (narration stage)
    pub narrator_audio_url: Option<String>,
}

impl StageUpdate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_script(script_id: impl Into<String>, scenes: Vec<Scene>) -> Self {
        Self {
            script_id: Some(script_id.into()),
            scenes: Some(scenes),
            ..Default::default()
        }
    }

    pub fn with_scene_clip(scene: u32, url: impl Into<String>, version: u32) -> Self {
        Self {
            scene_clip: Some((scene, url.into())),
            scene_version: Some((scene, version)),
            ..Default::default()
        }
    }

    pub fn with_narration(url: impl Into<String>) -> Self {
        Self {
            narrator_audio_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_music(url: impl Into<String>) -> Self {
        Self {
            audio_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn scene_start_image(mut self, scene: u32, url: impl Into<String>) -> Self {
        self.scene_start_image = Some((scene, url.into()));
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }
}

/// Persisted job records with atomic stage/metadata updates.
///
/// Updates are last-writer-wins; writer exclusivity (one active
/// orchestrator run, or the regeneration controller when no run is
/// active) is enforced by the caller, not by the store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job record.
    async fn create(&self, job: &Job) -> JobStoreResult<()>;

    /// Fetch a job by ID.
    async fn get(&self, id: &JobId) -> JobStoreResult<Job>;

    /// List a user's jobs, newest first.
    async fn list_by_user(&self, user_id: &str) -> JobStoreResult<Vec<Job>>;

    /// Atomically advance the stage and apply its metadata.
    ///
    /// Fails on a frozen (failed) job: after failure only the
    /// regeneration path may write.
    async fn update_stage(
        &self,
        id: &JobId,
        stage: Stage,
        update: StageUpdate,
    ) -> JobStoreResult<()>;

    /// Freeze the job as failed at its current stage.
    async fn mark_failed(&self, id: &JobId, message: &str) -> JobStoreResult<()>;

    /// Mark the job completed with its final video key.
    async fn mark_complete(&self, id: &JobId, video_key: &str) -> JobStoreResult<()>;

    /// Record a regenerated scene: new version, new clip URL, and the
    /// continuity seed used. Permitted on frozen jobs.
    async fn record_regeneration(
        &self,
        id: &JobId,
        scene: u32,
        version: u32,
        clip_url: &str,
        start_image_url: Option<&str>,
    ) -> JobStoreResult<()>;

    /// Delete a job record.
    async fn delete(&self, id: &JobId) -> JobStoreResult<()>;
}
