//! Scene rendering with continuity chaining.
//!
//! Each scene is rendered by a submit/poll video model, downloaded,
//! uploaded under its deterministic versioned key, and mined for a
//! continuity frame that seeds the next scene. Frame extraction is
//! best-effort: a degraded extraction costs the next scene its seed,
//! never the scene itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use spotgen_models::{clip_key, thumbnail_key, versioned, Job, Scene};
use spotgen_providers::{poll_until_complete, GenerationProvider, GenerationRequest, PollConfig};
use spotgen_storage::AssetStore;

use crate::engine::MediaEngine;
use crate::error::PipelineResult;

/// Everything a successful scene render produced.
#[derive(Debug)]
pub struct RenderedScene {
    /// Retrievable URL of the uploaded clip
    pub clip_url: String,
    /// Key the clip landed under
    pub clip_key: String,
    /// Local path of the downloaded clip, reused by composition
    pub local_clip: PathBuf,
    /// Uploaded continuity frame URL, absent when extraction degraded
    pub continuity_frame_url: Option<String>,
    /// The start image this render was actually seeded with
    pub start_image_used: Option<String>,
}

/// Renders one scene at a time against the video provider.
pub struct SceneRenderer {
    provider: Arc<dyn GenerationProvider>,
    store: Arc<dyn AssetStore>,
    engine: Arc<dyn MediaEngine>,
    poll_config: PollConfig,
}

impl SceneRenderer {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        store: Arc<dyn AssetStore>,
        engine: Arc<dyn MediaEngine>,
        poll_config: PollConfig,
    ) -> Self {
        Self {
            provider,
            store,
            engine,
            poll_config,
        }
    }

    /// Start image for a scene: a caller-supplied override wins, then
    /// the previous scene's continuity frame, then nothing.
    fn resolve_start_image(
        job: &Job,
        scene: &Scene,
        continuity_seed: Option<&str>,
    ) -> Option<String> {
        if let Some(url) = job.request.scene_image_overrides.get(&scene.number) {
            return Some(url.clone());
        }
        continuity_seed.map(str::to_string)
    }

    /// Fold the scene's direction notes into one generation prompt.
    fn build_prompt(scene: &Scene) -> String {
        let mut prompt = scene.generation_prompt.clone();
        if let Some(location) = &scene.location {
            prompt.push_str(&format!(" Location: {}.", location));
        }
        if let Some(action) = &scene.action {
            prompt.push_str(&format!(" Action: {}.", action));
        }
        if let Some(camera) = &scene.camera {
            prompt.push_str(&format!(" Camera: {}.", camera));
        }
        if let Some(lighting) = &scene.lighting {
            prompt.push_str(&format!(" Lighting: {}.", lighting));
        }
        prompt
    }

    /// Render one scene end to end.
    ///
    /// The clip lands at the versioned clip key; version 1 writes the
    /// base key. Duration is rounded up so the provider never renders
    /// short.
    pub async fn render(
        &self,
        job: &Job,
        scene: &Scene,
        version: u32,
        continuity_seed: Option<&str>,
        work_dir: &Path,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> PipelineResult<RenderedScene> {
        let start_image = Self::resolve_start_image(job, scene, continuity_seed);

        let mut request = GenerationRequest::new(
            Self::build_prompt(scene),
            scene.duration.ceil() as u32,
            job.request.aspect_ratio,
        );
        if let Some(url) = &start_image {
            request = request.with_start_image(url.clone());
        }

        debug!(
            job_id = %job.id,
            scene = scene.number,
            version,
            seeded = start_image.is_some(),
            "Submitting scene render"
        );
        let prediction_id = self.provider.submit(&request).await?;
        let media_url =
            poll_until_complete(&*self.provider, &prediction_id, &self.poll_config, cancel_rx)
                .await?;

        let local_clip = work_dir.join(format!("scene-{}.mp4", scene.number));
        self.engine.download(&media_url, &local_clip).await?;

        let key = versioned(
            &clip_key(&job.user_id, job.id.as_str(), scene.number),
            version,
        );
        let clip_url = self.store.put(&key, &local_clip, "video/mp4").await?;

        let continuity_frame_url = self
            .upload_continuity_frame(job, scene, version, &local_clip, work_dir)
            .await;

        info!(
            job_id = %job.id,
            scene = scene.number,
            version,
            key,
            "Scene rendered"
        );
        Ok(RenderedScene {
            clip_url,
            clip_key: key,
            local_clip,
            continuity_frame_url,
            start_image_used: start_image,
        })
    }

    /// Extract and persist the scene's last frame. Failures degrade to
    /// `None`; the frame is persisted so regeneration can reseed from
    /// storage later.
    async fn upload_continuity_frame(
        &self,
        job: &Job,
        scene: &Scene,
        version: u32,
        local_clip: &Path,
        work_dir: &Path,
    ) -> Option<String> {
        let frame_path = work_dir.join(format!("scene-{}-frame.jpg", scene.number));
        let result = self
            .engine
            .extract_continuity_frame(local_clip, &frame_path)
            .await;

        let Some(path) = result.path() else {
            warn!(
                job_id = %job.id,
                scene = scene.number,
                "Continuity frame unavailable, next scene renders unseeded"
            );
            return None;
        };

        let key = versioned(
            &thumbnail_key(&job.user_id, job.id.as_str(), scene.number),
            version,
        );
        match self.store.put(&key, path, "image/jpeg").await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    scene = scene.number,
                    "Continuity frame upload failed: {}", e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotgen_models::JobRequest;

    fn scene(n: u32) -> Scene {
        Scene {
            number: n,
            start_time: 0.0,
            duration: 5.0,
            generation_prompt: "a can of soda on ice".to_string(),
            start_image_url: None,
            location: Some("beach".to_string()),
            action: None,
            camera: Some("close-up".to_string()),
            lighting: None,
        }
    }

    #[test]
    fn test_prompt_folds_direction_notes() {
        let prompt = SceneRenderer::build_prompt(&scene(1));
        assert!(prompt.starts_with("a can of soda on ice"));
        assert!(prompt.contains("Location: beach."));
        assert!(prompt.contains("Camera: close-up."));
        assert!(!prompt.contains("Action:"));
    }

    #[test]
    fn test_start_image_override_beats_continuity() {
        let request = JobRequest::new("ad", 30).with_scene_image(2, "https://example.com/shot.jpg");
        let job = Job::new("u", request);

        let resolved =
            SceneRenderer::resolve_start_image(&job, &scene(2), Some("memory://frame-1"));
        assert_eq!(resolved.as_deref(), Some("https://example.com/shot.jpg"));

        let resolved =
            SceneRenderer::resolve_start_image(&job, &scene(3), Some("memory://frame-2"));
        assert_eq!(resolved.as_deref(), Some("memory://frame-2"));

        let resolved = SceneRenderer::resolve_start_image(&job, &scene(1), None);
        assert!(resolved.is_none());
    }
}
