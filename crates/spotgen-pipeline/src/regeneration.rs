//! Scene regeneration.
//!
//! Re-renders a single scene of an existing job at a bumped version,
//! reseeding continuity from the persisted frame of the preceding
//! scene. With cascade enabled every downstream scene is re-rendered
//! in turn so the continuity chain stays unbroken, and a completed
//! job's final video is recomposed from the refreshed clips.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use spotgen_jobstore::JobStore;
use spotgen_models::{
    clip_key, music_key, narration_key, thumbnail_key, versioned, Job, JobId, JobStatus, Scene,
};
use spotgen_storage::AssetStore;

use crate::composer::{ComposeInputs, Composer};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::scene_renderer::SceneRenderer;

/// What a regeneration call produced.
#[derive(Debug)]
pub struct RegenerationOutcome {
    /// The scene the caller asked to regenerate
    pub scene: u32,
    /// Its new version
    pub new_version: u32,
    /// Downstream scenes re-rendered by the cascade, in order
    pub cascaded: Vec<u32>,
    /// Whether the final video was recomposed
    pub recomposed: bool,
}

pub struct RegenerationController {
    config: PipelineConfig,
    job_store: Arc<dyn JobStore>,
    asset_store: Arc<dyn AssetStore>,
    renderer: SceneRenderer,
    composer: Composer,
}

impl RegenerationController {
    pub fn new(
        config: PipelineConfig,
        job_store: Arc<dyn JobStore>,
        asset_store: Arc<dyn AssetStore>,
        renderer: SceneRenderer,
        composer: Composer,
    ) -> Self {
        Self {
            config,
            job_store,
            asset_store,
            renderer,
            composer,
        }
    }

    /// Regenerate one scene, optionally cascading downstream.
    ///
    /// Rejected while the job is still being processed; permitted on
    /// completed and failed jobs (a failed job resumes nothing, the
    /// regenerated clip simply replaces its slot).
    pub async fn regenerate_scene(
        &self,
        job_id: &JobId,
        scene_number: u32,
        cascade: bool,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> PipelineResult<RegenerationOutcome> {
        let job = self.job_store.get(job_id).await?;

        if matches!(job.status, JobStatus::Pending | JobStatus::Processing) {
            return Err(PipelineError::JobActive(job_id.clone()));
        }
        let scene = job
            .scenes
            .iter()
            .find(|s| s.number == scene_number)
            .cloned()
            .ok_or_else(|| {
                PipelineError::validation(format!("job has no scene {}", scene_number))
            })?;

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("regen-{}-", job_id))
            .tempdir_in(&self.config.work_dir)?;
        let work = work_dir.path();

        let seed = self.continuity_seed_for(&job, scene_number).await;
        let new_version = job.scene_version(scene_number) + 1;

        let rendered = self
            .renderer
            .render(&job, &scene, new_version, seed.as_deref(), work, cancel_rx)
            .await
            .map_err(|e| e.with_scene(scene_number))?;
        self.job_store
            .record_regeneration(
                job_id,
                scene_number,
                new_version,
                &rendered.clip_url,
                rendered.start_image_used.as_deref(),
            )
            .await?;
        info!(
            job_id = %job_id,
            scene = scene_number,
            version = new_version,
            "Scene regenerated"
        );

        let mut cascaded = Vec::new();
        let mut seed = rendered.continuity_frame_url;
        if cascade {
            let downstream: Vec<Scene> = job
                .scenes
                .iter()
                .filter(|s| s.number > scene_number)
                .cloned()
                .collect();
            for scene in downstream {
                let n = scene.number;
                let version = self.job_store.get(job_id).await?.scene_version(n) + 1;
                let rendered = self
                    .renderer
                    .render(&job, &scene, version, seed.as_deref(), work, cancel_rx)
                    .await
                    .map_err(|e| e.with_scene(n))?;
                self.job_store
                    .record_regeneration(
                        job_id,
                        n,
                        version,
                        &rendered.clip_url,
                        rendered.start_image_used.as_deref(),
                    )
                    .await?;
                info!(job_id = %job_id, scene = n, version, "Scene regenerated (cascade)");
                seed = rendered.continuity_frame_url;
                cascaded.push(n);
            }
        }

        let recomposed = if job.status == JobStatus::Completed {
            self.recompose(job_id, work).await?;
            true
        } else {
            false
        };

        Ok(RegenerationOutcome {
            scene: scene_number,
            new_version,
            cascaded,
            recomposed,
        })
    }

    /// Continuity seed for a scene: caller override wins inside the
    /// renderer, so this only resolves the persisted frame of the
    /// preceding scene at its current version.
    async fn continuity_seed_for(&self, job: &Job, scene_number: u32) -> Option<String> {
        if scene_number <= 1 {
            return None;
        }
        let prev = scene_number - 1;
        let key = versioned(
            &thumbnail_key(&job.user_id, job.id.as_str(), prev),
            job.scene_version(prev),
        );
        match self.asset_store.exists(&key).await {
            Ok(true) => match self
                .asset_store
                .presigned_get(&key, self.config.presign_ttl)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(job_id = %job.id, scene = scene_number, "Seed presign failed: {}", e);
                    None
                }
            },
            _ => {
                warn!(
                    job_id = %job.id,
                    scene = scene_number,
                    "No persisted continuity frame for scene {}, rendering unseeded", prev
                );
                None
            }
        }
    }

    /// Rebuild the final video from the current clip versions plus the
    /// existing narration and music tracks.
    async fn recompose(&self, job_id: &JobId, work: &std::path::Path) -> PipelineResult<()> {
        let job = self.job_store.get(job_id).await?;

        let mut clips: Vec<PathBuf> = Vec::with_capacity(job.scenes.len());
        for scene in &job.scenes {
            let key = versioned(
                &clip_key(&job.user_id, job.id.as_str(), scene.number),
                job.scene_version(scene.number),
            );
            let path = work.join(format!("recompose-scene-{}.mp4", scene.number));
            self.asset_store.download(&key, &path).await?;
            clips.push(path);
        }

        let narration = match &job.narrator_audio_url {
            Some(_) => {
                let key = narration_key(&job.user_id, job.id.as_str());
                let path = work.join("recompose-narration.mp3");
                self.asset_store.download(&key, &path).await?;
                Some(path)
            }
            None => None,
        };
        let music = match &job.audio_url {
            Some(_) => {
                let key = music_key(&job.user_id, job.id.as_str());
                let path = work.join("recompose-music.mp3");
                self.asset_store.download(&key, &path).await?;
                Some(path)
            }
            None => None,
        };

        let disclosure = match (&job.request.disclosure_text, job.request.disclosure_start_secs) {
            (Some(text), Some(start)) => Some((text.as_str(), start)),
            _ => None,
        };
        let composed = self
            .composer
            .compose(
                &job,
                ComposeInputs {
                    clips: &clips,
                    narration: narration.as_deref(),
                    music: music.as_deref(),
                    disclosure,
                },
                work,
            )
            .await?;
        self.job_store
            .mark_complete(job_id, &composed.video_key)
            .await?;

        info!(job_id = %job_id, "Final video recomposed after regeneration");
        Ok(())
    }
}
