//! The stage state machine.
//!
//! Drives one job through script, narration, scenes, music, and
//! composition. Each transition is persisted atomically with its
//! stage metadata before the next stage starts, so the persisted
//! stage always names what the pipeline is doing right now; a failure
//! freezes the job at the stage that broke.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::Instrument;

use spotgen_jobstore::{JobStore, StageUpdate};
use spotgen_models::{JobId, Stage};
use spotgen_providers::{GenerationProvider, PollConfig, ScriptGenerator, ScriptRequest, TtsProvider};
use spotgen_storage::AssetStore;

use crate::composer::{ComposeInputs, Composer};
use crate::config::PipelineConfig;
use crate::engine::MediaEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::music::MusicGenerator;
use crate::narration::NarrationGenerator;
use crate::scene_renderer::SceneRenderer;

pub struct Orchestrator {
    config: PipelineConfig,
    job_store: Arc<dyn JobStore>,
    script_generator: Arc<dyn ScriptGenerator>,
    renderer: SceneRenderer,
    narration: NarrationGenerator,
    music: MusicGenerator,
    composer: Composer,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        job_store: Arc<dyn JobStore>,
        asset_store: Arc<dyn AssetStore>,
        script_generator: Arc<dyn ScriptGenerator>,
        video_provider: Arc<dyn GenerationProvider>,
        music_provider: Arc<dyn GenerationProvider>,
        tts: Arc<dyn TtsProvider>,
        engine: Arc<dyn MediaEngine>,
    ) -> Self {
        let poll_config = PollConfig {
            interval: config.poll_interval,
            max_attempts: config.max_poll_attempts,
        };
        Self {
            renderer: SceneRenderer::new(
                video_provider,
                asset_store.clone(),
                engine.clone(),
                poll_config.clone(),
            ),
            narration: NarrationGenerator::new(
                tts,
                asset_store.clone(),
                engine.clone(),
                config.disclosure_speed,
            ),
            music: MusicGenerator::new(
                music_provider,
                asset_store.clone(),
                engine.clone(),
                poll_config,
            ),
            composer: Composer::new(
                asset_store,
                engine,
                config.audio_mode,
                config.thumbnail_width,
            ),
            config,
            job_store,
            script_generator,
        }
    }

    /// Run the full pipeline for a job.
    ///
    /// Bounded by the configured wall-clock deadline; on any failure
    /// the job is frozen at its current stage with the error recorded.
    pub async fn run(
        &self,
        job_id: &JobId,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> PipelineResult<()> {
        let logger = JobLogger::new(job_id);
        let span = logger.span();

        let deadline = self.config.job_timeout;
        let result = async {
            match tokio::time::timeout(deadline, self.run_stages(job_id, &mut cancel_rx)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::DeadlineExceeded(deadline.as_secs())),
            }
        }
        .instrument(span)
        .await;

        if let Err(e) = &result {
            if let Ok(job) = self.job_store.get(job_id).await {
                logger.failure(job.stage, &e.to_string());
            }
            if let Err(store_err) = self.job_store.mark_failed(job_id, &e.to_string()).await {
                tracing::error!(job_id = %job_id, "Could not record job failure: {}", store_err);
            }
        }
        result
    }

    /// Freeze a job that never got to run (e.g. cancelled while
    /// queued for admission).
    pub async fn mark_failed(&self, job_id: &JobId, message: &str) -> PipelineResult<()> {
        self.job_store.mark_failed(job_id, message).await?;
        Ok(())
    }

    async fn run_stages(
        &self,
        job_id: &JobId,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> PipelineResult<()> {
        let logger = JobLogger::new(job_id);
        let job = self.job_store.get(job_id).await?;

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id))
            .tempdir_in(&self.config.work_dir)?;
        let work = work_dir.path();

        // Script
        self.transition(job_id, cancel_rx, Stage::ScriptGenerating, StageUpdate::none())
            .await?;
        logger.stage_start(Stage::ScriptGenerating);
        let script = self
            .script_generator
            .generate(&ScriptRequest {
                prompt: job.request.prompt.clone(),
                duration_secs: job.request.duration_secs,
            })
            .await?;
        self.transition(
            job_id,
            cancel_rx,
            Stage::ScriptComplete,
            StageUpdate::with_script(script.id.clone(), script.scenes.clone()),
        )
        .await?;
        logger.stage_complete(Stage::ScriptComplete);

        let job = self.job_store.get(job_id).await?;

        // Narration
        let narration_track = if job.request.wants_narration() {
            self.transition(job_id, cancel_rx, Stage::NarratorGenerating, StageUpdate::none())
                .await?;
            logger.stage_start(Stage::NarratorGenerating);
            let track = self.narration.generate(&job, work).await?;
            self.transition(
                job_id,
                cancel_rx,
                Stage::NarratorComplete,
                StageUpdate::with_narration(track.url.clone()),
            )
            .await?;
            logger.stage_complete(Stage::NarratorComplete);
            Some(track)
        } else {
            None
        };

        // Scenes, chained through continuity frames
        let mut continuity_seed: Option<String> = None;
        let mut clips: Vec<PathBuf> = Vec::with_capacity(script.scenes.len());
        for scene in &script.scenes {
            let n = scene.number;
            self.transition(job_id, cancel_rx, Stage::SceneGenerating(n), StageUpdate::none())
                .await?;
            logger.stage_start(Stage::SceneGenerating(n));

            let rendered = self
                .renderer
                .render(&job, scene, 1, continuity_seed.as_deref(), work, cancel_rx)
                .await
                .map_err(|e| e.with_scene(n))?;

            let mut update = StageUpdate::with_scene_clip(n, rendered.clip_url.clone(), 1);
            if let Some(used) = &rendered.start_image_used {
                update = update.scene_start_image(n, used.clone());
            }
            self.transition(job_id, cancel_rx, Stage::SceneComplete(n), update)
                .await?;
            logger.stage_complete(Stage::SceneComplete(n));

            continuity_seed = rendered.continuity_frame_url;
            clips.push(rendered.local_clip);
        }

        // Music
        self.transition(job_id, cancel_rx, Stage::AudioGenerating, StageUpdate::none())
            .await?;
        logger.stage_start(Stage::AudioGenerating);
        let music_track = self.music.generate(&job, &script, work, cancel_rx).await?;
        self.transition(
            job_id,
            cancel_rx,
            Stage::AudioComplete,
            StageUpdate::with_music(music_track.url.clone()),
        )
        .await?;
        logger.stage_complete(Stage::AudioComplete);

        // Composition
        self.transition(job_id, cancel_rx, Stage::Composing, StageUpdate::none())
            .await?;
        logger.stage_start(Stage::Composing);
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
                    narration: narration_track.as_ref().map(|t| t.local_path.as_path()),
                    music: Some(music_track.local_path.as_path()),
                    disclosure,
                },
                work,
            )
            .await?;

        if let Some(url) = &composed.thumbnail_url {
            self.job_store
                .update_stage(
                    job_id,
                    Stage::Composing,
                    StageUpdate::none().thumbnail(url.clone()),
                )
                .await?;
        }
        self.job_store
            .mark_complete(job_id, &composed.video_key)
            .await?;
        logger.completion(&composed.video_key);
        Ok(())
    }

    /// Persist a stage transition, observing cancellation first so a
    /// cancelled job never advances.
    async fn transition(
        &self,
        job_id: &JobId,
        cancel_rx: &mut watch::Receiver<bool>,
        stage: Stage,
        update: StageUpdate,
    ) -> PipelineResult<()> {
        if *cancel_rx.borrow() {
            return Err(PipelineError::Canceled);
        }
        self.job_store.update_stage(job_id, stage, update).await?;
        Ok(())
    }
}
