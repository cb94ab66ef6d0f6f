//! Pipeline service.
//!
//! The entry point callers talk to: validates requests, admits jobs
//! through the concurrency gate, runs the orchestrator on a background
//! task, and exposes cancellation, status, and scene regeneration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::info;

use spotgen_jobstore::JobStore;
use spotgen_models::{Job, JobId, JobRequest};
use spotgen_providers::{GenerationProvider, PollConfig, ScriptGenerator, TtsProvider};
use spotgen_storage::AssetStore;

use crate::composer::Composer;
use crate::config::PipelineConfig;
use crate::engine::MediaEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::gate::ConcurrencyGate;
use crate::orchestrator::Orchestrator;
use crate::regeneration::{RegenerationController, RegenerationOutcome};
use crate::scene_renderer::SceneRenderer;

const MIN_DURATION_SECS: u32 = 5;
const MAX_DURATION_SECS: u32 = 120;

pub struct PipelineService {
    orchestrator: Arc<Orchestrator>,
    regeneration: RegenerationController,
    job_store: Arc<dyn JobStore>,
    gate: ConcurrencyGate,
    cancels: Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
}

impl PipelineService {
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
        let regeneration = RegenerationController::new(
            config.clone(),
            job_store.clone(),
            asset_store.clone(),
            SceneRenderer::new(
                video_provider.clone(),
                asset_store.clone(),
                engine.clone(),
                poll_config,
            ),
            Composer::new(
                asset_store.clone(),
                engine.clone(),
                config.audio_mode,
                config.thumbnail_width,
            ),
        );
        let gate = ConcurrencyGate::new(config.max_concurrent_jobs);
        let orchestrator = Arc::new(Orchestrator::new(
            config,
            job_store.clone(),
            asset_store,
            script_generator,
            video_provider,
            music_provider,
            tts,
            engine,
        ));

        Self {
            orchestrator,
            regeneration,
            job_store,
            gate,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn validate_request(request: &JobRequest) -> PipelineResult<()> {
        if request.prompt.trim().is_empty() {
            return Err(PipelineError::validation("prompt must not be empty"));
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&request.duration_secs) {
            return Err(PipelineError::validation(format!(
                "duration must be between {} and {} seconds",
                MIN_DURATION_SECS, MAX_DURATION_SECS
            )));
        }
        if request.narration_text.is_some() && request.voice.is_none() {
            return Err(PipelineError::validation(
                "narration requested without a voice",
            ));
        }
        if let Some(start) = request.disclosure_start_secs {
            if start < 0.0 || start >= request.duration_secs as f64 {
                return Err(PipelineError::validation(
                    "disclosure start must fall within the ad duration",
                ));
            }
        }
        Ok(())
    }

    /// Create a job and start processing it in the background.
    ///
    /// Returns as soon as the record is persisted; the run waits for
    /// an admission slot if the gate is full.
    pub async fn start_job(
        &self,
        user_id: impl Into<String>,
        request: JobRequest,
    ) -> PipelineResult<JobId> {
        Self::validate_request(&request)?;

        let job = Job::new(user_id, request);
        let job_id = job.id.clone();
        self.job_store.create(&job).await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancels.lock().await.insert(job_id.clone(), cancel_tx);

        let orchestrator = self.orchestrator.clone();
        let gate = self.gate.clone();
        let cancels = self.cancels.clone();
        let spawned_id = job_id.clone();
        tokio::spawn(async move {
            let mut cancel_rx = cancel_rx;
            let result = match gate.acquire(&mut cancel_rx).await {
                Ok(_permit) => orchestrator.run(&spawned_id, cancel_rx).await,
                Err(e) => {
                    // cancelled while queued; record it so the job
                    // does not stay pending forever
                    let _ = orchestrator.mark_failed(&spawned_id, &e.to_string()).await;
                    Err(e)
                }
            };
            if let Err(e) = &result {
                info!(job_id = %spawned_id, "Pipeline run ended with error: {}", e);
            }
            cancels.lock().await.remove(&spawned_id);
        });

        info!(job_id = %job_id, "Job accepted");
        Ok(job_id)
    }

    /// Signal cancellation to a running (or queued) job. Returns
    /// whether a live run was there to observe it.
    pub async fn cancel_job(&self, job_id: &JobId) -> bool {
        match self.cancels.lock().await.get(job_id) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Current job record.
    pub async fn get_job(&self, job_id: &JobId) -> PipelineResult<Job> {
        Ok(self.job_store.get(job_id).await?)
    }

    /// A user's jobs, newest first.
    pub async fn list_jobs(&self, user_id: &str) -> PipelineResult<Vec<Job>> {
        Ok(self.job_store.list_by_user(user_id).await?)
    }

    /// Regenerate a scene of a finished job.
    pub async fn regenerate_scene(
        &self,
        job_id: &JobId,
        scene: u32,
        cascade: bool,
    ) -> PipelineResult<RegenerationOutcome> {
        if self.cancels.lock().await.contains_key(job_id) {
            return Err(PipelineError::JobActive(job_id.clone()));
        }
        let (_tx, mut cancel_rx) = watch::channel(false);
        self.regeneration
            .regenerate_scene(job_id, scene, cascade, &mut cancel_rx)
            .await
    }

    /// Jobs currently queued or running.
    pub async fn active_jobs(&self) -> usize {
        self.cancels.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotgen_models::Voice;

    #[test]
    fn test_validate_rejects_empty_prompt() {
        let request = JobRequest::new("  ", 30);
        assert!(PipelineService::validate_request(&request).is_err());
    }

    #[test]
    fn test_validate_duration_bounds() {
        assert!(PipelineService::validate_request(&JobRequest::new("ad", 3)).is_err());
        assert!(PipelineService::validate_request(&JobRequest::new("ad", 600)).is_err());
        assert!(PipelineService::validate_request(&JobRequest::new("ad", 30)).is_ok());
    }

    #[test]
    fn test_validate_narration_needs_voice() {
        let mut request = JobRequest::new("ad", 30);
        request.narration_text = Some("Buy now".to_string());
        assert!(PipelineService::validate_request(&request).is_err());

        request.voice = Some(Voice::Male);
        assert!(PipelineService::validate_request(&request).is_ok());
    }

    #[test]
    fn test_validate_disclosure_within_duration() {
        let request = JobRequest::new("ad", 30)
            .with_narration("Buy now", Voice::Female)
            .with_disclosure("terms apply", 35.0);
        assert!(PipelineService::validate_request(&request).is_err());

        let request = JobRequest::new("ad", 30)
            .with_narration("Buy now", Voice::Female)
            .with_disclosure("terms apply", 24.0);
        assert!(PipelineService::validate_request(&request).is_ok());
    }
}
