//! Background music stage.
//!
//! Drives the music model through the same submit/poll loop as scene
//! rendering, then uploads the track at the music key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use spotgen_models::{music_key, Job, Script};
use spotgen_providers::{poll_until_complete, GenerationProvider, GenerationRequest, PollConfig};
use spotgen_storage::AssetStore;

use crate::engine::MediaEngine;
use crate::error::PipelineResult;

/// Generated music: the uploaded URL plus the local file kept for
/// composition.
#[derive(Debug)]
pub struct MusicTrack {
    pub url: String,
    pub local_path: PathBuf,
}

pub struct MusicGenerator {
    provider: Arc<dyn GenerationProvider>,
    store: Arc<dyn AssetStore>,
    engine: Arc<dyn MediaEngine>,
    poll_config: PollConfig,
}

impl MusicGenerator {
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

    /// Music prompt from the script's mood and style direction.
    fn build_prompt(script: &Script, duration_secs: u32) -> String {
        let mood = script.music_mood.as_deref().unwrap_or("upbeat");
        let style = script.music_style.as_deref().unwrap_or("modern pop");
        format!(
            "{} {} instrumental background music for a {} second advertisement, \
             no vocals, consistent energy",
            mood, style, duration_secs
        )
    }

    pub async fn generate(
        &self,
        job: &Job,
        script: &Script,
        work_dir: &Path,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> PipelineResult<MusicTrack> {
        let request = GenerationRequest::new(
            Self::build_prompt(script, job.request.duration_secs),
            job.request.duration_secs,
            job.request.aspect_ratio,
        );

        let prediction_id = self.provider.submit(&request).await?;
        let media_url =
            poll_until_complete(&*self.provider, &prediction_id, &self.poll_config, cancel_rx)
                .await?;

        let local_path = work_dir.join("background-music.mp3");
        self.engine.download(&media_url, &local_path).await?;

        let key = music_key(&job.user_id, job.id.as_str());
        let url = self.store.put(&key, &local_path, "audio/mpeg").await?;

        info!(job_id = %job.id, key, "Music uploaded");
        Ok(MusicTrack { url, local_path })
    }
}
