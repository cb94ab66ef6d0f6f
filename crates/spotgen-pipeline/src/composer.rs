//! Final composition stage.
//!
//! Concatenates the scene clips losslessly, burns the disclosure
//! overlay when present, attaches audio per the configured mode, and
//! uploads the deliverables. Nothing is uploaded until every local
//! assembly step has succeeded, so a composition failure never leaves
//! a partial final video behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use spotgen_models::{final_video_key, job_thumbnail_key, Job};
use spotgen_storage::AssetStore;

use crate::config::AudioMode;
use crate::engine::MediaEngine;
use crate::error::{PipelineError, PipelineResult};

/// Local artifacts feeding the composition.
pub struct ComposeInputs<'a> {
    /// Scene clips in scene order
    pub clips: &'a [PathBuf],
    /// Narration track, if the job has one
    pub narration: Option<&'a Path>,
    /// Background music track
    pub music: Option<&'a Path>,
    /// Disclosure text and its start time
    pub disclosure: Option<(&'a str, f64)>,
}

/// Uploaded composition outputs.
#[derive(Debug)]
pub struct ComposedVideo {
    pub video_key: String,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

pub struct Composer {
    store: Arc<dyn AssetStore>,
    engine: Arc<dyn MediaEngine>,
    audio_mode: AudioMode,
    thumbnail_width: u32,
}

impl Composer {
    pub fn new(
        store: Arc<dyn AssetStore>,
        engine: Arc<dyn MediaEngine>,
        audio_mode: AudioMode,
        thumbnail_width: u32,
    ) -> Self {
        Self {
            store,
            engine,
            audio_mode,
            thumbnail_width,
        }
    }

    pub async fn compose(
        &self,
        job: &Job,
        inputs: ComposeInputs<'_>,
        work_dir: &Path,
    ) -> PipelineResult<ComposedVideo> {
        if inputs.clips.is_empty() {
            return Err(PipelineError::validation("no clips to compose"));
        }

        let concat_path = work_dir.join("composed.mp4");
        self.engine.concat(inputs.clips, &concat_path).await?;

        let mut current = concat_path;

        if let Some((text, start_secs)) = inputs.disclosure {
            let overlaid = work_dir.join("composed-overlay.mp4");
            self.engine
                .burn_overlay(
                    &current,
                    &overlaid,
                    text,
                    start_secs,
                    job.request.aspect_ratio.frame_width(),
                )
                .await?;
            current = overlaid;
        }

        let has_audio = inputs.narration.is_some() || inputs.music.is_some();
        if self.audio_mode == AudioMode::SeparateTracks {
            // narration/music ship as their own deliverables; the final
            // video carries no audio at all, provider audio included
            let silent = work_dir.join("composed-silent.mp4");
            self.engine.strip_audio(&current, &silent).await?;
            current = silent;
            debug!(job_id = %job.id, "Separate track mode, stripped audio from final video");
        } else if has_audio {
            let muxed = work_dir.join("composed-final.mp4");
            self.engine
                .mux(&current, inputs.narration, inputs.music, &muxed)
                .await?;
            current = muxed;
        }

        let video_key = final_video_key(&job.user_id, job.id.as_str());
        let video_url = self.store.put(&video_key, &current, "video/mp4").await?;

        let thumbnail_url = self.upload_thumbnail(job, &current, work_dir).await;

        info!(
            job_id = %job.id,
            video_key,
            clips = inputs.clips.len(),
            "Final video composed"
        );
        Ok(ComposedVideo {
            video_key,
            video_url,
            thumbnail_url,
        })
    }

    /// Best-effort job thumbnail from the start of the final video.
    async fn upload_thumbnail(&self, job: &Job, video: &Path, work_dir: &Path) -> Option<String> {
        let thumb_path = work_dir.join("thumbnail.jpg");
        if let Err(e) = self
            .engine
            .thumbnail(video, &thumb_path, self.thumbnail_width)
            .await
        {
            debug!(job_id = %job.id, "Thumbnail generation failed: {}", e);
            return None;
        }

        let key = job_thumbnail_key(&job.user_id, job.id.as_str());
        match self.store.put(&key, &thumb_path, "image/jpeg").await {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(job_id = %job.id, "Thumbnail upload failed: {}", e);
                None
            }
        }
    }
}
