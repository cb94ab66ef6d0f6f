//! Media engine seam.
//!
//! The orchestrator talks to local media processing through this trait
//! so the whole pipeline can run against a fake engine in tests. The
//! real implementation shells out to ffmpeg via `spotgen-media` and
//! downloads provider output over HTTP.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use spotgen_media::{self as media, FrameResult};

use crate::error::{PipelineError, PipelineResult};

/// Local media operations the pipeline depends on.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Download remote media to a local file.
    async fn download(&self, url: &str, dest: &Path) -> PipelineResult<()>;

    /// Best-effort extraction of a video's last frame.
    async fn extract_continuity_frame(&self, video: &Path, dest: &Path) -> FrameResult;

    /// Lossless ordered concatenation of clips.
    async fn concat(&self, clips: &[PathBuf], output: &Path) -> PipelineResult<()>;

    /// Burn a time-boxed text overlay into a video.
    async fn burn_overlay(
        &self,
        input: &Path,
        output: &Path,
        text: &str,
        start_secs: f64,
        frame_width: u32,
    ) -> PipelineResult<()>;

    /// Mux narration and/or music into a video.
    async fn mux(
        &self,
        video: &Path,
        narration: Option<&Path>,
        music: Option<&Path>,
        output: &Path,
    ) -> PipelineResult<()>;

    /// Drop all audio streams, copying the video stream.
    async fn strip_audio(&self, video: &Path, output: &Path) -> PipelineResult<()>;

    /// Speed up the narration tail from `start_secs` by `speed`.
    async fn disclosure_speed(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        speed: f64,
    ) -> PipelineResult<()>;

    /// Generate a thumbnail from the start of a video.
    async fn thumbnail(&self, video: &Path, output: &Path, width: u32) -> PipelineResult<()>;
}

/// FFmpeg-backed engine used in production.
pub struct FfmpegEngine {
    client: Client,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn download(&self, url: &str, dest: &Path) -> PipelineResult<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::download(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::download(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::download(url, e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(url, dest = %dest.display(), "Downloaded media");
        Ok(())
    }

    async fn extract_continuity_frame(&self, video: &Path, dest: &Path) -> FrameResult {
        media::extract_continuity_frame(video, dest).await
    }

    async fn concat(&self, clips: &[PathBuf], output: &Path) -> PipelineResult<()> {
        media::concat_clips(clips, output).await?;
        Ok(())
    }

    async fn burn_overlay(
        &self,
        input: &Path,
        output: &Path,
        text: &str,
        start_secs: f64,
        frame_width: u32,
    ) -> PipelineResult<()> {
        media::burn_overlay(input, output, text, start_secs, frame_width).await?;
        Ok(())
    }

    async fn mux(
        &self,
        video: &Path,
        narration: Option<&Path>,
        music: Option<&Path>,
        output: &Path,
    ) -> PipelineResult<()> {
        media::mux_audio(video, narration, music, output).await?;
        Ok(())
    }

    async fn strip_audio(&self, video: &Path, output: &Path) -> PipelineResult<()> {
        media::strip_audio(video, output).await?;
        Ok(())
    }

    async fn disclosure_speed(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        speed: f64,
    ) -> PipelineResult<()> {
        media::apply_disclosure_speed(input, output, start_secs, speed).await?;
        Ok(())
    }

    async fn thumbnail(&self, video: &Path, output: &Path, width: u32) -> PipelineResult<()> {
        media::generate_thumbnail(video, output, width).await?;
        Ok(())
    }
}
