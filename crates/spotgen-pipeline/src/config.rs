//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

/// How narration and music reach the final deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    /// Mix both tracks into the final video's audio stream.
    #[default]
    Muxed,
    /// Keep the video silent; narration and music are delivered as
    /// separate uploaded tracks for client-side mixing.
    SeparateTracks,
}

impl AudioMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "muxed" => Some(AudioMode::Muxed),
            "separate" | "separate_tracks" => Some(AudioMode::SeparateTracks),
            _ => None,
        }
    }
}

/// Runtime configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum jobs processed concurrently; further jobs wait.
    pub max_concurrent_jobs: usize,
    /// Wait between provider poll attempts.
    pub poll_interval: Duration,
    /// Maximum poll attempts per prediction.
    pub max_poll_attempts: u32,
    /// Wall-clock budget for one full pipeline run.
    pub job_timeout: Duration,
    /// Scratch directory for per-job work dirs.
    pub work_dir: PathBuf,
    /// TTL for presigned read URLs handed to providers.
    pub presign_ttl: Duration,
    /// Audio delivery mode for the final video.
    pub audio_mode: AudioMode,
    /// Speed factor applied to the narration's disclosure segment.
    pub disclosure_speed: f64,
    /// Width of the generated job thumbnail.
    pub thumbnail_width: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 10,
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 120,
            job_timeout: Duration::from_secs(30 * 60),
            work_dir: std::env::temp_dir().join("spotgen"),
            presign_ttl: Duration::from_secs(3600),
            audio_mode: AudioMode::Muxed,
            disclosure_speed: 1.4,
            thumbnail_width: 640,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> PipelineResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("PIPELINE_MAX_CONCURRENT_JOBS") {
            config.max_concurrent_jobs = v
                .parse()
                .map_err(|_| PipelineError::config("invalid PIPELINE_MAX_CONCURRENT_JOBS"))?;
            if config.max_concurrent_jobs == 0 {
                return Err(PipelineError::config(
                    "PIPELINE_MAX_CONCURRENT_JOBS must be at least 1",
                ));
            }
        }
        if let Ok(v) = std::env::var("PIPELINE_POLL_INTERVAL_SECS") {
            let secs: u64 = v
                .parse()
                .map_err(|_| PipelineError::config("invalid PIPELINE_POLL_INTERVAL_SECS"))?;
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("PIPELINE_MAX_POLL_ATTEMPTS") {
            config.max_poll_attempts = v
                .parse()
                .map_err(|_| PipelineError::config("invalid PIPELINE_MAX_POLL_ATTEMPTS"))?;
        }
        if let Ok(v) = std::env::var("PIPELINE_JOB_TIMEOUT_SECS") {
            let secs: u64 = v
                .parse()
                .map_err(|_| PipelineError::config("invalid PIPELINE_JOB_TIMEOUT_SECS"))?;
            config.job_timeout = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("PIPELINE_WORK_DIR") {
            config.work_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PIPELINE_AUDIO_MODE") {
            config.audio_mode = AudioMode::parse(&v)
                .ok_or_else(|| PipelineError::config("invalid PIPELINE_AUDIO_MODE"))?;
        }
        if let Ok(v) = std::env::var("PIPELINE_DISCLOSURE_SPEED") {
            config.disclosure_speed = v
                .parse()
                .map_err(|_| PipelineError::config("invalid PIPELINE_DISCLOSURE_SPEED"))?;
            if config.disclosure_speed <= 0.0 {
                return Err(PipelineError::config(
                    "PIPELINE_DISCLOSURE_SPEED must be positive",
                ));
            }
        }

        Ok(config)
    }
}
