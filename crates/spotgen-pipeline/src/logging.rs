//! Structured job logging utilities.

use tracing::{error, info, warn, Span};
use tracing_subscriber::EnvFilter;

use spotgen_models::{JobId, Stage};

/// Initialize the tracing subscriber from `RUST_LOG`, defaulting to
/// info level. Safe to call once at process start.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Per-job logger carrying the job ID through every lifecycle event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
        }
    }

    pub fn stage_start(&self, stage: Stage) {
        info!(job_id = %self.job_id, stage = %stage, "Stage started");
    }

    pub fn stage_complete(&self, stage: Stage) {
        info!(job_id = %self.job_id, stage = %stage, "Stage complete");
    }

    pub fn warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "Job warning: {}", message);
    }

    pub fn failure(&self, stage: Stage, message: &str) {
        error!(job_id = %self.job_id, stage = %stage, "Job failed: {}", message);
    }

    pub fn completion(&self, video_key: &str) {
        info!(job_id = %self.job_id, video_key, "Job completed");
    }

    /// Tracing span wrapping a full pipeline run.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }
}
