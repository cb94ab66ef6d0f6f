//! Narration stage.
//!
//! Synthesizes the voiceover once at baseline speed, then applies the
//! disclosure speed transform to the tail when the request carries a
//! disclosure, and uploads the result at the narration key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use spotgen_models::{narration_key, Job, Voice};
use spotgen_providers::TtsProvider;
use spotgen_storage::AssetStore;

use crate::engine::MediaEngine;
use crate::error::{PipelineError, PipelineResult};

/// Synthesized narration: the uploaded URL plus the local file kept
/// for composition.
#[derive(Debug)]
pub struct NarrationTrack {
    pub url: String,
    pub local_path: PathBuf,
}

pub struct NarrationGenerator {
    tts: Arc<dyn TtsProvider>,
    store: Arc<dyn AssetStore>,
    engine: Arc<dyn MediaEngine>,
    disclosure_speed: f64,
}

impl NarrationGenerator {
    pub fn new(
        tts: Arc<dyn TtsProvider>,
        store: Arc<dyn AssetStore>,
        engine: Arc<dyn MediaEngine>,
        disclosure_speed: f64,
    ) -> Self {
        Self {
            tts,
            store,
            engine,
            disclosure_speed,
        }
    }

    fn validate(job: &Job) -> PipelineResult<(String, Voice)> {
        let text = job
            .request
            .narration_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PipelineError::validation("narration text is empty"))?;
        let voice = job
            .request
            .voice
            .ok_or_else(|| PipelineError::validation("narration requested without a voice"))?;
        if let Some(start) = job.request.disclosure_start_secs {
            if start < 0.0 {
                return Err(PipelineError::validation(
                    "disclosure start must not be negative",
                ));
            }
        }
        Ok((text.to_string(), voice))
    }

    /// Generate the narration track for a job that requested one.
    pub async fn generate(&self, job: &Job, work_dir: &Path) -> PipelineResult<NarrationTrack> {
        let (text, voice) = Self::validate(job)?;

        let bytes = self.tts.synthesize(&text, voice, 1.0).await?;
        let raw_path = work_dir.join("narration-raw.mp3");
        tokio::fs::write(&raw_path, &bytes).await?;

        let local_path = match job.request.disclosure_start_secs {
            Some(start) if job.request.disclosure_text.is_some() => {
                let shaped = work_dir.join("narration.mp3");
                self.engine
                    .disclosure_speed(&raw_path, &shaped, start, self.disclosure_speed)
                    .await?;
                shaped
            }
            _ => raw_path,
        };

        let key = narration_key(&job.user_id, job.id.as_str());
        let url = self.store.put(&key, &local_path, "audio/mpeg").await?;

        info!(job_id = %job.id, key, "Narration uploaded");
        Ok(NarrationTrack { url, local_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotgen_models::JobRequest;

    #[test]
    fn test_validation_requires_text_and_voice() {
        let job = Job::new("u", JobRequest::new("ad", 30));
        assert!(NarrationGenerator::validate(&job).is_err());

        let mut request = JobRequest::new("ad", 30);
        request.narration_text = Some("   ".to_string());
        request.voice = Some(Voice::Male);
        let job = Job::new("u", request);
        assert!(NarrationGenerator::validate(&job).is_err());

        let mut request = JobRequest::new("ad", 30);
        request.narration_text = Some("Buy now".to_string());
        let job = Job::new("u", request);
        let err = NarrationGenerator::validate(&job).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_validation_rejects_negative_disclosure_start() {
        let request = JobRequest::new("ad", 30)
            .with_narration("Buy now", Voice::Female)
            .with_disclosure("terms apply", -1.0);
        let job = Job::new("u", request);
        assert!(NarrationGenerator::validate(&job).is_err());
    }
}
