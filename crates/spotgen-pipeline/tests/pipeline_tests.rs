//! End-to-end pipeline tests against in-memory stores and fake
//! providers, exercising the full stage machine without ffmpeg or any
//! network.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use spotgen_jobstore::{JobStore, MemoryJobStore, StageUpdate};
use spotgen_media::FrameResult;
use spotgen_models::{
    clip_key, final_video_key, thumbnail_key, versioned, Job, JobRequest, JobStatus, Scene,
    Script, Stage, Voice,
};
use spotgen_pipeline::{
    AudioMode, Composer, MediaEngine, Orchestrator, PipelineConfig, PipelineError,
    RegenerationController, SceneRenderer,
};
use spotgen_providers::{
    GenerationProvider, GenerationRequest, PollConfig, PollOutcome, ProviderError,
    ProviderResult, ScriptGenerator, ScriptRequest, TtsProvider,
};
use spotgen_storage::{AssetStore, MemoryAssetStore};

struct FakeScriptGenerator {
    scenes: u32,
}

#[async_trait]
impl ScriptGenerator for FakeScriptGenerator {
    async fn generate(&self, request: &ScriptRequest) -> ProviderResult<Script> {
        let per_scene = request.duration_secs as f64 / self.scenes as f64;
        let scenes = (1..=self.scenes)
            .map(|n| Scene {
                number: n,
                start_time: (n - 1) as f64 * per_scene,
                duration: per_scene,
                generation_prompt: format!("scene {} of {}", n, request.prompt),
                start_image_url: None,
                location: None,
                action: None,
                camera: None,
                lighting: None,
            })
            .collect();
        Ok(Script {
            id: "script-1".to_string(),
            scenes,
            music_mood: Some("upbeat".to_string()),
            music_style: Some("synth pop".to_string()),
        })
    }
}

struct FakeProvider {
    name: String,
    submits: AtomicU32,
    fail_on_submit: Option<u32>,
    never_complete: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeProvider {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            submits: AtomicU32::new(0),
            fail_on_submit: None,
            never_complete: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(name: &str, submit_index: u32) -> Self {
        Self {
            fail_on_submit: Some(submit_index),
            ..Self::new(name)
        }
    }

    fn stuck(name: &str) -> Self {
        Self {
            never_complete: true,
            ..Self::new(name)
        }
    }

    async fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &GenerationRequest) -> ProviderResult<String> {
        self.requests.lock().await.push(request.clone());
        let index = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_submit == Some(index) {
            return Err(ProviderError::GenerationFailed(
                "model rejected the prompt".to_string(),
            ));
        }
        Ok(format!("{}-pred-{}", self.name, index))
    }

    async fn poll(&self, prediction_id: &str) -> ProviderResult<PollOutcome> {
        if self.never_complete {
            return Ok(PollOutcome::Processing);
        }
        Ok(PollOutcome::Completed {
            media_url: format!("https://providers.test/{}.mp4", prediction_id),
        })
    }
}

struct FakeTts;

#[async_trait]
impl TtsProvider for FakeTts {
    async fn synthesize(&self, _text: &str, _voice: Voice, _speed: f64) -> ProviderResult<Vec<u8>> {
        Ok(b"tts-audio".to_vec())
    }
}

/// Media engine that fabricates files instead of running ffmpeg and
/// records every call for assertions.
struct FakeEngine {
    calls: Mutex<Vec<String>>,
    degrade_frames: bool,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            degrade_frames: false,
        }
    }

    async fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: String) {
        self.calls.lock().await.push(call);
    }

    async fn write(dest: &Path, data: &[u8]) -> Result<(), PipelineError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, data).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), PipelineError> {
        self.record(format!("download {}", url)).await;
        Self::write(dest, url.as_bytes()).await
    }

    async fn extract_continuity_frame(&self, _video: &Path, dest: &Path) -> FrameResult {
        if self.degrade_frames {
            return FrameResult::Degraded("no frame".to_string());
        }
        match Self::write(dest, b"frame").await {
            Ok(()) => FrameResult::Extracted(dest.to_path_buf()),
            Err(e) => FrameResult::Degraded(e.to_string()),
        }
    }

    async fn concat(&self, clips: &[PathBuf], output: &Path) -> Result<(), PipelineError> {
        self.record(format!("concat {}", clips.len())).await;
        let mut combined = Vec::new();
        for clip in clips {
            combined.extend(tokio::fs::read(clip).await?);
            combined.push(b'\n');
        }
        Self::write(output, &combined).await
    }

    async fn burn_overlay(
        &self,
        input: &Path,
        output: &Path,
        _text: &str,
        start_secs: f64,
        _frame_width: u32,
    ) -> Result<(), PipelineError> {
        self.record(format!("overlay@{:.1}", start_secs)).await;
        let data = tokio::fs::read(input).await?;
        Self::write(output, &data).await
    }

    async fn mux(
        &self,
        video: &Path,
        narration: Option<&Path>,
        music: Option<&Path>,
        output: &Path,
    ) -> Result<(), PipelineError> {
        self.record(format!(
            "mux narration={} music={}",
            narration.is_some(),
            music.is_some()
        ))
        .await;
        let data = tokio::fs::read(video).await?;
        Self::write(output, &data).await
    }

    async fn strip_audio(&self, video: &Path, output: &Path) -> Result<(), PipelineError> {
        self.record("strip_audio".to_string()).await;
        let mut data = b"silent\n".to_vec();
        data.extend(tokio::fs::read(video).await?);
        Self::write(output, &data).await
    }

    async fn disclosure_speed(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        speed: f64,
    ) -> Result<(), PipelineError> {
        self.record(format!("disclosure@{:.1}x{:.1}", start_secs, speed))
            .await;
        let data = tokio::fs::read(input).await?;
        Self::write(output, &data).await
    }

    async fn thumbnail(&self, _video: &Path, output: &Path, _width: u32) -> Result<(), PipelineError> {
        self.record("thumbnail".to_string()).await;
        Self::write(output, b"thumb").await
    }
}

struct Harness {
    job_store: Arc<MemoryJobStore>,
    assets: Arc<MemoryAssetStore>,
    video: Arc<FakeProvider>,
    engine: Arc<FakeEngine>,
    orchestrator: Orchestrator,
    config: PipelineConfig,
    _work: tempfile::TempDir,
}

fn fast_config(work_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        poll_interval: Duration::from_millis(1),
        max_poll_attempts: 50,
        work_dir: work_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

fn build_harness(
    scenes: u32,
    video: FakeProvider,
    mutate: impl FnOnce(&mut PipelineConfig),
) -> Harness {
    let work = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path());
    mutate(&mut config);

    let job_store = Arc::new(MemoryJobStore::new());
    let assets = Arc::new(MemoryAssetStore::new());
    let video = Arc::new(video);
    let engine = Arc::new(FakeEngine::new());

    let orchestrator = Orchestrator::new(
        config.clone(),
        job_store.clone() as Arc<dyn JobStore>,
        assets.clone() as Arc<dyn AssetStore>,
        Arc::new(FakeScriptGenerator { scenes }),
        video.clone() as Arc<dyn GenerationProvider>,
        Arc::new(FakeProvider::new("music")) as Arc<dyn GenerationProvider>,
        Arc::new(FakeTts),
        engine.clone() as Arc<dyn MediaEngine>,
    );

    Harness {
        job_store,
        assets,
        video,
        engine,
        orchestrator,
        config,
        _work: work,
    }
}

impl Harness {
    async fn create_job(&self, request: JobRequest) -> Job {
        let job = Job::new("u1", request);
        self.job_store.create(&job).await.unwrap();
        job
    }

    fn controller(&self) -> RegenerationController {
        let poll_config = PollConfig {
            interval: self.config.poll_interval,
            max_attempts: self.config.max_poll_attempts,
        };
        RegenerationController::new(
            self.config.clone(),
            self.job_store.clone() as Arc<dyn JobStore>,
            self.assets.clone() as Arc<dyn AssetStore>,
            SceneRenderer::new(
                self.video.clone() as Arc<dyn GenerationProvider>,
                self.assets.clone() as Arc<dyn AssetStore>,
                self.engine.clone() as Arc<dyn MediaEngine>,
                poll_config,
            ),
            Composer::new(
                self.assets.clone() as Arc<dyn AssetStore>,
                self.engine.clone() as Arc<dyn MediaEngine>,
                self.config.audio_mode,
                self.config.thumbnail_width,
            ),
        )
    }
}

#[tokio::test]
async fn test_three_scene_job_completes() {
    let h = build_harness(3, FakeProvider::new("video"), |_| {});
    let job = h.create_job(JobRequest::new("a fizzy drink ad", 30)).await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let done = h.job_store.get(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.stage, Stage::Complete);
    assert_eq!(done.progress_percent(), 100);
    assert!(done.completed_at.is_some());

    let expected_urls: Vec<String> = (1..=3)
        .map(|n| format!("memory://{}", clip_key("u1", job.id.as_str(), n)))
        .collect();
    assert_eq!(done.scene_video_urls, expected_urls);

    let final_key = final_video_key("u1", job.id.as_str());
    assert_eq!(done.video_key.as_deref(), Some(final_key.as_str()));
    assert!(h.assets.get_bytes(&final_key).await.is_some());
    assert!(done.thumbnail_url.is_some());
    assert!(done.audio_url.is_some());
    assert!(done.narrator_audio_url.is_none());
}

#[tokio::test]
async fn test_continuity_chains_scene_frames() {
    let h = build_harness(3, FakeProvider::new("video"), |_| {});
    let job = h.create_job(JobRequest::new("ad", 30)).await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let requests = h.video.recorded_requests().await;
    assert_eq!(requests.len(), 3);
    for (i, request) in requests.iter().enumerate() {
        assert!(request.prompt.starts_with(&format!("scene {}", i + 1)));
    }
    assert!(requests[0].start_image_url.is_none());
    assert_eq!(
        requests[1].start_image_url.as_deref(),
        Some(format!("memory://{}", thumbnail_key("u1", job.id.as_str(), 1)).as_str())
    );
    assert_eq!(
        requests[2].start_image_url.as_deref(),
        Some(format!("memory://{}", thumbnail_key("u1", job.id.as_str(), 2)).as_str())
    );

    // the seed actually used is persisted on the scene record
    let done = h.job_store.get(&job.id).await.unwrap();
    assert!(done.scenes[0].start_image_url.is_none());
    assert!(done.scenes[1].start_image_url.is_some());
}

#[tokio::test]
async fn test_caller_image_override_beats_continuity() {
    let h = build_harness(3, FakeProvider::new("video"), |_| {});
    let job = h
        .create_job(
            JobRequest::new("ad", 30).with_scene_image(3, "https://example.com/product.jpg"),
        )
        .await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let requests = h.video.recorded_requests().await;
    assert_eq!(
        requests[2].start_image_url.as_deref(),
        Some("https://example.com/product.jpg")
    );
}

#[tokio::test]
async fn test_scene_failure_freezes_job_at_stage() {
    let h = build_harness(3, FakeProvider::failing_on("video", 2), |_| {});
    let job = h.create_job(JobRequest::new("ad", 30)).await;

    let (_tx, rx) = watch::channel(false);
    let err = h.orchestrator.run(&job.id, rx).await.unwrap_err();
    assert!(matches!(err, PipelineError::Scene { scene: 2, .. }));

    let failed = h.job_store.get(&job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.stage.as_tag(), "scene_2_generating");
    assert_eq!(failed.scene_video_urls.len(), 1);
    let message = failed.error_message.as_deref().unwrap();
    assert!(message.contains("Scene 2"));
    assert!(message.contains("model rejected the prompt"));

    // scene 1's assets stay retrievable
    assert!(h
        .assets
        .get_bytes(&clip_key("u1", job.id.as_str(), 1))
        .await
        .is_some());

    // frozen: ordinary stage writes are refused
    let refused = h
        .job_store
        .update_stage(&job.id, Stage::SceneComplete(2), StageUpdate::none())
        .await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn test_narration_with_disclosure_speed() {
    let h = build_harness(2, FakeProvider::new("video"), |_| {});
    let job = h
        .create_job(
            JobRequest::new("ad", 30)
                .with_narration("This product changed my life", Voice::Female)
                .with_disclosure("Paid partnership, terms apply", 24.0),
        )
        .await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let done = h.job_store.get(&job.id).await.unwrap();
    assert!(done
        .narrator_audio_url
        .as_deref()
        .unwrap()
        .ends_with("audio/narrator-voiceover.mp3"));

    let calls = h.engine.recorded_calls().await;
    assert!(calls.contains(&"disclosure@24.0x1.4".to_string()));
    assert!(calls.contains(&"overlay@24.0".to_string()));
    assert!(calls.contains(&"mux narration=true music=true".to_string()));
    assert!(!calls.contains(&"strip_audio".to_string()));
}

#[tokio::test]
async fn test_separate_tracks_mode_silences_final_video() {
    let h = build_harness(2, FakeProvider::new("video"), |c| {
        c.audio_mode = AudioMode::SeparateTracks;
    });
    let job = h
        .create_job(JobRequest::new("ad", 30).with_narration("Buy now", Voice::Male))
        .await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let done = h.job_store.get(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.narrator_audio_url.is_some());
    assert!(done.audio_url.is_some());

    let calls = h.engine.recorded_calls().await;
    assert!(!calls.iter().any(|c| c.starts_with("mux")));
    assert!(calls.contains(&"strip_audio".to_string()));

    // the deliverable is the silenced concat, not the raw clips
    let final_bytes = h
        .assets
        .get_bytes(&final_video_key("u1", job.id.as_str()))
        .await
        .unwrap();
    let raw_concat = b"https://providers.test/video-pred-1.mp4\n\
                       https://providers.test/video-pred-2.mp4\n"
        .to_vec();
    assert_ne!(final_bytes, raw_concat);
    assert_eq!(final_bytes, [b"silent\n".to_vec(), raw_concat].concat());
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let h = build_harness(2, FakeProvider::stuck("video"), |c| {
        c.job_timeout = Duration::from_millis(20);
        c.poll_interval = Duration::from_millis(5);
    });
    let job = h.create_job(JobRequest::new("ad", 30)).await;

    let (_tx, rx) = watch::channel(false);
    let err = h.orchestrator.run(&job.id, rx).await.unwrap_err();
    assert!(matches!(err, PipelineError::DeadlineExceeded(_)));

    let failed = h.job_store.get(&job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_message.as_deref().unwrap().contains("deadline"));
}

#[tokio::test]
async fn test_cancellation_mid_render() {
    let h = build_harness(2, FakeProvider::stuck("video"), |c| {
        c.poll_interval = Duration::from_millis(50);
        c.max_poll_attempts = 1000;
    });
    let job = h.create_job(JobRequest::new("ad", 30)).await;

    let (tx, rx) = watch::channel(false);
    let orchestrator = h.orchestrator;
    let job_id = job.id.clone();
    let handle = tokio::spawn(async move { orchestrator.run(&job_id, rx).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send(true).unwrap();

    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_canceled());

    let failed = h.job_store.get(&job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.stage.as_tag(), "scene_1_generating");
}

#[tokio::test]
async fn test_regeneration_cascade() {
    let h = build_harness(4, FakeProvider::new("video"), |_| {});
    let job = h.create_job(JobRequest::new("ad", 40)).await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let controller = h.controller();
    let (_ctx, mut cancel_rx) = watch::channel(false);
    let outcome = controller
        .regenerate_scene(&job.id, 2, true, &mut cancel_rx)
        .await
        .unwrap();

    assert_eq!(outcome.scene, 2);
    assert_eq!(outcome.new_version, 2);
    assert_eq!(outcome.cascaded, vec![3, 4]);
    assert!(outcome.recomposed);

    let after = h.job_store.get(&job.id).await.unwrap();
    assert_eq!(after.scene_version(1), 1);
    assert_eq!(after.scene_version(2), 2);
    assert_eq!(after.scene_version(3), 2);
    assert_eq!(after.scene_version(4), 2);

    // versioned clips live alongside the originals, never replacing them
    let base = clip_key("u1", job.id.as_str(), 2);
    assert!(h.assets.get_bytes(&base).await.is_some());
    assert!(h.assets.get_bytes(&versioned(&base, 2)).await.is_some());
    let untouched = clip_key("u1", job.id.as_str(), 1);
    assert!(h.assets.get_bytes(&versioned(&untouched, 2)).await.is_none());

    // clip URLs now point at the new versions
    assert!(after.scene_video_urls[1].ends_with("scene-2-v2.mp4"));
    assert!(after.scene_video_urls[0].ends_with("scene-1.mp4"));
}

#[tokio::test]
async fn test_regeneration_without_cascade() {
    let h = build_harness(3, FakeProvider::new("video"), |_| {});
    let job = h.create_job(JobRequest::new("ad", 30)).await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let controller = h.controller();
    let (_ctx, mut cancel_rx) = watch::channel(false);
    let outcome = controller
        .regenerate_scene(&job.id, 2, false, &mut cancel_rx)
        .await
        .unwrap();

    assert!(outcome.cascaded.is_empty());
    let after = h.job_store.get(&job.id).await.unwrap();
    assert_eq!(after.scene_version(2), 2);
    assert_eq!(after.scene_version(3), 1);

    // the regenerated scene was reseeded from scene 1's persisted frame
    let requests = h.video.recorded_requests().await;
    let regen_request = requests.last().unwrap();
    assert_eq!(
        regen_request.start_image_url.as_deref(),
        Some(format!("memory://{}", thumbnail_key("u1", job.id.as_str(), 1)).as_str())
    );
}

#[tokio::test]
async fn test_regeneration_rejected_while_processing() {
    let h = build_harness(2, FakeProvider::new("video"), |_| {});
    let job = h.create_job(JobRequest::new("ad", 30)).await;
    h.job_store
        .update_stage(&job.id, Stage::SceneGenerating(1), StageUpdate::none())
        .await
        .unwrap();

    let controller = h.controller();
    let (_ctx, mut cancel_rx) = watch::channel(false);
    let err = controller
        .regenerate_scene(&job.id, 1, false, &mut cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::JobActive(_)));
}

#[tokio::test]
async fn test_regeneration_rejects_unknown_scene() {
    let h = build_harness(2, FakeProvider::new("video"), |_| {});
    let job = h.create_job(JobRequest::new("ad", 30)).await;

    let (_tx, rx) = watch::channel(false);
    h.orchestrator.run(&job.id, rx).await.unwrap();

    let controller = h.controller();
    let (_ctx, mut cancel_rx) = watch::channel(false);
    let err = controller
        .regenerate_scene(&job.id, 7, false, &mut cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[tokio::test]
async fn test_degraded_frames_leave_scenes_unseeded() {
    let work = tempfile::tempdir().unwrap();
    let config = fast_config(work.path());

    let job_store = Arc::new(MemoryJobStore::new());
    let assets = Arc::new(MemoryAssetStore::new());
    let video = Arc::new(FakeProvider::new("video"));
    let engine = Arc::new(FakeEngine {
        calls: Mutex::new(Vec::new()),
        degrade_frames: true,
    });

    let orchestrator = Orchestrator::new(
        config,
        job_store.clone() as Arc<dyn JobStore>,
        assets.clone() as Arc<dyn AssetStore>,
        Arc::new(FakeScriptGenerator { scenes: 3 }),
        video.clone() as Arc<dyn GenerationProvider>,
        Arc::new(FakeProvider::new("music")) as Arc<dyn GenerationProvider>,
        Arc::new(FakeTts),
        engine as Arc<dyn MediaEngine>,
    );

    let job = Job::new("u1", JobRequest::new("ad", 30));
    job_store.create(&job).await.unwrap();

    let (_tx, rx) = watch::channel(false);
    orchestrator.run(&job.id, rx).await.unwrap();

    // degraded extraction never fails the job, every render just goes
    // unseeded
    let done = job_store.get(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    let requests = video.recorded_requests().await;
    assert!(requests.iter().all(|r| r.start_image_url.is_none()));
}
