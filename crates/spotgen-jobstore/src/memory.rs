//! In-memory job store.
//!
//! Last-writer-wins over a `RwLock`-guarded map. Backs the pipeline in
//! tests and single-process deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use spotgen_models::{Job, JobId, JobStatus, Stage};

use crate::error::{JobStoreError, JobStoreResult};
use crate::store::{JobStore, StageUpdate};

#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_update(job: &mut Job, update: StageUpdate) {
        if let Some(script_id) = update.script_id {
            job.script_id = Some(script_id);
        }
        if let Some(scenes) = update.scenes {
            job.scenes = scenes;
        }
        if let Some((scene, url)) = update.scene_clip {
            let idx = scene.saturating_sub(1) as usize;
            if idx < job.scene_video_urls.len() {
                job.scene_video_urls[idx] = url;
            } else if idx == job.scene_video_urls.len() {
                job.scene_video_urls.push(url);
            }
        }
        if let Some((scene, version)) = update.scene_version {
            job.scene_versions.insert(scene, version);
        }
        if let Some((scene, url)) = update.scene_start_image {
            if let Some(s) = job.scenes.iter_mut().find(|s| s.number == scene) {
                s.start_image_url = Some(url);
            }
        }
        if let Some(url) = update.thumbnail_url {
            job.thumbnail_url = Some(url);
        }
        if let Some(url) = update.audio_url {
            job.audio_url = Some(url);
        }
        if let Some(url) = update.narrator_audio_url {
            job.narrator_audio_url = Some(url);
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> JobStoreResult<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, user_id = %job.user_id, "Job created");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> JobStoreResult<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))
    }

    async fn list_by_user(&self, user_id: &str) -> JobStoreResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut result: Vec<Job> = jobs
            .values()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update_stage(
        &self,
        id: &JobId,
        stage: Stage,
        update: StageUpdate,
    ) -> JobStoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;

        if job.status == JobStatus::Failed {
            return Err(JobStoreError::Frozen(
                id.clone(),
                "job has failed; only scene regeneration may write".to_string(),
            ));
        }

        job.stage = stage;
        if stage == Stage::Complete {
            job.status = JobStatus::Completed;
        } else if job.status == JobStatus::Pending {
            job.status = JobStatus::Processing;
        }
        Self::apply_update(job, update);
        job.updated_at = Utc::now();

        debug!(job_id = %id, stage = stage.as_tag(), "Stage updated");
        Ok(())
    }

    async fn mark_failed(&self, id: &JobId, message: &str) -> JobStoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;

        job.status = JobStatus::Failed;
        job.error_message = Some(message.to_string());
        job.updated_at = Utc::now();

        debug!(job_id = %id, stage = job.stage.as_tag(), "Job marked failed");
        Ok(())
    }

    async fn mark_complete(&self, id: &JobId, video_key: &str) -> JobStoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;

        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.stage = Stage::Complete;
        job.video_key = Some(video_key.to_string());
        job.completed_at = Some(now);
        job.updated_at = now;

        debug!(job_id = %id, video_key, "Job completed");
        Ok(())
    }

    async fn record_regeneration(
        &self,
        id: &JobId,
        scene: u32,
        version: u32,
        clip_url: &str,
        start_image_url: Option<&str>,
    ) -> JobStoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;

        job.scene_versions.insert(scene, version);
        let idx = scene.saturating_sub(1) as usize;
        if idx < job.scene_video_urls.len() {
            job.scene_video_urls[idx] = clip_url.to_string();
        } else if idx == job.scene_video_urls.len() {
            job.scene_video_urls.push(clip_url.to_string());
        }
        if let Some(url) = start_image_url {
            if let Some(s) = job.scenes.iter_mut().find(|s| s.number == scene) {
                s.start_image_url = Some(url.to_string());
            }
        }
        job.updated_at = Utc::now();

        debug!(job_id = %id, scene, version, "Scene regeneration recorded");
        Ok(())
    }

    async fn delete(&self, id: &JobId) -> JobStoreResult<()> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotgen_models::{JobRequest, Scene};

    fn scene(n: u32) -> Scene {
        Scene {
            number: n,
            start_time: (n - 1) as f64 * 5.0,
            duration: 5.0,
            generation_prompt: format!("scene {n}"),
            start_image_url: None,
            location: None,
            action: None,
            camera: None,
            lighting: None,
        }
    }

    fn new_job() -> Job {
        Job::new("user-1", JobRequest::new("a fizzy drink ad", 30))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryJobStore::new();
        let job = new_job();
        store.create(&job).await.unwrap();

        let loaded = store.get(&job.id).await.unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_missing_job() {
        let store = MemoryJobStore::new();
        let err = store.get(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, JobStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stage_update_applies_metadata() {
        let store = MemoryJobStore::new();
        let job = new_job();
        store.create(&job).await.unwrap();

        store
            .update_stage(
                &job.id,
                Stage::ScriptComplete,
                StageUpdate::with_script("script-1", vec![scene(1), scene(2)]),
            )
            .await
            .unwrap();

        let loaded = store.get(&job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Processing);
        assert_eq!(loaded.stage, Stage::ScriptComplete);
        assert_eq!(loaded.script_id.as_deref(), Some("script-1"));
        assert_eq!(loaded.scenes.len(), 2);
        assert!(loaded.updated_at >= job.updated_at);
    }

    #[tokio::test]
    async fn test_scene_clips_append_in_order() {
        let store = MemoryJobStore::new();
        let job = new_job();
        store.create(&job).await.unwrap();

        for n in 1..=3u32 {
            store
                .update_stage(
                    &job.id,
                    Stage::SceneComplete(n),
                    StageUpdate::with_scene_clip(n, format!("memory://clip-{n}"), 1),
                )
                .await
                .unwrap();
        }

        let loaded = store.get(&job.id).await.unwrap();
        assert_eq!(
            loaded.scene_video_urls,
            vec!["memory://clip-1", "memory://clip-2", "memory://clip-3"]
        );
        assert_eq!(loaded.scene_version(2), 1);
    }

    #[tokio::test]
    async fn test_failed_job_is_frozen() {
        let store = MemoryJobStore::new();
        let job = new_job();
        store.create(&job).await.unwrap();

        store
            .update_stage(&job.id, Stage::SceneGenerating(2), StageUpdate::none())
            .await
            .unwrap();
        store.mark_failed(&job.id, "provider error").await.unwrap();

        let loaded = store.get(&job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.stage, Stage::SceneGenerating(2));
        assert_eq!(loaded.error_message.as_deref(), Some("provider error"));

        let err = store
            .update_stage(&job.id, Stage::SceneComplete(2), StageUpdate::none())
            .await
            .unwrap_err();
        assert!(matches!(err, JobStoreError::Frozen(_, _)));
    }

    #[tokio::test]
    async fn test_regeneration_writes_through_freeze() {
        let store = MemoryJobStore::new();
        let mut job = new_job();
        job.scenes = vec![scene(1), scene(2)];
        job.scene_video_urls = vec!["memory://clip-1".into(), "memory://clip-2".into()];
        store.create(&job).await.unwrap();
        store.mark_failed(&job.id, "boom").await.unwrap();

        store
            .record_regeneration(
                &job.id,
                2,
                2,
                "memory://clip-2-v2",
                Some("memory://frame-1"),
            )
            .await
            .unwrap();

        let loaded = store.get(&job.id).await.unwrap();
        assert_eq!(loaded.scene_version(2), 2);
        assert_eq!(loaded.scene_video_urls[1], "memory://clip-2-v2");
        assert_eq!(
            loaded.scenes[1].start_image_url.as_deref(),
            Some("memory://frame-1")
        );
    }

    #[tokio::test]
    async fn test_mark_complete() {
        let store = MemoryJobStore::new();
        let job = new_job();
        store.create(&job).await.unwrap();

        store
            .mark_complete(&job.id, "users/user-1/jobs/j/final-video.mp4")
            .await
            .unwrap();

        let loaded = store.get(&job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.stage, Stage::Complete);
        assert!(loaded.completed_at.is_some());
        assert_eq!(
            loaded.video_key.as_deref(),
            Some("users/user-1/jobs/j/final-video.mp4")
        );
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let store = MemoryJobStore::new();
        let mut a = new_job();
        let mut b = new_job();
        a.created_at = Utc::now() - chrono::Duration::seconds(10);
        b.created_at = Utc::now();
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();
        store
            .create(&Job::new("other", JobRequest::new("x", 15)))
            .await
            .unwrap();

        let listed = store.list_by_user("user-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);
    }
}
