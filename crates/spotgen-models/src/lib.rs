//! Shared domain models for the ad generation pipeline.
//!
//! This crate defines the job record, scene script types, stage state
//! machine, and the deterministic asset key scheme used by every other
//! crate in the workspace.

pub mod job;
pub mod keys;
pub mod scene;
pub mod stage;

pub use job::{Job, JobId, JobRequest, JobStatus};
pub use keys::{
    clip_key, final_video_key, job_thumbnail_key, music_key, narration_key, thumbnail_key,
    versioned,
};
pub use scene::{AspectRatio, Scene, Script, Voice};
pub use stage::Stage;
