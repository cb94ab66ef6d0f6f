//! Job orchestration for the ad generation pipeline.
//!
//! This crate provides:
//! - The stage state machine driving a job from script to final video
//! - A semaphore-backed admission gate bounding concurrent jobs
//! - Scene rendering with continuity frame chaining
//! - Narration, music, and final composition stages
//! - Scene regeneration with versioning and downstream cascade
//! - The `PipelineService` entry point tying it all together

pub mod composer;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod logging;
pub mod music;
pub mod narration;
pub mod orchestrator;
pub mod regeneration;
pub mod scene_renderer;
pub mod service;

pub use composer::{ComposeInputs, ComposedVideo, Composer};
pub use config::{AudioMode, PipelineConfig};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{PipelineError, PipelineResult};
pub use gate::{ConcurrencyGate, GatePermit};
pub use logging::{init_logging, JobLogger};
pub use music::{MusicGenerator, MusicTrack};
pub use narration::{NarrationGenerator, NarrationTrack};
pub use orchestrator::Orchestrator;
pub use regeneration::{RegenerationController, RegenerationOutcome};
pub use scene_renderer::{RenderedScene, SceneRenderer};
pub use service::PipelineService;
