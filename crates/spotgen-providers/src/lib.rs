//! Generative media provider clients.
//!
//! This crate provides:
//! - The polymorphic `GenerationProvider` submit/poll abstraction
//! - A Replicate-backed implementation with video and music variants
//! - A cancellation-aware polling loop with a bounded horizon
//! - Text-to-speech (`TtsProvider`) and script (`ScriptGenerator`) seams

pub mod error;
pub mod generation;
pub mod poll;
pub mod replicate;
pub mod script;
pub mod tts;

pub use error::{ProviderError, ProviderResult};
pub use generation::{GenerationProvider, GenerationRequest, PollOutcome};
pub use poll::{poll_until_complete, PollConfig};
pub use replicate::{MusicModel, ReplicateProvider, VideoModel};
pub use script::{GeminiScriptClient, ScriptGenerator, ScriptRequest};
pub use tts::{ElevenLabsTts, TtsProvider};
