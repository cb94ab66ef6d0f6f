//! FFmpeg CLI wrapper for media assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with captured diagnostics
//! - Lossless stream-copy concatenation of scene clips
//! - Time-boxed text overlay with word wrap and font fallback
//! - Narration variable-speed (atempo) transform
//! - Continuity frame extraction with an explicit degraded result
//! - Cancellation and timeout support via tokio

pub mod audio;
pub mod command;
pub mod compose;
pub mod error;
pub mod frames;
pub mod overlay;
pub mod probe;

pub use audio::{apply_disclosure_speed, expected_narration_duration};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{concat_clips, mux_audio, strip_audio};
pub use error::{MediaError, MediaResult};
pub use frames::{extract_continuity_frame, extract_last_frame, generate_thumbnail, FrameResult};
pub use overlay::{burn_overlay, plan_overlay, OverlayPlan};
pub use probe::{get_duration, probe_media, MediaInfo};
