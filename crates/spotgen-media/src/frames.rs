//! Frame extraction: continuity seeds and thumbnails.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Outcome of a best-effort frame extraction.
///
/// Continuity extraction failing must not fail the scene; it degrades
/// to "no continuity seed for the next scene". The degraded case is an
/// explicit value so callers can observe and test it.
#[derive(Debug)]
pub enum FrameResult {
    /// Frame written to the given path.
    Extracted(PathBuf),
    /// Extraction failed; the reason is logged and carried along.
    Degraded(String),
}

impl FrameResult {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FrameResult::Degraded(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            FrameResult::Extracted(path) => Some(path),
            FrameResult::Degraded(_) => None,
        }
    }
}

/// Extract the last frame of a video as a JPEG.
///
/// Seeks to half a second before end-of-file and takes the final
/// decoded frame.
pub async fn extract_last_frame(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(output.as_ref())
        .input_with_args(["-sseof", "-0.5"], video.as_ref())
        .output_args(["-update", "1", "-q:v", "2"])
        .single_frame();

    FfmpegRunner::new().run(&cmd).await
}

/// Best-effort continuity frame extraction.
///
/// Never returns an error: any failure becomes `FrameResult::Degraded`
/// and the pipeline continues without a continuity seed.
pub async fn extract_continuity_frame(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> FrameResult {
    let output = output.as_ref();
    match extract_last_frame(video.as_ref(), output).await {
        Ok(()) if output.exists() => FrameResult::Extracted(output.to_path_buf()),
        Ok(()) => {
            warn!("Continuity frame missing after extraction");
            FrameResult::Degraded("ffmpeg produced no frame".to_string())
        }
        Err(e) => {
            warn!("Continuity frame extraction failed: {}", e);
            FrameResult::Degraded(e.to_string())
        }
    }
}

/// Generate a thumbnail from the start of a video.
pub async fn generate_thumbnail(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
    width: u32,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(output.as_ref())
        .input_with_args(["-ss", "0.5"], video.as_ref())
        .single_frame()
        .video_filter(format!("scale={}:-2", width));

    FfmpegRunner::new().run(&cmd).await
}
