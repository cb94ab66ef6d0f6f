//! Final video assembly: concat and audio mux.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Escape a path for an ffmpeg concat list entry.
///
/// Single quotes inside the path are closed, escaped, and reopened,
/// which is the quoting the concat demuxer expects.
fn concat_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Write the concat demuxer list file for a set of clips.
async fn write_concat_list(clips: &[PathBuf], list_path: &Path) -> MediaResult<()> {
    let mut contents = String::new();
    for clip in clips {
        contents.push_str(&concat_entry(clip));
        contents.push('\n');
    }
    tokio::fs::write(list_path, contents).await?;
    Ok(())
}

/// Concatenate scene clips in order using lossless stream copy.
///
/// Clips must share codec parameters, which holds for clips rendered by
/// the same provider model within one job.
pub async fn concat_clips(clips: &[PathBuf], output: impl AsRef<Path>) -> MediaResult<()> {
    if clips.is_empty() {
        return Err(MediaError::EmptyConcatList);
    }
    for clip in clips {
        if !clip.exists() {
            return Err(MediaError::FileNotFound(clip.clone()));
        }
    }

    let output = output.as_ref();
    let list_path = output.with_extension("concat.txt");
    write_concat_list(clips, &list_path).await?;

    let cmd = FfmpegCommand::new(output)
        .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
        .output_args(["-c", "copy"]);

    let result = FfmpegRunner::new().run(&cmd).await;
    tokio::fs::remove_file(&list_path).await.ok();
    result?;

    info!("Concatenated {} clips into {}", clips.len(), output.display());
    Ok(())
}

/// Mux narration and/or music tracks into a video.
///
/// The video stream is copied; audio is encoded to AAC and the output
/// is bounded by the shortest stream. With both tracks present they are
/// mixed, narration kept at full level over quieter music.
pub async fn mux_audio(
    video: impl AsRef<Path>,
    narration: Option<&Path>,
    music: Option<&Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let output = output.as_ref();

    let cmd = match (narration, music) {
        (Some(narration), Some(music)) => FfmpegCommand::new(output)
            .input(video)
            .input(narration)
            .input(music)
            .filter_complex(
                "[2:a]volume=0.25[bg];[1:a][bg]amix=inputs=2:duration=longest:normalize=0[aout]",
            )
            .output_args(["-map", "0:v", "-map", "[aout]"])
            .video_codec("copy")
            .audio_codec("aac")
            .output_arg("-shortest"),
        (Some(track), None) | (None, Some(track)) => FfmpegCommand::new(output)
            .input(video)
            .input(track)
            .output_args(["-map", "0:v", "-map", "1:a"])
            .video_codec("copy")
            .audio_codec("aac")
            .output_arg("-shortest"),
        (None, None) => {
            return Err(MediaError::InvalidMedia(
                "mux requested with no audio tracks".to_string(),
            ))
        }
    };

    FfmpegRunner::new().run(&cmd).await?;
    info!("Muxed audio into {}", output.display());
    Ok(())
}

/// Drop every audio stream from a video, copying the video stream.
///
/// Used when narration and music ship as separate deliverables and the
/// final video must carry no provider audio.
pub async fn strip_audio(video: impl AsRef<Path>, output: impl AsRef<Path>) -> MediaResult<()> {
    let video = video.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }

    let output = output.as_ref();
    let cmd = FfmpegCommand::new(output)
        .input(video)
        .output_arg("-an")
        .video_codec("copy");

    FfmpegRunner::new().run(&cmd).await?;
    info!("Stripped audio into {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_entry_escaping() {
        assert_eq!(concat_entry(Path::new("/tmp/a.mp4")), "file '/tmp/a.mp4'");
        assert_eq!(
            concat_entry(Path::new("/tmp/it's.mp4")),
            "file '/tmp/it'\\''s.mp4'"
        );
    }

    #[tokio::test]
    async fn test_concat_rejects_empty() {
        let err = concat_clips(&[], "/tmp/out.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::EmptyConcatList));
    }

    #[tokio::test]
    async fn test_concat_rejects_missing_clip() {
        let clips = vec![PathBuf::from("/nonexistent/scene-1.mp4")];
        let err = concat_clips(&clips, "/tmp/out.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_strip_audio_rejects_missing_video() {
        let err = strip_audio("/nonexistent/final.mp4", "/tmp/out.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_mux_requires_a_track() {
        let err = mux_audio("/tmp/v.mp4", None, None, "/tmp/out.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
    }
}
