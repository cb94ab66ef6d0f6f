//! Narration post-processing.
//!
//! The narration is synthesized once at baseline speed; the trailing
//! disclosure segment is then sped up by a fixed rate in the time
//! domain (atempo) and the two segments concatenated back together.

use std::path::Path;

use tracing::warn;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::get_duration;

/// Acceptable drift between the predicted and probed output duration.
const DURATION_TOLERANCE_SECS: f64 = 0.5;

/// Expected output duration after the disclosure speed transform:
/// `start + (total - start) / speed`.
pub fn expected_narration_duration(total_secs: f64, disclosure_start: f64, speed: f64) -> f64 {
    let start = disclosure_start.clamp(0.0, total_secs);
    start + (total_secs - start) / speed
}

fn duration_matches_expected(
    total_secs: f64,
    actual_secs: f64,
    disclosure_start: f64,
    speed: f64,
) -> bool {
    let expected = expected_narration_duration(total_secs, disclosure_start, speed);
    (actual_secs - expected).abs() <= DURATION_TOLERANCE_SECS
}

/// Break a speed factor into atempo stages within ffmpeg's accepted
/// per-filter range of 0.5..=2.0.
fn atempo_chain(speed: f64) -> String {
    let mut remaining = speed;
    let mut stages = Vec::new();
    while remaining > 2.0 {
        stages.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    stages.push(format!("atempo={:.4}", remaining));
    stages.join(",")
}

/// Build the filter graph: main segment at 1.0x, tail at `speed`,
/// concatenated in order.
fn build_disclosure_filter(disclosure_start: f64, speed: f64) -> String {
    format!(
        "[0:a]atrim=0:{start:.3},asetpts=PTS-STARTPTS[main];\
         [0:a]atrim={start:.3},asetpts=PTS-STARTPTS,{tempo}[tail];\
         [main][tail]concat=n=2:v=0:a=1[out]",
        start = disclosure_start,
        tempo = atempo_chain(speed),
    )
}

/// Apply the disclosure speed transform to a narration track.
///
/// Everything before `disclosure_start` plays at 1.0x; everything
/// after plays at `speed`. The transform is deterministic: the same
/// inputs produce the same output.
pub async fn apply_disclosure_speed(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    disclosure_start: f64,
    speed: f64,
) -> MediaResult<()> {
    if speed <= 0.0 {
        return Err(MediaError::InvalidMedia(format!(
            "invalid disclosure speed {}",
            speed
        )));
    }
    if disclosure_start < 0.0 {
        return Err(MediaError::InvalidMedia(format!(
            "invalid disclosure start {}",
            disclosure_start
        )));
    }

    let cmd = FfmpegCommand::new(output.as_ref())
        .input(input.as_ref())
        .filter_complex(build_disclosure_filter(disclosure_start, speed))
        .output_args(["-map", "[out]"])
        .audio_codec("libmp3lame")
        .output_args(["-q:a", "2"]);

    FfmpegRunner::new().run(&cmd).await?;
    verify_output_duration(input.as_ref(), output.as_ref(), disclosure_start, speed).await;
    Ok(())
}

/// Best-effort sanity probe of the transformed track. A drift beyond
/// tolerance means the atempo graph did not do what the timestamps
/// claim; the track is still usable, so this only warns.
async fn verify_output_duration(input: &Path, output: &Path, disclosure_start: f64, speed: f64) {
    let (Ok(total), Ok(actual)) = (get_duration(input).await, get_duration(output).await) else {
        return;
    };
    if !duration_matches_expected(total, actual, disclosure_start, speed) {
        warn!(
            input_secs = total,
            output_secs = actual,
            disclosure_start,
            speed,
            "Narration duration drifted from the expected split"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_duration() {
        // 30s narration, disclosure at 24s, 1.4x tail
        let d = expected_narration_duration(30.0, 24.0, 1.4);
        assert!((d - 28.2857).abs() < 0.001, "got {}", d);
    }

    #[test]
    fn test_expected_duration_clamps_start() {
        assert!((expected_narration_duration(10.0, 15.0, 1.4) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duration_match_tolerance() {
        // 30s in, disclosure at 24s, 1.4x tail: expected 28.2857s
        assert!(duration_matches_expected(30.0, 28.29, 24.0, 1.4));
        assert!(duration_matches_expected(30.0, 28.0, 24.0, 1.4));
        // a track that never sped up drifts past tolerance
        assert!(!duration_matches_expected(30.0, 30.0, 24.0, 1.4));
    }

    #[test]
    fn test_atempo_chain_simple() {
        assert_eq!(atempo_chain(1.4), "atempo=1.4000");
    }

    #[test]
    fn test_atempo_chain_above_two() {
        assert_eq!(atempo_chain(3.0), "atempo=2.0,atempo=1.5000");
    }

    #[test]
    fn test_disclosure_filter_shape() {
        let filter = build_disclosure_filter(24.0, 1.4);
        assert!(filter.contains("atrim=0:24.000"));
        assert!(filter.contains("atrim=24.000"));
        assert!(filter.contains("atempo=1.4000"));
        assert!(filter.contains("concat=n=2:v=0:a=1"));
    }

    #[tokio::test]
    async fn test_rejects_bad_speed() {
        let err = apply_disclosure_speed("/tmp/in.mp3", "/tmp/out.mp3", 24.0, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
    }
}
