//! Time-boxed text overlay.
//!
//! Burns a disclosure text block into the video, visible from a caller
//! start time to the end. Text is word-wrapped to a fraction of the
//! frame width; if the wrapped block exceeds a line threshold the font
//! size is reduced and the text rewrapped.

use std::path::Path;

use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Fraction of the frame width the text block may occupy.
const TEXT_WIDTH_FRACTION: f64 = 0.9;

/// Approximate glyph width as a fraction of the font size.
const GLYPH_WIDTH_FACTOR: f64 = 0.55;

/// Default and reduced font sizes (pixels).
const FONT_SIZE: u32 = 36;
const REDUCED_FONT_SIZE: u32 = 26;

/// Wrapped blocks taller than this many lines trigger the reduced size.
const MAX_LINES_AT_FULL_SIZE: usize = 4;

/// Font fallback chain, first existing path wins.
const FONT_FALLBACKS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
];

/// A resolved overlay: wrapped lines and the chosen font size.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlan {
    pub lines: Vec<String>,
    pub font_size: u32,
}

/// Greedy word wrap to a maximum character count per line.
///
/// Words longer than the limit get a line of their own rather than
/// being split mid-word.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Characters that fit on one line at a given frame width and font size.
fn max_chars_for(frame_width: u32, font_size: u32) -> usize {
    let usable = frame_width as f64 * TEXT_WIDTH_FRACTION;
    let glyph = font_size as f64 * GLYPH_WIDTH_FACTOR;
    (usable / glyph).floor().max(1.0) as usize
}

/// Plan the overlay for a frame width: wrap at the full size, drop to
/// the reduced size when the block gets too tall.
pub fn plan_overlay(text: &str, frame_width: u32) -> OverlayPlan {
    let lines = wrap_text(text, max_chars_for(frame_width, FONT_SIZE));
    if lines.len() <= MAX_LINES_AT_FULL_SIZE {
        return OverlayPlan {
            lines,
            font_size: FONT_SIZE,
        };
    }
    OverlayPlan {
        lines: wrap_text(text, max_chars_for(frame_width, REDUCED_FONT_SIZE)),
        font_size: REDUCED_FONT_SIZE,
    }
}

/// Escape text for use inside a drawtext filter argument.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
        .replace('%', "\\%")
}

/// Resolve the first available font from the fallback chain. An
/// explicit `OVERLAY_FONT` env var takes priority.
fn resolve_font() -> MediaResult<String> {
    if let Ok(font) = std::env::var("OVERLAY_FONT") {
        if Path::new(&font).exists() {
            return Ok(font);
        }
    }
    for candidate in FONT_FALLBACKS {
        if Path::new(candidate).exists() {
            debug!(font = candidate, "Resolved overlay font");
            return Ok(candidate.to_string());
        }
    }
    Err(MediaError::NoFontAvailable)
}

/// Build the drawtext filter chain for a plan: one drawtext per line,
/// stacked from ~78% of frame height, visible from `start_secs` onward.
pub fn build_drawtext_filter(plan: &OverlayPlan, font: &str, start_secs: f64) -> String {
    let line_height = plan.font_size + plan.font_size / 3;
    plan.lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "drawtext=fontfile={}:text='{}':fontsize={}:fontcolor=white:\
                 box=1:boxcolor=black@0.55:boxborderw=8:\
                 x=(w-text_w)/2:y=h*0.78+{}:enable='gte(t,{:.3})'",
                font,
                escape_drawtext(line),
                plan.font_size,
                i as u32 * line_height,
                start_secs
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Burn a time-boxed overlay into a video.
///
/// Re-encodes the video stream (burn-in requires it) and copies audio.
pub async fn burn_overlay(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    text: &str,
    start_secs: f64,
    frame_width: u32,
) -> MediaResult<()> {
    let plan = plan_overlay(text, frame_width);
    let font = resolve_font()?;
    let filter = build_drawtext_filter(&plan, &font, start_secs);

    let cmd = FfmpegCommand::new(output.as_ref())
        .input(input.as_ref())
        .video_filter(filter)
        .video_codec("libx264")
        .output_args(["-crf", "23", "-preset", "veryfast"])
        .audio_codec("copy");

    FfmpegRunner::new().run(&cmd).await
}
