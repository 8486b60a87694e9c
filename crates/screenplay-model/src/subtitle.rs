//! Subtitle tracks in SRT and VTT formats.

use serde::{Deserialize, Serialize};
use storyline_common::error::StorylineResult;

/// One timed line of dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
}

/// Cues with text and a positive span; blank speak lines are not written.
fn visible(subtitles: &[Subtitle]) -> impl Iterator<Item = &Subtitle> {
    subtitles
        .iter()
        .filter(|s| !s.text.trim().is_empty() && s.end > s.start)
}

/// Generate SRT subtitle content.
pub fn generate_srt(subtitles: &[Subtitle]) -> String {
    let mut output = String::new();

    for (i, subtitle) in visible(subtitles).enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(subtitle.start),
            format_srt_time(subtitle.end),
        ));
        output.push_str(&subtitle.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content.
pub fn generate_vtt(subtitles: &[Subtitle]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for subtitle in visible(subtitles) {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(subtitle.start),
            format_vtt_time(subtitle.end),
        ));
        output.push_str(&subtitle.text);
        output.push_str("\n\n");
    }

    output
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(secs: f64) -> String {
    let (h, m, s, ms) = split_time(secs);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
fn format_vtt_time(secs: f64) -> String {
    let (h, m, s, ms) = split_time(secs);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

fn split_time(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

/// Save subtitles to a file; `.vtt` selects WebVTT, anything else SRT.
pub fn save_subtitles(subtitles: &[Subtitle], path: &std::path::Path) -> StorylineResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(subtitles),
        _ => generate_srt(subtitles),
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}
