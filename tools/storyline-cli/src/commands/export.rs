//! Export a screenplay to video.

use std::io::Write;
use std::path::PathBuf;

use storyline_common::config::AppConfig;
use storyline_render_engine::{is_ffmpeg_available, FfmpegEncoder, Synthesizer, SynthesizerSettings};
use storyline_screenplay::save_subtitles;

pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    no_audio: bool,
    subtitles: Option<PathBuf>,
    assets: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Exporting screenplay at: {}", path.display());

    let screenplay = super::load_screenplay(&path, &config.render)?;
    if !is_ffmpeg_available().await {
        anyhow::bail!("ffmpeg was not found on PATH; install it to export video");
    }

    let output_path =
        output.unwrap_or_else(|| config.output_dir.join(format!("{}.mp4", screenplay.name)));
    let mut settings = SynthesizerSettings::from_defaults(&config.render, screenplay.config.fps);
    if no_audio {
        settings = settings.without_audio();
    }

    println!("  Output: {}", output_path.display());
    println!(
        "  Video: {} @ {} kbps, {}x{} @ {}fps",
        settings.video_codec,
        settings.video_bitrate_kbps,
        screenplay.config.width,
        screenplay.config.height,
        screenplay.config.fps
    );
    if settings.audio_enabled {
        println!("  Audio: aac @ {} kbps", settings.audio_bitrate_kbps);
    } else {
        println!("  Audio: disabled");
    }

    let mut director = super::director(&screenplay, super::asset_root(&path, assets))?;
    let encoder = FfmpegEncoder::new(&output_path);
    director
        .connect(Box::new(Synthesizer::new(Box::new(encoder), settings)))
        .await?;
    director.on_progress(|p| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames)  ",
            p.percent,
            p.frame + 1,
            p.total_frames
        );
        std::io::stdout().flush().ok();
    });
    super::cut_on_interrupt(director.cut_handle());

    let performance = match director.action(&screenplay).await {
        Ok(performance) => performance,
        Err(e) => {
            println!("\nExport failed: {e}");
            return Err(e.into());
        }
    };

    match performance.result.as_ref().and_then(|r| r.media()) {
        Some(blob) if performance.completed => {
            println!(
                "\nExport complete: {} ({} bytes)",
                blob.path.display(),
                blob.size_bytes
            );
        }
        Some(blob) => {
            println!(
                "\nExport stopped after {} frames; partial output at {}",
                performance.frames_rendered,
                blob.path.display()
            );
        }
        None => println!("\nExport produced no output"),
    }

    if let Some(subtitle_path) = subtitles {
        save_subtitles(&performance.subtitles, &subtitle_path)?;
        println!(
            "  Subtitles: {} ({} lines)",
            subtitle_path.display(),
            performance.subtitles.len()
        );
    }

    Ok(())
}
