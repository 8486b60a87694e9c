//! Check system capabilities.

use storyline_common::config::AppConfig;
use storyline_render_engine::is_ffmpeg_available;

pub async fn run() -> anyhow::Result<()> {
    println!("Storyline System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = is_ffmpeg_available().await;
    if ffmpeg {
        println!("[OK] ffmpeg found on PATH");
    } else {
        println!("[WARN] ffmpeg not found: export is unavailable, preview still works");
    }

    let config = AppConfig::load();
    println!("[OK] Output directory: {}", config.output_dir.display());
    println!(
        "[OK] Render defaults: {}x{} @ {}fps, {} @ {} kbps",
        config.render.width,
        config.render.height,
        config.render.fps,
        config.render.video_codec,
        config.render.video_bitrate_kbps
    );

    println!();
    if ffmpeg {
        println!("All capabilities are available. Storyline is ready.");
    } else {
        println!("Install ffmpeg to enable export.");
    }
    Ok(())
}
