//! Show screenplay information.

use std::path::PathBuf;

use storyline_common::config::AppConfig;

pub async fn run(
    path: PathBuf,
    assets: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let screenplay = super::load_screenplay(&path, &config.render)?;
    let c = &screenplay.config;

    println!("Screenplay: {}", screenplay.name);
    println!("  Version: {}", screenplay.version);
    println!("  Created: {}", screenplay.created_at);
    println!();

    println!("Config:");
    println!("  Canvas: {}x{} @ {}fps", c.width, c.height, c.fps);
    println!("  Background: {}", c.background);
    println!("  Audio: {} Hz, {} channel(s)", c.sample_rate, c.channels);
    println!();

    println!("Scenes: {}", screenplay.scenes.len());
    for scene in &screenplay.scenes {
        println!(
            "  {}: {} nodes, {} directives",
            scene.name,
            scene.root.walk().len(),
            scene.directives.len()
        );
    }
    println!("  Total directives: {}", screenplay.directive_count());
    println!();

    let director = super::director(&screenplay, super::asset_root(&path, assets))?;
    match director.compile(&screenplay).await {
        Ok(schedule) => {
            println!("Timing:");
            for scene in &schedule.scenes {
                println!(
                    "  {}: {:.2}s -> {:.2}s ({} frames)",
                    scene.name,
                    scene.start,
                    scene.end,
                    scene.frame_count()
                );
            }
            println!(
                "  Total: {:.2}s, {} frames, {} subtitle line(s)",
                schedule.duration,
                schedule.total_frames,
                schedule.subtitles.len()
            );
        }
        Err(e) => println!("Timing unavailable: {e}"),
    }

    Ok(())
}
