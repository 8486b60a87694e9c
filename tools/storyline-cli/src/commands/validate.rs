//! Validate a screenplay.

use std::path::PathBuf;

use storyline_common::config::AppConfig;

pub async fn run(
    path: PathBuf,
    assets: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Validating screenplay at: {}", path.display());

    let screenplay = super::load_screenplay(&path, &config.render)?;
    println!("  Name: {}", screenplay.name);
    println!("  Version: {}", screenplay.version);
    println!(
        "  Canvas: {}x{} @ {}fps",
        screenplay.config.width, screenplay.config.height, screenplay.config.fps
    );

    let issues = screenplay.validate();
    if !issues.is_empty() {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        anyhow::bail!("{} issue(s) found", issues.len());
    }

    let director = super::director(&screenplay, super::asset_root(&path, assets))?;
    let schedule = director.compile(&screenplay).await?;

    println!("\nScenes:");
    for scene in &schedule.scenes {
        println!(
            "  {}: {:.2}s ({} directives, frames {}..{})",
            scene.name,
            scene.duration(),
            scene.directives.len(),
            scene.first_frame,
            scene.end_frame
        );
    }
    println!(
        "\nScreenplay is valid: {:.2}s, {} frames.",
        schedule.duration, schedule.total_frames
    );
    Ok(())
}
