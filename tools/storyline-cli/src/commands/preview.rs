//! Real-time headless preview.

use std::io::Write;
use std::path::PathBuf;

use storyline_common::config::AppConfig;
use storyline_render_engine::{Previewer, SinkOutput};

pub async fn run(
    path: PathBuf,
    assets: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let screenplay = super::load_screenplay(&path, &config.render)?;
    println!("Previewing: {}", screenplay.name);

    let mut director = super::director(&screenplay, super::asset_root(&path, assets))?;
    director.connect(Box::new(Previewer::headless())).await?;
    director.on_progress(|p| {
        print!(
            "\r  {:.1}s / {:.1}s ({:.0}%)  ",
            p.current_time, p.duration, p.percent
        );
        std::io::stdout().flush().ok();
    });
    super::cut_on_interrupt(director.cut_handle());

    let performance = director.action(&screenplay).await?;
    let frames = match performance.result {
        Some(SinkOutput::Preview { frames }) => frames,
        _ => performance.frames_rendered,
    };
    if performance.completed {
        println!("\nPreview finished: {frames} frames");
    } else {
        println!("\nPreview stopped after {frames} frames");
    }
    Ok(())
}
