pub mod check;
pub mod export;
pub mod info;
pub mod preview;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyline_common::config::RenderDefaults;
use storyline_director::{CutHandle, Director, FsAssetLoader};
use storyline_screenplay::Screenplay;
use storyline_stage::FlatRenderer;

/// Load a screenplay; config fields it omits come from the render defaults.
pub fn load_screenplay(path: &Path, defaults: &RenderDefaults) -> anyhow::Result<Screenplay> {
    Screenplay::load_with_defaults(path, defaults)
        .map_err(|e| anyhow::anyhow!("Failed to load screenplay: {e}"))
}

/// Assets resolve relative to the screenplay file unless overridden.
pub fn asset_root(path: &Path, assets: Option<PathBuf>) -> PathBuf {
    assets.unwrap_or_else(|| {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Director with a software renderer sized to the screenplay canvas.
pub fn director(screenplay: &Screenplay, assets: PathBuf) -> anyhow::Result<Director> {
    let config = &screenplay.config;
    let renderer = FlatRenderer::with_background(config.width, config.height, &config.background)?;
    Ok(Director::new(
        Box::new(renderer),
        Arc::new(FsAssetLoader::new(assets)),
    ))
}

/// Cut the performance on Ctrl-C.
pub fn cut_on_interrupt(handle: CutHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping at the next frame");
            handle.cut();
        }
    });
}
