//! Asset loading for directives and sprite sources.
//!
//! Directives name assets by key (a path relative to the asset root). Keys
//! are resolved once at compile time, so nothing touches the disk while
//! frames are being produced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use storyline_audio::{decode_wav, AudioBuffer};
use storyline_common::error::{StorylineError, StorylineResult};
use storyline_stage::{FrameSequenceSource, RenderableSource, StillImageSource};

/// Resolves asset keys into decoded media.
#[async_trait::async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load_sound(&self, key: &str) -> StorylineResult<Arc<AudioBuffer>>;

    async fn load_source(&self, key: &str) -> StorylineResult<Arc<dyn RenderableSource>>;
}

/// Loads WAV sounds and PNG/JPEG images from a directory tree.
///
/// A key naming a directory becomes a looping frame sequence of the images
/// inside it, in file name order. Decoded assets are cached by key.
pub struct FsAssetLoader {
    root: PathBuf,
    sequence_fps: f64,
    sounds: Mutex<HashMap<String, Arc<AudioBuffer>>>,
    sources: Mutex<HashMap<String, Arc<dyn RenderableSource>>>,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence_fps: 12.0,
            sounds: Mutex::new(HashMap::new()),
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Playback rate of directory frame sequences.
    pub fn with_sequence_fps(mut self, fps: f64) -> Self {
        self.sequence_fps = fps;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let path = Path::new(key);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

async fn read_asset(key: &str, path: &Path) -> StorylineResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| StorylineError::resource_load(key, format!("{}: {e}", path.display())))
}

fn decode_image(key: &str, bytes: &[u8]) -> StorylineResult<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| StorylineError::resource_load(key, format!("invalid image: {e}")))
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl AssetLoader for FsAssetLoader {
    async fn load_sound(&self, key: &str) -> StorylineResult<Arc<AudioBuffer>> {
        let cached = self
            .sounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let path = self.resolve(key);
        let bytes = read_asset(key, &path).await?;
        let owned_key = key.to_string();
        let buffer = tokio::task::spawn_blocking(move || {
            decode_wav(&bytes).map_err(|e| StorylineError::resource_load(owned_key, e.to_string()))
        })
        .await
        .map_err(|e| StorylineError::resource_load(key, format!("decode task failed: {e}")))??;

        tracing::debug!(
            key,
            duration_secs = buffer.duration_secs(),
            channels = buffer.channel_count(),
            "Loaded sound"
        );
        let buffer = Arc::new(buffer);
        self.sounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::clone(&buffer));
        Ok(buffer)
    }

    async fn load_source(&self, key: &str) -> StorylineResult<Arc<dyn RenderableSource>> {
        let cached = self
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let path = self.resolve(key);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorylineError::resource_load(key, format!("{}: {e}", path.display())))?;

        let source: Arc<dyn RenderableSource> = if meta.is_dir() {
            let mut entries = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| StorylineError::resource_load(key, e.to_string()))?;
            let mut files = vec![];
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorylineError::resource_load(key, e.to_string()))?
            {
                let file = entry.path();
                if is_image_file(&file) {
                    files.push(file);
                }
            }
            files.sort();
            if files.is_empty() {
                return Err(StorylineError::resource_load(key, "directory contains no images"));
            }

            let mut frames = Vec::with_capacity(files.len());
            for file in &files {
                let bytes = read_asset(key, file).await?;
                frames.push(decode_image(key, &bytes)?);
            }
            tracing::debug!(key, frames = frames.len(), "Loaded frame sequence");
            Arc::new(FrameSequenceSource::new(frames, self.sequence_fps, true))
        } else {
            let bytes = read_asset(key, &path).await?;
            let owned_key = key.to_string();
            let image = tokio::task::spawn_blocking(move || decode_image(&owned_key, &bytes))
                .await
                .map_err(|e| StorylineError::resource_load(key, format!("decode task failed: {e}")))??;
            tracing::debug!(key, width = image.width(), height = image.height(), "Loaded image");
            Arc::new(StillImageSource::new(image))
        };

        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::clone(&source));
        Ok(source)
    }
}

/// In-memory asset table, for tests and generated content.
#[derive(Default)]
pub struct MemoryAssetLoader {
    sounds: HashMap<String, Arc<AudioBuffer>>,
    sources: HashMap<String, Arc<dyn RenderableSource>>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sound(mut self, key: impl Into<String>, buffer: AudioBuffer) -> Self {
        self.sounds.insert(key.into(), Arc::new(buffer));
        self
    }

    pub fn with_source(mut self, key: impl Into<String>, source: Arc<dyn RenderableSource>) -> Self {
        self.sources.insert(key.into(), source);
        self
    }
}

#[async_trait::async_trait]
impl AssetLoader for MemoryAssetLoader {
    async fn load_sound(&self, key: &str) -> StorylineResult<Arc<AudioBuffer>> {
        self.sounds
            .get(key)
            .cloned()
            .ok_or_else(|| StorylineError::resource_load(key, "no such sound"))
    }

    async fn load_source(&self, key: &str) -> StorylineResult<Arc<dyn RenderableSource>> {
        self.sources
            .get(key)
            .cloned()
            .ok_or_else(|| StorylineError::resource_load(key, "no such image source"))
    }
}
