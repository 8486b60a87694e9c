//! Frame sink contract shared by every consumer of a performance.

use image::RgbaImage;
use storyline_audio::AudioChunk;
use storyline_common::error::{StorylineError, StorylineResult};

use crate::encoder::MediaBlob;

/// One tick of output: the rendered image plus the tick's audio chunks.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Global frame index, starting at 0.
    pub index: u64,

    /// Frame time in seconds (`index / fps`).
    pub timestamp: f64,

    pub image: RgbaImage,

    /// Unmixed chunks, one per active sound, each exactly `1/fps` long.
    pub audio: Vec<AudioChunk>,
}

/// Stream parameters handed to a sink before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Expected length of the performance in seconds.
    pub duration_secs: f64,
    pub total_frames: u64,
}

/// Terminal result of a sink.
#[derive(Debug, Clone)]
pub enum SinkOutput {
    /// A live preview ran to its end.
    Preview { frames: u64 },
    /// An encoded media file.
    Media(MediaBlob),
    /// Frames captured in memory.
    Memory { frames: Vec<Frame> },
    /// The sink gave up after an earlier failure and produced nothing.
    Aborted,
}

impl SinkOutput {
    pub fn media(&self) -> Option<&MediaBlob> {
        match self {
            SinkOutput::Media(blob) => Some(blob),
            _ => None,
        }
    }
}

/// Consumer of the frame stream.
///
/// Ordering contract: `connect` once, then `handle` in strictly increasing
/// frame order, then `finish` exactly once, even when the run failed or was
/// cut short.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Sink name for logs.
    fn name(&self) -> &str;

    /// Prepare for a run.
    async fn connect(&mut self, config: &SinkConfig) -> StorylineResult<()>;

    /// Consume one frame.
    async fn handle(&mut self, frame: Frame) -> StorylineResult<()>;

    /// Release resources and produce the sink's terminal result.
    async fn finish(&mut self) -> StorylineResult<SinkOutput>;

    /// Detach from the director. Called when the sink is replaced.
    async fn disconnect(&mut self) -> StorylineResult<()> {
        Ok(())
    }
}

/// Sink that keeps every frame, for tests and tooling.
#[derive(Debug, Default)]
pub struct InMemorySink {
    config: Option<SinkConfig>,
    frames: Vec<Frame>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured by `connect`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.config.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

#[async_trait::async_trait]
impl FrameSink for InMemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&mut self, config: &SinkConfig) -> StorylineResult<()> {
        self.config = Some(config.clone());
        self.frames.clear();
        Ok(())
    }

    async fn handle(&mut self, frame: Frame) -> StorylineResult<()> {
        if self.config.is_none() {
            return Err(StorylineError::render("memory sink received a frame before connect"));
        }
        if let Some(last) = self.frames.last() {
            if frame.index <= last.index {
                return Err(StorylineError::render(format!(
                    "memory sink received out-of-order frame {} after {}",
                    frame.index, last.index
                )));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    async fn finish(&mut self) -> StorylineResult<SinkOutput> {
        self.config = None;
        Ok(SinkOutput::Memory {
            frames: std::mem::take(&mut self.frames),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SinkConfig {
        SinkConfig {
            width: 2,
            height: 2,
            fps: 10,
            sample_rate: 48_000,
            channels: 2,
            duration_secs: 1.0,
            total_frames: 10,
        }
    }

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            timestamp: index as f64 / 10.0,
            image: RgbaImage::new(2, 2),
            audio: vec![],
        }
    }

    #[tokio::test]
    async fn test_in_memory_sink_collects_frames() {
        let mut sink = InMemorySink::new();
        sink.connect(&config()).await.unwrap();
        sink.handle(frame(0)).await.unwrap();
        sink.handle(frame(1)).await.unwrap();
        assert_eq!(sink.frames().len(), 2);

        match sink.finish().await.unwrap() {
            SinkOutput::Memory { frames } => assert_eq!(frames.len(), 2),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_in_memory_sink_rejects_out_of_order() {
        let mut sink = InMemorySink::new();
        sink.connect(&config()).await.unwrap();
        sink.handle(frame(3)).await.unwrap();
        assert!(sink.handle(frame(3)).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_sink_requires_connect() {
        let mut sink = InMemorySink::new();
        assert!(sink.handle(frame(0)).await.is_err());
    }
}
