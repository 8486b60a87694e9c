//! Live preview sink.
//!
//! The previewer shows frames at real-time pace. Each audio chunk is routed
//! to a live playback node keyed by its source sound, so a sound that plays
//! across many frames keeps one node; when a sound stops producing chunks
//! its node is released.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use image::RgbaImage;
use storyline_audio::AudioBuffer;
use storyline_common::clock::FrameBudget;
use storyline_common::error::{StorylineError, StorylineResult};

use crate::sink::{Frame, FrameSink, SinkConfig, SinkOutput};

/// Display target of the previewer.
pub trait PreviewSurface: Send {
    fn present(&mut self, index: u64, image: &RgbaImage) -> StorylineResult<()>;

    fn close(&mut self) -> StorylineResult<()> {
        Ok(())
    }
}

/// Handle of a live playback node on an [`AudioOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioNodeId(pub u64);

/// Live audio device.
pub trait AudioOutput: Send {
    /// Open a playback node for a sound.
    fn create_node(&mut self, source: &str) -> StorylineResult<AudioNodeId>;

    /// Queue `buffer` on `node`, starting at performance time `at`.
    fn schedule(&mut self, node: AudioNodeId, at: f64, buffer: &AudioBuffer) -> StorylineResult<()>;

    fn release(&mut self, node: AudioNodeId) -> StorylineResult<()>;

    fn close(&mut self) -> StorylineResult<()>;
}

/// Surface that only remembers the last frame it was shown.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    last: Option<RgbaImage>,
    presented: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.last.as_ref()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl PreviewSurface for HeadlessSurface {
    fn present(&mut self, _index: u64, image: &RgbaImage) -> StorylineResult<()> {
        self.last = Some(image.clone());
        self.presented += 1;
        Ok(())
    }
}

/// Audio output that discards everything but keeps node bookkeeping honest.
#[derive(Debug, Default)]
pub struct NullAudioOutput {
    next_id: u64,
    live: HashSet<AudioNodeId>,
    closed: bool,
}

impl NullAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_nodes(&self) -> usize {
        self.live.len()
    }
}

impl AudioOutput for NullAudioOutput {
    fn create_node(&mut self, _source: &str) -> StorylineResult<AudioNodeId> {
        if self.closed {
            return Err(StorylineError::audio("audio output is closed"));
        }
        let id = AudioNodeId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        Ok(id)
    }

    fn schedule(&mut self, node: AudioNodeId, _at: f64, _buffer: &AudioBuffer) -> StorylineResult<()> {
        if !self.live.contains(&node) {
            return Err(StorylineError::audio(format!("unknown audio node {}", node.0)));
        }
        Ok(())
    }

    fn release(&mut self, node: AudioNodeId) -> StorylineResult<()> {
        self.live.remove(&node);
        Ok(())
    }

    fn close(&mut self) -> StorylineResult<()> {
        self.live.clear();
        self.closed = true;
        Ok(())
    }
}

/// Throttled sink driving a [`PreviewSurface`] and an [`AudioOutput`].
pub struct Previewer {
    surface: Box<dyn PreviewSurface>,
    audio: Box<dyn AudioOutput>,
    nodes: HashMap<String, AudioNodeId>,
    budget: Option<FrameBudget>,
    throttle: bool,
    frames: u64,
}

impl Previewer {
    pub fn new(surface: Box<dyn PreviewSurface>, audio: Box<dyn AudioOutput>) -> Self {
        Self {
            surface,
            audio,
            nodes: HashMap::new(),
            budget: None,
            throttle: true,
            frames: 0,
        }
    }

    /// Previewer with no display and no audio device.
    pub fn headless() -> Self {
        Self::new(Box::new(HeadlessSurface::new()), Box::new(NullAudioOutput::new()))
    }

    /// Disable real-time pacing.
    pub fn unthrottled(mut self) -> Self {
        self.throttle = false;
        self
    }

    /// Sounds that currently own a live node.
    pub fn live_sounds(&self) -> Vec<&str> {
        let mut sounds: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        sounds.sort_unstable();
        sounds
    }

    fn route_audio(&mut self, frame: &Frame) -> StorylineResult<()> {
        let mut heard = HashSet::new();
        for chunk in &frame.audio {
            let node = match self.nodes.get(&chunk.source) {
                Some(node) => *node,
                None => {
                    let node = self.audio.create_node(&chunk.source)?;
                    tracing::debug!(sound = %chunk.source, node = node.0, "Opened preview audio node");
                    self.nodes.insert(chunk.source.clone(), node);
                    node
                }
            };
            self.audio.schedule(node, chunk.timestamp, &chunk.buffer)?;
            heard.insert(chunk.source.as_str());
        }

        let silent: Vec<String> = self
            .nodes
            .keys()
            .filter(|sound| !heard.contains(sound.as_str()))
            .cloned()
            .collect();
        for sound in silent {
            if let Some(node) = self.nodes.remove(&sound) {
                tracing::debug!(sound = %sound, node = node.0, "Released preview audio node");
                self.audio.release(node)?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FrameSink for Previewer {
    fn name(&self) -> &str {
        "preview"
    }

    async fn connect(&mut self, config: &SinkConfig) -> StorylineResult<()> {
        self.budget = Some(FrameBudget::new(config.fps));
        self.frames = 0;
        tracing::info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            total_frames = config.total_frames,
            "Preview started"
        );
        Ok(())
    }

    async fn handle(&mut self, frame: Frame) -> StorylineResult<()> {
        let started = Instant::now();

        self.surface.present(frame.index, &frame.image)?;
        self.route_audio(&frame)?;
        self.frames += 1;

        if self.throttle {
            if let Some(budget) = self.budget {
                let remaining = budget.remaining(started.elapsed());
                if !remaining.is_zero() {
                    tokio::time::sleep(remaining).await;
                }
            }
        }
        Ok(())
    }

    async fn finish(&mut self) -> StorylineResult<SinkOutput> {
        for (_, node) in self.nodes.drain() {
            self.audio.release(node)?;
        }
        self.audio.close()?;
        self.surface.close()?;
        self.budget = None;
        tracing::info!(frames = self.frames, "Preview finished");
        Ok(SinkOutput::Preview {
            frames: self.frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use storyline_audio::AudioChunk;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Create(String),
        Schedule(u64),
        Release(u64),
        Close,
    }

    #[derive(Clone, Default)]
    struct RecordingOutput {
        events: Arc<Mutex<Vec<Event>>>,
        next: u64,
    }

    impl AudioOutput for RecordingOutput {
        fn create_node(&mut self, source: &str) -> StorylineResult<AudioNodeId> {
            self.events.lock().unwrap().push(Event::Create(source.to_string()));
            self.next += 1;
            Ok(AudioNodeId(self.next))
        }

        fn schedule(&mut self, node: AudioNodeId, _at: f64, _buffer: &AudioBuffer) -> StorylineResult<()> {
            self.events.lock().unwrap().push(Event::Schedule(node.0));
            Ok(())
        }

        fn release(&mut self, node: AudioNodeId) -> StorylineResult<()> {
            self.events.lock().unwrap().push(Event::Release(node.0));
            Ok(())
        }

        fn close(&mut self) -> StorylineResult<()> {
            self.events.lock().unwrap().push(Event::Close);
            Ok(())
        }
    }

    fn config(fps: u32) -> SinkConfig {
        SinkConfig {
            width: 2,
            height: 2,
            fps,
            sample_rate: 100,
            channels: 1,
            duration_secs: 1.0,
            total_frames: fps as u64,
        }
    }

    fn frame(index: u64, sounds: &[&str]) -> Frame {
        Frame {
            index,
            timestamp: index as f64 / 10.0,
            image: RgbaImage::new(2, 2),
            audio: sounds
                .iter()
                .map(|s| AudioChunk {
                    source: s.to_string(),
                    timestamp: index as f64 / 10.0,
                    buffer: AudioBuffer::silent(100, 1, 10),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_nodes_reused_and_retired() {
        let output = RecordingOutput::default();
        let events = Arc::clone(&output.events);
        let mut previewer =
            Previewer::new(Box::new(HeadlessSurface::new()), Box::new(output)).unthrottled();
        previewer.connect(&config(10)).await.unwrap();

        previewer.handle(frame(0, &["bgm", "voice"])).await.unwrap();
        previewer.handle(frame(1, &["bgm"])).await.unwrap();
        assert_eq!(previewer.live_sounds(), vec!["bgm"]);

        let out = previewer.finish().await.unwrap();
        assert!(matches!(out, SinkOutput::Preview { frames: 2 }));

        let events = events.lock().unwrap().clone();
        let creates = events.iter().filter(|e| matches!(e, Event::Create(_))).count();
        assert_eq!(creates, 2, "bgm node must be reused: {events:?}");
        assert_eq!(events.iter().filter(|e| matches!(e, Event::Release(_))).count(), 2);
        assert_eq!(events.last(), Some(&Event::Close));
    }

    #[tokio::test]
    async fn test_throttles_to_frame_budget() {
        let mut previewer = Previewer::headless();
        previewer.connect(&config(20)).await.unwrap();

        let started = Instant::now();
        previewer.handle(frame(0, &[])).await.unwrap();
        previewer.handle(frame(1, &[])).await.unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_unthrottled_preview_counts_frames() {
        let mut previewer = Previewer::headless().unthrottled();
        previewer.connect(&config(1)).await.unwrap();
        for i in 0..3 {
            previewer.handle(frame(i, &["a"])).await.unwrap();
        }
        assert!(matches!(
            previewer.finish().await.unwrap(),
            SinkOutput::Preview { frames: 3 }
        ));
    }
}
