//! Export sink.
//!
//! The synthesizer runs as fast as frames arrive. Each frame becomes one
//! video sample and, when audio is enabled, one interleaved audio block made
//! by summing the frame's chunks. The first encoder error is latched: it is
//! returned once, later frames are ignored, and `finish` aborts the encoder.

use storyline_audio::AudioChunk;
use storyline_common::config::RenderDefaults;
use storyline_common::error::{StorylineError, StorylineResult};

use crate::encoder::{AudioEncoderConfig, EncoderConfig, MediaEncoder, VideoEncoderConfig};
use crate::sink::{Frame, FrameSink, SinkConfig, SinkOutput};

/// Encoding choices that are not part of the frame stream itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizerSettings {
    pub video_codec: String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    /// Frames between key frames.
    pub keyframe_interval: u32,
    pub audio_enabled: bool,
}

impl SynthesizerSettings {
    pub fn from_defaults(defaults: &RenderDefaults, fps: u32) -> Self {
        Self {
            video_codec: defaults.video_codec.clone(),
            video_bitrate_kbps: defaults.video_bitrate_kbps,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
            keyframe_interval: defaults.keyframe_interval_frames(fps),
            audio_enabled: true,
        }
    }

    pub fn without_audio(mut self) -> Self {
        self.audio_enabled = false;
        self
    }
}

/// Sum `chunks` into one interleaved block of `round(sample_rate / fps)` frames.
///
/// Chunks at another rate are resampled by nearest sample; channels a chunk
/// lacks contribute silence. The result is clamped to `[-1, 1]`.
pub fn mix_chunks(chunks: &[AudioChunk], sample_rate: u32, channels: u16, fps: u32) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let frames = (sample_rate as f64 / fps.max(1) as f64).round() as usize;
    let mut out = vec![0.0f32; frames * channels];

    for chunk in chunks {
        let buffer = &chunk.buffer;
        let ratio = buffer.sample_rate() as f64 / sample_rate.max(1) as f64;
        for ch in 0..channels {
            let Some(source) = buffer.channel(ch) else {
                continue;
            };
            if source.is_empty() {
                continue;
            }
            for i in 0..frames {
                let j = ((i as f64 * ratio).round() as usize).min(source.len() - 1);
                out[i * channels + ch] += source[j];
            }
        }
    }

    for sample in &mut out {
        *sample = sample.clamp(-1.0, 1.0);
    }
    out
}

/// Unthrottled sink feeding a [`MediaEncoder`].
pub struct Synthesizer {
    encoder: Box<dyn MediaEncoder>,
    settings: SynthesizerSettings,
    config: Option<SinkConfig>,
    failure: Option<String>,
    frames: u64,
}

impl Synthesizer {
    pub fn new(encoder: Box<dyn MediaEncoder>, settings: SynthesizerSettings) -> Self {
        Self {
            encoder,
            settings,
            config: None,
            failure: None,
            frames: 0,
        }
    }

    pub fn settings(&self) -> &SynthesizerSettings {
        &self.settings
    }

    /// Cause of the latched encoder failure, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn latch(&mut self, err: StorylineError) -> StorylineError {
        let cause = match err {
            StorylineError::Encode { cause } => cause,
            other => other.to_string(),
        };
        tracing::error!(cause = %cause, frames = self.frames, "Encoder failed, halting synthesis");
        self.failure = Some(cause.clone());
        StorylineError::encode(cause)
    }

    fn encoder_config(&self, config: &SinkConfig) -> EncoderConfig {
        EncoderConfig {
            video: VideoEncoderConfig {
                codec: self.settings.video_codec.clone(),
                width: config.width,
                height: config.height,
                fps: config.fps,
                bitrate_kbps: self.settings.video_bitrate_kbps,
                keyframe_interval: self.settings.keyframe_interval.max(1),
            },
            audio: self.settings.audio_enabled.then(|| AudioEncoderConfig {
                sample_rate: config.sample_rate,
                channels: config.channels,
                bitrate_kbps: self.settings.audio_bitrate_kbps,
            }),
        }
    }
}

#[async_trait::async_trait]
impl FrameSink for Synthesizer {
    fn name(&self) -> &str {
        "synthesizer"
    }

    async fn connect(&mut self, config: &SinkConfig) -> StorylineResult<()> {
        self.failure = None;
        self.frames = 0;
        let encoder_config = self.encoder_config(config);
        if let Err(err) = self.encoder.configure(&encoder_config).await {
            return Err(self.latch(err));
        }
        tracing::info!(
            total_frames = config.total_frames,
            keyframe_interval = encoder_config.video.keyframe_interval,
            audio = encoder_config.audio.is_some(),
            "Synthesis started"
        );
        self.config = Some(config.clone());
        Ok(())
    }

    async fn handle(&mut self, frame: Frame) -> StorylineResult<()> {
        if self.failure.is_some() {
            return Ok(());
        }
        let Some(config) = self.config.clone() else {
            return Err(self.latch(StorylineError::encode("synthesizer is not connected")));
        };

        let key_frame = frame.index % self.settings.keyframe_interval.max(1) as u64 == 0;
        if let Err(err) = self
            .encoder
            .encode_video(&frame.image, frame.timestamp, key_frame)
            .await
        {
            return Err(self.latch(err));
        }

        if self.settings.audio_enabled {
            let block = mix_chunks(&frame.audio, config.sample_rate, config.channels, config.fps);
            if let Err(err) = self.encoder.encode_audio(frame.timestamp, &block).await {
                return Err(self.latch(err));
            }
        }

        self.frames += 1;
        Ok(())
    }

    async fn finish(&mut self) -> StorylineResult<SinkOutput> {
        self.config = None;
        if self.failure.is_some() {
            self.encoder.abort().await;
            return Ok(SinkOutput::Aborted);
        }

        if let Err(err) = self.encoder.flush().await {
            let err = self.latch(err);
            self.encoder.abort().await;
            return Err(err);
        }
        match self.encoder.finalize().await {
            Ok(blob) => {
                tracing::info!(
                    frames = self.frames,
                    path = %blob.path.display(),
                    size_bytes = blob.size_bytes,
                    "Synthesis finished"
                );
                Ok(SinkOutput::Media(blob))
            }
            Err(err) => {
                let err = self.latch(err);
                self.encoder.abort().await;
                Err(err)
            }
        }
    }

    async fn disconnect(&mut self) -> StorylineResult<()> {
        if self.config.take().is_some() {
            self.encoder.abort().await;
        }
        Ok(())
    }
}
