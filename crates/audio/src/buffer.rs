//! Planar PCM buffers and the slicing primitive.

use storyline_common::error::{StorylineError, StorylineResult};

/// Decoded audio, one `Vec<f32>` per channel, samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

/// One frame's worth of audio from a single sound.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Name of the sound this chunk was cut from.
    pub source: String,

    /// Frame time the chunk belongs to (seconds).
    pub timestamp: f64,

    pub buffer: AudioBuffer,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data. Shorter channels are padded with silence.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(frames, 0.0);
        }
        Self {
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    /// A silent buffer of `frames` samples per channel.
    pub fn silent(sample_rate: u32, channels: usize, frames: usize) -> Self {
        Self::new(sample_rate, vec![vec![0.0; frames]; channels])
    }

    /// Split interleaved samples into planar channels.
    pub fn from_interleaved(sample_rate: u32, channels: usize, samples: &[f32]) -> Self {
        let channels = channels.max(1);
        let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
        for (i, sample) in samples.iter().enumerate() {
            planar[i % channels].push(*sample);
        }
        Self::new(sample_rate, planar)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Copy exactly `round(sample_rate * duration)` samples per output channel,
    /// starting at `floor(start_offset * sample_rate)`.
    ///
    /// Samples past the end of the buffer and channels the buffer does not
    /// have are zero-filled, so the result always has the requested length.
    pub fn slice(&self, start_offset: f64, duration: f64, out_channels: usize) -> AudioBuffer {
        let rate = self.sample_rate as f64;
        let len = (rate * duration.max(0.0)).round() as usize;
        let start = (start_offset.max(0.0) * rate).floor() as usize;

        let channels = (0..out_channels)
            .map(|ch| {
                let mut out = vec![0.0f32; len];
                if let Some(src) = self.channels.get(ch) {
                    if start < src.len() {
                        let available = (src.len() - start).min(len);
                        out[..available].copy_from_slice(&src[start..start + available]);
                    }
                }
                out
            })
            .collect();

        AudioBuffer {
            sample_rate: self.sample_rate,
            channels,
        }
    }

    /// Multiply every sample by `gain`.
    pub fn with_gain(mut self, gain: f32) -> Self {
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
        self
    }

    /// Interleave channels into a single sample stream.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }
}

/// Bake `gain` into a buffer on the blocking pool.
///
/// Unity gain returns the buffer untouched without a round-trip.
pub async fn render_offline_gain(buffer: AudioBuffer, gain: f32) -> StorylineResult<AudioBuffer> {
    if (gain - 1.0).abs() <= f32::EPSILON {
        return Ok(buffer);
    }
    tokio::task::spawn_blocking(move || buffer.with_gain(gain))
        .await
        .map_err(|e| StorylineError::audio(format!("Gain render task failed: {e}")))
}
