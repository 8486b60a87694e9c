//! Frame-synchronous audio mixer.
//!
//! The mixer keeps one playback record per sound name. Every tick the driver
//! calls [`AudioMixer::update`], which cuts exactly one frame of audio from
//! each active record on the blocking pool, then awaits
//! [`AudioMixer::get_audio_buffers`] to collect the chunks. Chunks are not
//! summed here; summation belongs to whoever consumes the frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use storyline_common::error::{StorylineError, StorylineResult};
use tokio::task::JoinHandle;

use crate::buffer::{render_offline_gain, AudioBuffer, AudioChunk};

/// Playback state of a single sound.
#[derive(Debug, Clone)]
pub struct SoundPlaybackRecord {
    pub buffer: Arc<AudioBuffer>,
    pub paused: bool,
    /// Seconds played since the record was created (wrapped when looping).
    pub elapsed_time: f64,
    /// Offset into the buffer where playback begins (seconds).
    pub start: f64,
    pub looping: bool,
    pub volume: f32,
    /// Survives scene changes.
    pub until_end: bool,
}

/// Options for [`AudioMixer::play`]. Unset fields keep the record's current
/// value, or the default for a new record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayOptions {
    pub start: Option<f64>,
    pub looping: Option<bool>,
    pub volume: Option<f32>,
    pub until_end: Option<bool>,
}

impl SoundPlaybackRecord {
    fn new(buffer: Arc<AudioBuffer>, options: PlayOptions) -> Self {
        Self {
            buffer,
            paused: false,
            elapsed_time: 0.0,
            start: options.start.unwrap_or(0.0),
            looping: options.looping.unwrap_or(false),
            volume: options.volume.unwrap_or(1.0),
            until_end: options.until_end.unwrap_or(false),
        }
    }

    fn merge(&mut self, buffer: Arc<AudioBuffer>, options: PlayOptions) {
        self.buffer = buffer;
        self.paused = false;
        if let Some(start) = options.start {
            self.start = start;
        }
        if let Some(looping) = options.looping {
            self.looping = looping;
        }
        if let Some(volume) = options.volume {
            self.volume = volume;
        }
        if let Some(until_end) = options.until_end {
            self.until_end = until_end;
        }
    }

    /// Seconds of the buffer that play from `start` to the end.
    pub fn playable_secs(&self) -> f64 {
        (self.buffer.duration_secs() - self.start).max(0.0)
    }
}

enum PendingSlice {
    Ready(AudioChunk),
    Running(JoinHandle<StorylineResult<AudioChunk>>),
}

/// Mixer owning every active playback record.
#[derive(Default)]
pub struct AudioMixer {
    records: BTreeMap<String, SoundPlaybackRecord>,
    pending: Vec<PendingSlice>,
    output_channels: usize,
}

impl std::fmt::Debug for AudioMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("records", &self.records.keys().collect::<Vec<_>>())
            .field("pending", &self.pending.len())
            .field("output_channels", &self.output_channels)
            .finish()
    }
}

impl AudioMixer {
    /// Create a mixer whose chunks carry `output_channels` channels.
    pub fn new(output_channels: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            pending: Vec::new(),
            output_channels: output_channels.max(1),
        }
    }

    /// Start a sound, or update it in place if it is already playing.
    ///
    /// Updating keeps the record's elapsed time and clears its paused flag.
    pub fn play(&mut self, sound: &str, buffer: Arc<AudioBuffer>, options: PlayOptions) {
        match self.records.get_mut(sound) {
            Some(record) => {
                record.merge(buffer, options);
                tracing::debug!(sound, elapsed = record.elapsed_time, "Updated playback");
            }
            None => {
                tracing::debug!(sound, ?options, "Started playback");
                self.records
                    .insert(sound.to_string(), SoundPlaybackRecord::new(buffer, options));
            }
        }
    }

    /// Freeze a sound without forgetting its position.
    pub fn pause(&mut self, sound: &str) {
        if let Some(record) = self.records.get_mut(sound) {
            record.paused = true;
        }
    }

    /// Remove a sound.
    pub fn stop(&mut self, sound: &str) {
        if self.records.remove(sound).is_some() {
            tracing::debug!(sound, "Stopped playback");
        }
    }

    /// Cut one frame of audio from every unpaused record and advance cursors.
    ///
    /// Non-looping records whose cursor has run past the end are dropped.
    /// Slicing runs on the blocking pool when a runtime is available.
    pub fn update(&mut self, time: f64, fps: u32) {
        let frame = 1.0 / fps.max(1) as f64;
        let runtime = tokio::runtime::Handle::try_current().ok();
        let out_channels = self.output_channels.max(1);

        let mut ended = vec![];
        for (name, record) in self.records.iter_mut() {
            if record.paused {
                continue;
            }

            let playable = record.playable_secs();
            let mut start_time = record.elapsed_time;
            if start_time > playable {
                if record.looping && playable > 0.0 {
                    start_time %= playable;
                    record.elapsed_time = start_time;
                } else {
                    ended.push(name.clone());
                    continue;
                }
            }

            let buffer = Arc::clone(&record.buffer);
            let offset = record.start + start_time;
            let volume = record.volume;
            let source = name.clone();

            let pending = match &runtime {
                Some(handle) => PendingSlice::Running(handle.spawn(async move {
                    let sliced = tokio::task::spawn_blocking(move || {
                        buffer.slice(offset, frame, out_channels)
                    })
                    .await
                    .map_err(|e| StorylineError::audio(format!("Audio slice task failed: {e}")))?;
                    Ok::<_, StorylineError>(AudioChunk {
                        source,
                        timestamp: time,
                        buffer: render_offline_gain(sliced, volume).await?,
                    })
                })),
                None => PendingSlice::Ready(AudioChunk {
                    source,
                    timestamp: time,
                    buffer: buffer.slice(offset, frame, out_channels).with_gain(volume),
                }),
            };
            self.pending.push(pending);

            record.elapsed_time += frame;
        }

        for name in ended {
            tracing::debug!(sound = %name, "Playback ended");
            self.records.remove(&name);
        }
    }

    /// Await every slice queued by [`update`](Self::update) and clear the queue.
    pub async fn get_audio_buffers(&mut self) -> StorylineResult<Vec<AudioChunk>> {
        let mut chunks = Vec::with_capacity(self.pending.len());
        for pending in self.pending.drain(..) {
            match pending {
                PendingSlice::Ready(chunk) => chunks.push(chunk),
                PendingSlice::Running(handle) => {
                    let chunk = handle.await.map_err(|e| {
                        StorylineError::audio(format!("Audio slice task failed: {e}"))
                    })??;
                    chunks.push(chunk);
                }
            }
        }
        Ok(chunks)
    }

    /// Drop every record not flagged `until_end`.
    pub fn reset_except_until_end(&mut self) {
        self.records.retain(|_, record| record.until_end);
    }

    /// Drop every record and any queued slices.
    pub fn reset(&mut self) {
        self.records.clear();
        for pending in self.pending.drain(..) {
            if let PendingSlice::Running(handle) = pending {
                handle.abort();
            }
        }
    }

    pub fn record(&self, sound: &str) -> Option<&SoundPlaybackRecord> {
        self.records.get(sound)
    }

    /// Names of active records, in chunk order.
    pub fn sounds(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
