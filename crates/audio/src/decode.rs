//! WAV decoding.

use std::io::Cursor;

use storyline_common::error::{StorylineError, StorylineResult};

use crate::buffer::AudioBuffer;

/// Decode an in-memory WAV file into a planar buffer.
///
/// Integer formats are normalized to `[-1, 1]` by their bit depth.
pub fn decode_wav(bytes: &[u8]) -> StorylineResult<AudioBuffer> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| StorylineError::audio(format!("Invalid WAV data: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| StorylineError::audio(format!("Failed to read WAV samples: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| StorylineError::audio(format!("Failed to read WAV samples: {e}")))?
        }
    };

    tracing::debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        "Decoded WAV"
    );

    Ok(AudioBuffer::from_interleaved(
        spec.sample_rate,
        spec.channels as usize,
        &samples,
    ))
}

/// Encode a buffer as 32-bit float WAV.
pub fn encode_wav(buffer: &AudioBuffer) -> StorylineResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: buffer.channel_count().max(1) as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| StorylineError::audio(format!("Failed to start WAV: {e}")))?;
        let samples = if buffer.channel_count() == 0 {
            vec![0.0; buffer.frames()]
        } else {
            buffer.interleaved()
        };
        for sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| StorylineError::audio(format!("Failed to write WAV: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| StorylineError::audio(format!("Failed to finalize WAV: {e}")))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_int16_normalizes() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [16384i16, -16384, 0, 32767] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let buffer = decode_wav(&cursor.into_inner()).unwrap();
        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.channel(0).unwrap()[0], 0.5);
        assert_eq!(buffer.channel(1).unwrap()[0], -0.5);
    }

    #[test]
    fn test_float_wav_round_trip() {
        let buffer = AudioBuffer::new(16000, vec![vec![0.25, -0.75, 1.0]]);
        let bytes = encode_wav(&buffer).unwrap();
        assert_eq!(decode_wav(&bytes).unwrap(), buffer);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode_wav(b"not a wav file").is_err());
    }
}
