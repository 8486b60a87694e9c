//! Time-addressable image sources for sprites.

use image::RgbaImage;

/// Something a sprite can draw: a still image or a frame sequence.
pub trait RenderableSource: Send + Sync + std::fmt::Debug {
    /// Image to show `timestamp` seconds after the source was attached.
    /// `None` when the source has nothing to show at that time.
    fn render(&self, timestamp: f64) -> Option<&RgbaImage>;

    /// Natural length in seconds; `None` for stills.
    fn duration_secs(&self) -> Option<f64>;

    /// Pixel size of the frames.
    fn dimensions(&self) -> (u32, u32);
}

/// A single image shown forever.
#[derive(Debug, Clone)]
pub struct StillImageSource {
    image: RgbaImage,
}

impl StillImageSource {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }
}

impl RenderableSource for StillImageSource {
    fn render(&self, _timestamp: f64) -> Option<&RgbaImage> {
        Some(&self.image)
    }

    fn duration_secs(&self) -> Option<f64> {
        None
    }

    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Fixed-rate image sequence (an animated sprite).
#[derive(Debug, Clone)]
pub struct FrameSequenceSource {
    frames: Vec<RgbaImage>,
    fps: f64,
    looping: bool,
}

impl FrameSequenceSource {
    pub fn new(frames: Vec<RgbaImage>, fps: f64, looping: bool) -> Self {
        Self {
            frames,
            fps: if fps > 0.0 { fps } else { 1.0 },
            looping,
        }
    }
}

impl RenderableSource for FrameSequenceSource {
    fn render(&self, timestamp: f64) -> Option<&RgbaImage> {
        if self.frames.is_empty() || timestamp < 0.0 {
            return None;
        }
        let index = (timestamp * self.fps + 1e-9).floor() as usize;
        if self.looping {
            self.frames.get(index % self.frames.len())
        } else {
            // Hold the last frame once the sequence has played out.
            self.frames.get(index.min(self.frames.len() - 1))
        }
    }

    fn duration_secs(&self) -> Option<f64> {
        Some(self.frames.len() as f64 / self.fps)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frames.first().map(|f| f.dimensions()).unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(2, 2, Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_still_image_always_renders() {
        let source = StillImageSource::new(solid(7));
        assert_eq!(source.render(100.0).unwrap().get_pixel(0, 0)[0], 7);
        assert_eq!(source.duration_secs(), None);
        assert_eq!(source.dimensions(), (2, 2));
    }

    #[test]
    fn test_sequence_picks_frame_by_time() {
        let source = FrameSequenceSource::new(vec![solid(0), solid(1), solid(2)], 10.0, false);
        assert_eq!(source.render(0.0).unwrap().get_pixel(0, 0)[0], 0);
        assert_eq!(source.render(0.1).unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(source.render(5.0).unwrap().get_pixel(0, 0)[0], 2);
        assert!((source.duration_secs().unwrap() - 0.3).abs() < 1e-12);
        assert!(source.render(-1.0).is_none());
    }

    #[test]
    fn test_looping_sequence_wraps() {
        let source = FrameSequenceSource::new(vec![solid(0), solid(1)], 10.0, true);
        assert_eq!(source.render(0.2).unwrap().get_pixel(0, 0)[0], 0);
        assert_eq!(source.render(0.3).unwrap().get_pixel(0, 0)[0], 1);
    }
}
