//! Storyline Audio
//!
//! Frame-synchronous audio for performances:
//! - **Buffers:** Planar `f32` PCM with exact-length slicing and gain rendering
//! - **Decoding:** WAV files into buffers
//! - **Mixer:** Per-sound playback cursors producing one chunk set per frame
//!
//! # Per-frame flow
//!
//! ```text
//! play()/pause()/stop()  ── directives mutate records
//!          │
//!          ▼
//! update(time, fps) ──┬── slice record A ─┐   (blocking pool)
//!                     ├── slice record B ─┤
//!                     └── slice record C ─┤
//!                                         ▼
//!                              get_audio_buffers()  ── one chunk per active sound
//! ```

pub mod buffer;
pub mod decode;
pub mod mixer;

pub use buffer::*;
pub use decode::*;
pub use mixer::*;
