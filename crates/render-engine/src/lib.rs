//! Storyline Render Engine
//!
//! Consumers of the director's frame stream. Every tick produces one
//! [`Frame`] (rendered image plus that tick's audio chunks) and hands it to
//! the attached [`FrameSink`]:
//!
//! - **Previewer:** presents frames to a surface, plays chunks on live audio
//!   nodes, and sleeps off the rest of each frame's budget.
//! - **Synthesizer:** never throttles; sums audio and feeds a [`MediaEncoder`].
//!
//! # Export pipeline
//!
//! ```text
//! Frame ──► Synthesizer ──┬── RGBA ──────► ffmpeg (libx264) ──► video.mkv ──┐
//!                         │                                                 ├── mux (-c copy)
//!                         └── mix_chunks ► ffmpeg (aac) ──────► audio.m4a ──┘      │
//!                                                                                  ▼
//!                                                                             output.mp4
//! ```

pub mod encoder;
pub mod preview;
pub mod sink;
pub mod synthesizer;

pub use encoder::*;
pub use preview::*;
pub use sink::*;
pub use synthesizer::*;
