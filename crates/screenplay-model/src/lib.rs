//! Storyline Screenplay Model
//!
//! Defines the authored data contracts consumed by the director:
//! - **Screenplay:** Ordered scenes plus global canvas/audio configuration
//! - **Scene:** A renderable node tree, a directive script, and per-scene defaults
//! - **Directive:** Typed, inert operation configs (animation, speak, sound, ...)
//! - **Subtitle:** Timed dialogue lines derived from speak directives, with SRT/VTT output
//!
//! Screenplays are plain JSON documents. Everything here is data; timing and
//! execution live in `storyline-director`.

pub mod directive;
pub mod scene;
pub mod screenplay;
pub mod subtitle;

pub use directive::*;
pub use scene::*;
pub use screenplay::*;
pub use subtitle::*;
