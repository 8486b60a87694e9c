//! Storyline Stage
//!
//! The visual side of a scene:
//! - **Scene graph:** Runtime node tree built from a scene's `NodeConfig`
//! - **Tweens:** A paused, seek-driven timeline animating node properties
//! - **Render hooks:** Per-frame callbacks applied right before rendering
//! - **Sources:** Time-addressable images for sprites
//! - **Raster:** The `Renderer` seam and a flat software implementation
//!
//! # Frame composition
//!
//! ```text
//! directives ──► SceneGraph ◄── TweenTimeline.seek(t)
//!                    │      ◄── RenderHook.apply(t)
//!                    ▼
//!            Renderer.render(graph, t)
//!                    │
//!                    ▼
//!               RgbaImage
//! ```

pub mod hook;
pub mod raster;
pub mod scene;
pub mod source;
pub mod tween;

pub use hook::*;
pub use raster::*;
pub use scene::*;
pub use source::*;
pub use tween::*;
