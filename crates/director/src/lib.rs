//! Storyline Director
//!
//! The timeline directive engine. A [`Screenplay`](storyline_screenplay::Screenplay)
//! is compiled into a flat [`Schedule`] of scenes and directives, then
//! performed one frame at a time against a simulated clock:
//!
//! ```text
//!                       ┌──────────── per tick ─────────────┐
//! compile ──► install ──┤ clock.advance(i)                  │
//!   check()    scene    │   ├── Dispatch(d): d.execute(ctx) │──► uninstall ──► next scene
//!   load()              │   └── Compose: seek/hooks/mix/    │     (flush trailing
//!   duration()          │        render ──► Frame ──► sink  │      directives)
//!                       └───────────────────────────────────┘
//! ```
//!
//! Directives never read wall time; everything they need arrives through a
//! [`StageContext`].

pub mod assets;
pub mod context;
pub mod directive;
pub mod director;
pub mod schedule;

pub use assets::*;
pub use context::*;
pub use directive::*;
pub use director::*;
pub use schedule::*;
