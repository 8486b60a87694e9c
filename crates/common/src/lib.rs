//! Storyline Common Utilities
//!
//! Shared infrastructure for all Storyline crates:
//! - Error types and result aliases
//! - The frame clock that drives every performance
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
