//! Captionburn Common Utilities
//!
//! Shared infrastructure for all captionburn crates:
//! - Error taxonomy and result aliases
//! - Frame/timecode conversions shared by planning and encoding
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use config::*;
pub use error::*;
pub use timecode::*;
