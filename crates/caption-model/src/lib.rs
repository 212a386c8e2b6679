//! Captionburn Caption Model
//!
//! Defines the data contracts shared by every stage of a caption export:
//! - **Words:** Timed tokens as they arrive from transcription
//! - **Segments:** Display captions with optional per-word timing
//! - **Style:** Immutable per-job look of the burned-in captions
//! - **Transcript:** The two input shapes (flat words, pre-grouped segments)
//! - **Payload / Jobs:** What rasterizers receive and what workers execute
//! - **Progress:** Per-job progress records published to subscribers
//!
//! Times are seconds (`f64`) from the start of the clip.

pub mod error;
pub mod payload;
pub mod progress;
pub mod segment;
pub mod style;
pub mod transcript;
pub mod word;

pub use error::*;
pub use payload::*;
pub use progress::*;
pub use segment::*;
pub use style::*;
pub use transcript::*;
pub use word::*;
