//! Captionburn Caption Timing
//!
//! Turns transcription output into a stream of timed captions and answers
//! "what is on screen at time t":
//! - **Segmenter:** Group timed words into display captions with adaptive timing
//! - **Visibility:** Pick the single visible caption and each word's animation state
//! - **Planner:** Split the frame range across parallel render workers
//! - **Subtitles:** SRT/VTT sidecars from the same captions
//!
//! This crate is pure computation apart from `subtitles::save_subtitles`.

pub mod planner;
pub mod segmenter;
pub mod subtitles;
pub mod visibility;

pub use planner::{frame_jobs, plan_ranges};
pub use segmenter::{
    normalize_segments, segment_transcript, timing_threshold, SegmenterConfig,
    TranscriptSegmenter,
};
pub use subtitles::{generate_srt, generate_vtt, save_subtitles};
pub use visibility::{
    resolve_frame, select_caption, word_state, CaptionFrame, VisibilityConfig, WordPhase,
    WordState, WordVisual,
};
