//! Display segments ("captions").

use serde::{Deserialize, Serialize};

use crate::word::{RawWord, Word};

/// Shortest time a caption may stay on screen (seconds).
pub const MIN_SEGMENT_DURATION: f64 = 0.2;

/// Anchor of a caption in percent of the frame (`0..=100` on each axis).
/// The caption box is centered on this point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionPosition {
    pub x_pct: f32,
    pub y_pct: f32,
}

impl Default for CaptionPosition {
    fn default() -> Self {
        Self {
            x_pct: 50.0,
            y_pct: 80.0,
        }
    }
}

impl CaptionPosition {
    /// Anchor in pixels for a frame of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32) {
        (
            self.x_pct.clamp(0.0, 100.0) / 100.0 * width as f32,
            self.y_pct.clamp(0.0, 100.0) / 100.0 * height as f32,
        )
    }
}

/// A caption shown on screen for `[start, end]`.
///
/// When `words` is present the caption animates word by word; otherwise
/// it is a plain-text caption shown as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: u32,
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
    #[serde(default)]
    pub position: CaptionPosition,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Word timings, if the caption has any.
    pub fn timed_words(&self) -> Option<&[Word]> {
        self.words.as_deref().filter(|words| !words.is_empty())
    }
}

/// A pre-grouped segment as delivered by a transcription source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSegment {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Option<Vec<RawWord>>,
    #[serde(default)]
    pub position: Option<CaptionPosition>,
}
