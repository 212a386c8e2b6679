//! Transcription output shapes.
//!
//! A transcription source returns either a flat list of timed words or
//! segments it already grouped (optionally with per-word timing). Both
//! shapes are accepted; the segmenter turns either into display captions.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::segment::RawSegment;
use crate::word::RawWord;

/// Longest audio accepted for transcription (seconds).
pub const MAX_TRANSCRIPTION_SECS: f64 = 60.0;

/// Output of a transcription call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transcript {
    /// Pre-grouped segments. Listed first so a payload carrying both
    /// `segments` and `words` keeps the source's grouping.
    Segments {
        segments: Vec<RawSegment>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    /// Flat per-word timestamps.
    Words {
        words: Vec<RawWord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
}

impl Transcript {
    /// Parse a transcript from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Clip duration reported by the source, if any.
    pub fn duration(&self) -> Option<f64> {
        match self {
            Transcript::Segments { duration, .. } | Transcript::Words { duration, .. } => {
                duration.filter(|d| d.is_finite() && *d > 0.0)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Transcript::Segments { segments, .. } => segments.is_empty(),
            Transcript::Words { words, .. } => words.is_empty(),
        }
    }

    /// Reject empty transcripts and clips over the transcription cap.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.is_empty() {
            return Err(ModelError::EmptyTranscript);
        }
        match self.duration() {
            Some(duration) => check_duration(duration, MAX_TRANSCRIPTION_SECS),
            None => Ok(()),
        }
    }
}

/// Fail when `duration_secs` exceeds `cap_secs`.
pub fn check_duration(duration_secs: f64, cap_secs: f64) -> Result<(), ModelError> {
    if duration_secs > cap_secs {
        return Err(ModelError::DurationExceeded {
            duration_secs,
            cap_secs,
        });
    }
    Ok(())
}
