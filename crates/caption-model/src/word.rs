//! Word-level timing.

use serde::{Deserialize, Serialize};

/// Shortest time a word may be displayed as active (seconds).
pub const MIN_WORD_DURATION: f64 = 0.05;

/// A single timed word after ingestion.
///
/// Invariant: `end - start >= MIN_WORD_DURATION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the word closes a sentence (`.`, `!`, `?`, `;`, `:`).
    pub fn ends_sentence(&self) -> bool {
        matches!(trailing_mark(&self.text), Some('.' | '!' | '?' | ';' | ':'))
    }

    /// Whether the word ends with a comma.
    pub fn ends_clause(&self) -> bool {
        trailing_mark(&self.text) == Some(',')
    }
}

/// Last character of a word, looking through closing quotes and brackets.
fn trailing_mark(text: &str) -> Option<char> {
    text.trim_end()
        .trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}'])
        .chars()
        .last()
}

/// A word as delivered by a transcription source. Timestamps may be
/// missing or non-finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWord {
    #[serde(alias = "word", alias = "punctuated_word")]
    pub text: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

impl RawWord {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            end: Some(end),
        }
    }
}
