//! Caption visibility and per-word animation state.
//!
//! At any timestamp at most one caption is shown. Candidates are scored
//! (word-timed captions by how many of their words are live, plain captions
//! by their time range) and the best positive score wins. Words of the
//! winning caption are then classified into one of the animation phases
//! below, each with a fixed opacity and weight class.

use std::cmp::Ordering;

use captionburn_caption_model::{CaptionPosition, Segment, WeightClass, Word};
use serde::{Deserialize, Serialize};

/// Timing windows used by selection and word classification.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityConfig {
    /// Added to the playback timestamp before anything else (seconds).
    pub lookahead_secs: f64,

    /// Window before a word or caption starts in which it is about to
    /// appear (seconds).
    pub buffer_secs: f64,

    /// How long a caption stays eligible after its last word ends.
    pub linger_secs: f64,

    /// A caption whose first word started this recently gets a bonus.
    pub recent_start_secs: f64,

    /// Weight of words in captions without word timing.
    pub plain_weight: WeightClass,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 0.05,
            buffer_secs: 0.05,
            linger_secs: 0.1,
            recent_start_secs: 0.5,
            plain_weight: WeightClass::Bold,
        }
    }
}

impl VisibilityConfig {
    pub fn with_lookahead(mut self, lookahead_secs: f64) -> Self {
        self.lookahead_secs = lookahead_secs;
        self
    }

    pub fn with_plain_weight(mut self, weight: WeightClass) -> Self {
        self.plain_weight = weight;
        self
    }
}

/// Animation phase of a single word, in the order a word passes through
/// them as time advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordPhase {
    Upcoming,
    AboutToAppear,
    Active,
    Appeared,
    Gone,
}

impl WordPhase {
    pub fn opacity(self) -> f32 {
        match self {
            WordPhase::Active => 1.0,
            WordPhase::AboutToAppear => 0.5,
            WordPhase::Appeared => 0.7,
            WordPhase::Upcoming => 0.3,
            WordPhase::Gone => 0.0,
        }
    }

    pub fn weight(self) -> WeightClass {
        match self {
            WordPhase::Active => WeightClass::Bold,
            WordPhase::AboutToAppear => WeightClass::Medium,
            WordPhase::Appeared => WeightClass::Semibold,
            WordPhase::Upcoming | WordPhase::Gone => WeightClass::Regular,
        }
    }
}

/// Key timestamps of one word's animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordState {
    pub appear: f64,
    pub active_start: f64,
    pub active_end: f64,
    /// Last moment the word is drawn after being spoken.
    pub fade: f64,
}

impl WordState {
    pub fn new(word: &Word, caption_end: f64, config: &VisibilityConfig) -> Self {
        Self {
            appear: word.start - config.buffer_secs,
            active_start: word.start,
            active_end: word.end,
            fade: word.end.max(caption_end),
        }
    }

    /// Classify a buffered timestamp. Checks run in priority order so the
    /// active window always wins at its boundaries.
    pub fn classify(&self, t: f64) -> WordPhase {
        if self.active_start <= t && t <= self.active_end {
            WordPhase::Active
        } else if self.appear <= t && t < self.active_start {
            WordPhase::AboutToAppear
        } else if t >= self.active_start && t <= self.fade {
            WordPhase::Appeared
        } else if t < self.active_start {
            WordPhase::Upcoming
        } else {
            WordPhase::Gone
        }
    }
}

/// Timing state of `word` within a caption ending at `caption_end`.
pub fn word_state(word: &Word, caption_end: f64, config: &VisibilityConfig) -> WordState {
    WordState::new(word, caption_end, config)
}

/// One word of the caption to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordVisual {
    pub text: String,
    pub phase: WordPhase,
    pub opacity: f32,
    pub weight: WeightClass,
}

/// Everything a rasterizer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionFrame {
    pub caption_id: u32,
    pub position: CaptionPosition,
    /// Every word of the caption, gone words included so layout stays put.
    pub words: Vec<WordVisual>,
}

impl CaptionFrame {
    /// Whether anything would actually be painted.
    pub fn is_visible(&self) -> bool {
        self.words.iter().any(|w| w.opacity > 0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct CaptionScore {
    any_active: bool,
    score: u32,
    earliest_start: f64,
}

impl CaptionScore {
    fn rank(&self, other: &Self) -> Ordering {
        self.any_active
            .cmp(&other.any_active)
            .then(self.score.cmp(&other.score))
            .then(self.earliest_start.total_cmp(&other.earliest_start))
    }
}

fn score_caption(caption: &Segment, t: f64, config: &VisibilityConfig) -> CaptionScore {
    let Some(words) = caption.timed_words() else {
        let score = if caption.start <= t && t <= caption.end {
            50
        } else if caption.start - config.buffer_secs <= t && t < caption.start {
            10
        } else {
            0
        };
        return CaptionScore {
            any_active: false,
            score,
            earliest_start: caption.start,
        };
    };

    let earliest = words.iter().map(|w| w.start).fold(f64::INFINITY, f64::min);
    let latest = words.iter().map(|w| w.end).fold(f64::NEG_INFINITY, f64::max);
    let disqualified = CaptionScore {
        any_active: false,
        score: 0,
        earliest_start: earliest,
    };
    if t < earliest - config.buffer_secs || t > latest + config.linger_secs {
        return disqualified;
    }

    let active = words.iter().filter(|w| w.start <= t && t <= w.end).count() as u32;
    let about = words
        .iter()
        .filter(|w| w.start - config.buffer_secs <= t && t < w.start)
        .count() as u32;
    let recent = words
        .iter()
        .filter(|w| t > w.end && t - w.end <= config.linger_secs)
        .count() as u32;

    let mut score = active * 10 + about * 5 + recent * 2;
    if active > 0 {
        score += 100;
    }
    let since_start = t - earliest;
    if (0.0..=config.recent_start_secs).contains(&since_start) {
        score += 20;
    }

    CaptionScore {
        any_active: active > 0,
        score,
        earliest_start: earliest,
    }
}

/// Pick the caption to show at buffered time `t`.
pub fn select_caption<'a>(
    captions: &'a [Segment],
    t: f64,
    config: &VisibilityConfig,
) -> Option<&'a Segment> {
    captions
        .iter()
        .map(|caption| (caption, score_caption(caption, t, config)))
        .filter(|(_, score)| score.score > 0)
        .max_by(|(_, a), (_, b)| a.rank(b))
        .map(|(caption, _)| caption)
}

/// Resolve the caption and word visuals for a playback timestamp.
pub fn resolve_frame(
    captions: &[Segment],
    playback_t: f64,
    config: &VisibilityConfig,
) -> Option<CaptionFrame> {
    let t = playback_t + config.lookahead_secs;
    let caption = select_caption(captions, t, config)?;

    let words = match caption.timed_words() {
        Some(words) => words
            .iter()
            .map(|word| {
                let phase = word_state(word, caption.end, config).classify(t);
                WordVisual {
                    text: word.text.clone(),
                    phase,
                    opacity: phase.opacity(),
                    weight: phase.weight(),
                }
            })
            .collect(),
        None => caption
            .text
            .split_whitespace()
            .map(|text| WordVisual {
                text: text.to_string(),
                phase: WordPhase::Active,
                opacity: 1.0,
                weight: config.plain_weight,
            })
            .collect(),
    };

    Some(CaptionFrame {
        caption_id: caption.id,
        position: caption.position,
        words,
    })
}
