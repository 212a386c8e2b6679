//! Transcript segmentation: timed words in, display captions out.
//!
//! # Algorithm
//!
//! 1. **Sanitize** raw words: round to centiseconds, synthesize missing
//!    ends, pad words shorter than [`MIN_WORD_DURATION`].
//! 2. **Tempo** estimation: average positive gap over the first few word
//!    boundaries picks a timing threshold (fast speakers split on smaller
//!    pauses).
//! 3. **Greedy grouping**: hard breaks on sentence punctuation and long
//!    pauses, soft breaks on commas, group length and shorter pauses once
//!    a group has enough words.
//! 4. **Normalization**: sort, remove overlaps with an advancing cursor,
//!    enforce minimum durations, clamp to the clip and fit words inside
//!    their caption.
//!
//! Step 4 also runs on its own for transcripts that arrive pre-grouped.

use captionburn_caption_model::{
    CaptionPosition, RawSegment, RawWord, Segment, Transcript, Word, MIN_SEGMENT_DURATION,
    MIN_WORD_DURATION,
};
use captionburn_common::timecode::round_centis;

/// Tolerance for comparisons against centisecond-rounded values.
const EPSILON: f64 = 1e-9;

/// Configuration for the segmenter.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Shortest allowed word (seconds).
    pub min_word_duration: f64,

    /// Shortest allowed caption (seconds).
    pub min_segment_duration: f64,

    /// Group duration that allows a soft break (seconds).
    pub max_group_duration: f64,

    /// Group size that allows a soft break.
    pub max_group_words: usize,

    /// Soft breaks only happen once a group holds this many words.
    pub min_group_words: usize,

    /// Number of leading word boundaries sampled for tempo estimation.
    pub tempo_sample_gaps: usize,

    /// Tempo assumed when no positive gap is found (seconds).
    pub default_tempo: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_word_duration: MIN_WORD_DURATION,
            min_segment_duration: MIN_SEGMENT_DURATION,
            max_group_duration: 0.6,
            max_group_words: 4,
            min_group_words: 2,
            tempo_sample_gaps: 10,
            default_tempo: 0.1,
        }
    }
}

/// Map an average inter-word gap to the pause that splits captions.
pub fn timing_threshold(tempo_secs: f64) -> f64 {
    if tempo_secs < 0.05 {
        0.06
    } else if tempo_secs < 0.10 {
        0.08
    } else if tempo_secs > 0.25 {
        0.20
    } else {
        0.12
    }
}

/// Groups words into captions and normalizes caption lists.
pub struct TranscriptSegmenter {
    config: SegmenterConfig,
}

impl TranscriptSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SegmenterConfig::default())
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment either transcript shape. `duration` overrides the duration
    /// carried by the transcript.
    pub fn segment_transcript(&self, transcript: &Transcript, duration: Option<f64>) -> Vec<Segment> {
        let duration = duration.or_else(|| transcript.duration());
        match transcript {
            Transcript::Words { words, .. } => self.segment_words(words, duration),
            Transcript::Segments { segments, .. } => {
                let converted = segments
                    .iter()
                    .enumerate()
                    .map(|(index, raw)| self.from_raw_segment(index, raw))
                    .collect();
                self.normalize(converted, duration)
            }
        }
    }

    /// Sanitize, group and normalize a flat word list.
    pub fn segment_words(&self, raw: &[RawWord], duration: Option<f64>) -> Vec<Segment> {
        let words = self.sanitize_words(raw);
        let grouped = self.group_words(&words);
        let segments = self.normalize(grouped, duration);
        tracing::debug!(
            words = words.len(),
            segments = segments.len(),
            "Segmented transcript words"
        );
        segments
    }

    /// Round timestamps and repair missing or too-short word timings.
    ///
    /// A missing start falls back to the previous word's end; a missing end
    /// becomes `start + min_word_duration`. Words without text are dropped.
    pub fn sanitize_words(&self, raw: &[RawWord]) -> Vec<Word> {
        let min_word = self.config.min_word_duration;
        let mut words = Vec::with_capacity(raw.len());
        let mut previous_end = 0.0;

        for word in raw {
            let text = word.text.trim();
            if text.is_empty() {
                continue;
            }

            let start = match word.start.filter(|s| s.is_finite()) {
                Some(start) => round_centis(start.max(0.0)),
                None => previous_end,
            };
            let mut end = match word.end.filter(|e| e.is_finite()) {
                Some(end) => round_centis(end),
                None => round_centis(start + min_word),
            };
            if end - start < min_word - EPSILON {
                end = round_centis(start + min_word);
            }

            previous_end = end;
            words.push(Word::new(text, start, end));
        }

        words
    }

    /// Average positive gap over the first `tempo_sample_gaps` boundaries.
    pub fn speech_tempo(&self, words: &[Word]) -> f64 {
        let gaps: Vec<f64> = words
            .windows(2)
            .take(self.config.tempo_sample_gaps)
            .map(|pair| pair[1].start - pair[0].end)
            .filter(|gap| *gap > 0.0)
            .collect();

        if gaps.is_empty() {
            self.config.default_tempo
        } else {
            gaps.iter().sum::<f64>() / gaps.len() as f64
        }
    }

    /// Greedy grouping of sanitized words into captions.
    pub fn group_words(&self, words: &[Word]) -> Vec<Segment> {
        let threshold = timing_threshold(self.speech_tempo(words));
        let mut segments = Vec::new();
        let mut group: Vec<Word> = Vec::new();

        for (i, word) in words.iter().enumerate() {
            group.push(word.clone());

            let next = words.get(i + 1);
            let gap = next.map(|next| next.start - word.end);

            let force_end = word.ends_sentence()
                || next.is_none()
                || gap.is_some_and(|gap| gap > 2.0 * threshold);

            let soft_end = group.len() >= self.config.min_group_words
                && (word.ends_clause()
                    || word.end - group[0].start >= self.config.max_group_duration - EPSILON
                    || group.len() >= self.config.max_group_words
                    || gap.is_some_and(|gap| gap > threshold));

            if force_end || soft_end {
                segments.push(self.emit(segments.len() as u32, &group));
                group.clear();
            }
        }

        tracing::trace!(threshold, groups = segments.len(), "Grouped words");
        segments
    }

    fn emit(&self, id: u32, group: &[Word]) -> Segment {
        let first = &group[0];
        let last = &group[group.len() - 1];
        let end = round_centis(last.end.max(first.start + self.config.min_segment_duration));

        Segment {
            id,
            text: join_words(group),
            start: first.start,
            end,
            words: Some(group.to_vec()),
            position: CaptionPosition::default(),
        }
    }

    fn from_raw_segment(&self, index: usize, raw: &RawSegment) -> Segment {
        let words = raw.words.as_ref().map(|words| self.sanitize_words(words));
        let text = match raw.text.trim() {
            "" => words.as_deref().map(join_words).unwrap_or_default(),
            text => text.to_string(),
        };

        Segment {
            id: raw.id.unwrap_or(index as u32),
            text,
            start: raw.start,
            end: raw.end,
            words,
            position: raw.position.unwrap_or_default(),
        }
    }

    /// Make a caption list gap-consistent and duration-safe.
    ///
    /// Output is sorted by start, pairwise non-overlapping, and every caption
    /// lasts at least `min_segment_duration` unless the clip end cuts it.
    /// Captions starting at or after a known clip end are dropped. Running
    /// this on its own output returns the same list.
    pub fn normalize(&self, mut segments: Vec<Segment>, duration: Option<f64>) -> Vec<Segment> {
        let duration = duration.filter(|d| d.is_finite() && *d > 0.0);
        segments.retain(|s| s.start.is_finite() && s.end.is_finite());
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        let next_starts: Vec<Option<f64>> = (0..segments.len())
            .map(|i| segments.get(i + 1).map(|next| round_centis(next.start)))
            .collect();

        let mut cursor = 0.0;
        let mut normalized = Vec::with_capacity(segments.len());

        for (segment, next_start) in segments.into_iter().zip(next_starts) {
            let mut start = round_centis(segment.start.max(cursor));
            let floor_end = round_centis(start + self.config.min_segment_duration);
            let mut end = round_centis(segment.end).max(floor_end);
            if let Some(next_start) = next_start {
                end = end.min(next_start.max(floor_end));
            }

            if let Some(duration) = duration {
                if start >= duration {
                    continue;
                }
                start = start.clamp(0.0, duration);
                end = end.clamp(0.0, duration);
            }

            let words = segment
                .words
                .map(|words| self.fit_words(words, start, end))
                .filter(|words| !words.is_empty());

            let text = match segment.text.trim() {
                "" => words.as_deref().map(join_words).unwrap_or_default(),
                text => text.to_string(),
            };
            if text.is_empty() {
                continue;
            }

            cursor = end;
            normalized.push(Segment {
                id: segment.id,
                text,
                start,
                end,
                words,
                position: segment.position,
            });
        }

        normalized
    }

    /// Clamp words into `[start, end]`, keep their minimum duration, drop
    /// words with no room left and stretch the last word to `end`.
    fn fit_words(&self, words: Vec<Word>, start: f64, end: f64) -> Vec<Word> {
        let min_word = self.config.min_word_duration;
        let mut fitted: Vec<Word> = Vec::with_capacity(words.len());

        for word in words {
            if !word.start.is_finite() || !word.end.is_finite() {
                continue;
            }

            let word_start = round_centis(word.start.clamp(start, end));
            if end - word_start < min_word - EPSILON {
                continue;
            }

            let mut word_end = round_centis(word.end.clamp(word_start, end));
            if word_end - word_start < min_word - EPSILON {
                word_end = round_centis(word_start + min_word).min(end);
            }

            fitted.push(Word::new(word.text, word_start, word_end));
        }

        if let Some(last) = fitted.last_mut() {
            last.end = end;
        }

        fitted
    }
}

/// Segment a transcript with default settings.
pub fn segment_transcript(transcript: &Transcript, duration: Option<f64>) -> Vec<Segment> {
    TranscriptSegmenter::with_defaults().segment_transcript(transcript, duration)
}

/// Normalize a caption list with default settings.
pub fn normalize_segments(segments: Vec<Segment>, duration: Option<f64>) -> Vec<Segment> {
    TranscriptSegmenter::with_defaults().normalize(segments, duration)
}

fn join_words(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| w.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(words: &[(&str, f64, f64)]) -> Vec<RawWord> {
        words
            .iter()
            .map(|(text, start, end)| RawWord::new(*text, *start, *end))
            .collect()
    }

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_threshold_bands() {
        assert_eq!(timing_threshold(0.01), 0.06);
        assert_eq!(timing_threshold(0.07), 0.08);
        assert_eq!(timing_threshold(0.11), 0.12);
        assert_eq!(timing_threshold(0.25), 0.12);
        assert_eq!(timing_threshold(0.3), 0.20);
    }

    #[test]
    fn test_sanitize_repairs_missing_and_short_timings() {
        let segmenter = TranscriptSegmenter::with_defaults();
        let words = segmenter.sanitize_words(&[
            RawWord {
                text: " hello ".into(),
                start: Some(0.123),
                end: Some(0.13),
            },
            RawWord {
                text: "world".into(),
                start: None,
                end: Some(f64::NAN),
            },
            RawWord {
                text: "  ".into(),
                start: Some(1.0),
                end: Some(2.0),
            },
        ]);

        assert_eq!(words.len(), 2);
        assert_eq!(words[0], Word::new("hello", 0.12, 0.17));
        assert_eq!(words[1], Word::new("world", 0.17, 0.22));
    }

    #[test]
    fn test_tempo_defaults_without_positive_gaps() {
        let segmenter = TranscriptSegmenter::with_defaults();
        let words = vec![Word::new("a", 0.0, 0.5), Word::new("b", 0.4, 0.8)];
        assert_eq!(segmenter.speech_tempo(&words), 0.1);
        assert_eq!(segmenter.speech_tempo(&[]), 0.1);
    }

    #[test]
    fn test_worked_example_splits_on_long_pause() {
        let segments = TranscriptSegmenter::with_defaults().segment_words(
            &raw(&[("hi", 0.0, 0.3), ("there", 0.32, 0.6), ("friend", 1.1, 1.4)]),
            None,
        );

        assert_eq!(texts(&segments), vec!["hi there", "friend"]);
        assert_eq!((segments[0].start, segments[0].end), (0.0, 0.6));
        assert_eq!((segments[1].start, segments[1].end), (1.1, 1.4));
    }

    #[test]
    fn test_sentence_punctuation_forces_break() {
        let segments = TranscriptSegmenter::with_defaults().segment_words(
            &raw(&[("Stop.", 0.0, 0.2), ("Go", 0.22, 0.4), ("now", 0.42, 0.6)]),
            None,
        );
        assert_eq!(texts(&segments), vec!["Stop.", "Go now"]);
    }

    #[test]
    fn test_comma_only_breaks_after_minimum_words() {
        let segments = TranscriptSegmenter::with_defaults().segment_words(
            &raw(&[
                ("Well,", 0.0, 0.1),
                ("you", 0.12, 0.2),
                ("see,", 0.22, 0.3),
                ("it", 0.32, 0.4),
                ("works", 0.42, 0.5),
            ]),
            None,
        );
        assert_eq!(texts(&segments), vec!["Well, you see,", "it works"]);
    }

    #[test]
    fn test_group_size_cap() {
        let words: Vec<(&str, f64, f64)> = (0..6)
            .map(|i| ("w", i as f64 * 0.1, i as f64 * 0.1 + 0.08))
            .collect();
        let segments = TranscriptSegmenter::with_defaults().segment_words(&raw(&words), None);
        let sizes: Vec<usize> = segments
            .iter()
            .map(|s| s.words.as_ref().map_or(0, Vec::len))
            .collect();
        assert_eq!(sizes, vec![4, 2]);
    }

    #[test]
    fn test_single_short_word_gets_minimum_duration() {
        let segments =
            TranscriptSegmenter::with_defaults().segment_words(&raw(&[("ok", 1.0, 1.05)]), None);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start, segments[0].end), (1.0, 1.2));
        let words = segments[0].words.as_ref().unwrap();
        assert_eq!(words[0].end, 1.2);
    }

    #[test]
    fn test_normalize_removes_overlap_and_caps_to_next_start() {
        let segmenter = TranscriptSegmenter::with_defaults();
        let segments = vec![
            plain(1, "second", 1.0, 2.0),
            plain(0, "first", 0.0, 1.5),
            plain(2, "third", 1.9, 2.5),
        ];
        let normalized = segmenter.normalize(segments, None);

        let spans: Vec<(u32, f64, f64)> = normalized.iter().map(|s| (s.id, s.start, s.end)).collect();
        assert_eq!(spans, vec![(0, 0.0, 1.0), (1, 1.0, 1.9), (2, 1.9, 2.5)]);
    }

    #[test]
    fn test_normalize_clamps_to_duration_and_drops_late_segments() {
        let segmenter = TranscriptSegmenter::with_defaults();
        let normalized = segmenter.normalize(
            vec![plain(0, "a", 0.0, 1.0), plain(1, "b", 2.9, 3.5), plain(2, "c", 3.2, 4.0)],
            Some(3.0),
        );
        let spans: Vec<(f64, f64)> = normalized.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(spans, vec![(0.0, 1.0), (2.9, 3.0)]);
    }

    #[test]
    fn test_normalize_fits_words_inside_segment() {
        let segmenter = TranscriptSegmenter::with_defaults();
        let mut segment = plain(0, "", 1.0, 2.0);
        segment.words = Some(vec![
            Word::new("early", 0.5, 1.1),
            Word::new("mid", 1.3, 1.31),
            Word::new("late", 1.99, 2.5),
            Word::new("tail", 1.6, 1.7),
        ]);

        let normalized = segmenter.normalize(vec![segment], None);
        let words = normalized[0].words.as_ref().unwrap();
        let spans: Vec<(&str, f64, f64)> = words
            .iter()
            .map(|w| (w.text.as_str(), w.start, w.end))
            .collect();

        assert_eq!(
            spans,
            vec![("early", 1.0, 1.1), ("mid", 1.3, 1.35), ("tail", 1.6, 2.0)]
        );
        assert_eq!(normalized[0].text, "early mid tail");
    }

    #[test]
    fn test_pre_grouped_transcript_is_normalized() {
        let transcript = Transcript::from_json(
            r#"{"segments": [
                {"text": "second", "start": 1.0, "end": 1.1},
                {"text": "first", "start": 0.0, "end": 1.4}
            ], "duration": 1.15}"#,
        )
        .unwrap();

        let segments = segment_transcript(&transcript, None);
        let spans: Vec<(&str, f64, f64)> = segments
            .iter()
            .map(|s| (s.text.as_str(), s.start, s.end))
            .collect();
        assert_eq!(spans, vec![("first", 0.0, 1.0), ("second", 1.0, 1.15)]);
        assert_eq!(segments[0].id, 1);
    }

    fn plain(id: u32, text: &str, start: f64, end: f64) -> Segment {
        Segment {
            id,
            text: text.to_string(),
            start,
            end,
            words: None,
            position: CaptionPosition::default(),
        }
    }
}
