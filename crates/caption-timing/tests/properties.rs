use captionburn_caption_model::{RawWord, Segment, Word};
use captionburn_caption_timing::segmenter::TranscriptSegmenter;
use captionburn_caption_timing::visibility::{select_caption, VisibilityConfig, WordState};
use captionburn_caption_timing::{normalize_segments, plan_ranges};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-9;

fn raw_words() -> impl Strategy<Value = Vec<RawWord>> {
    let word = (
        prop::sample::select(vec!["hi", "there.", "well,", "ok", "yes!", "so"]),
        0.0f64..0.8,
        0.0f64..0.6,
        any::<bool>(),
    );
    prop::collection::vec(word, 0..40).prop_map(|words| {
        let mut cursor = 0.0;
        words
            .into_iter()
            .map(|(text, gap, duration, has_end)| {
                cursor += gap;
                let start = cursor;
                cursor += duration;
                RawWord {
                    text: text.to_string(),
                    start: Some(start),
                    end: has_end.then_some(cursor),
                }
            })
            .collect()
    })
}

fn assert_well_formed(segments: &[Segment]) {
    for segment in segments {
        assert!(segment.start <= segment.end);
        if let Some(words) = &segment.words {
            assert!(!words.is_empty());
            for word in words {
                assert!(word.start >= segment.start - TOLERANCE);
                assert!(word.end <= segment.end + TOLERANCE);
                assert!(word.start <= word.end);
            }
            assert_eq!(words[words.len() - 1].end, segment.end);
        }
    }
    for pair in segments.windows(2) {
        assert!(pair[0].start < pair[1].start);
        assert!(pair[0].end <= pair[1].start + TOLERANCE);
    }
}

proptest! {
    #[test]
    fn segments_are_sorted_disjoint_and_long_enough(words in raw_words()) {
        let segments = TranscriptSegmenter::with_defaults().segment_words(&words, None);
        assert_well_formed(&segments);
        for segment in &segments {
            prop_assert!(segment.end - segment.start >= 0.2 - TOLERANCE);
        }
    }

    #[test]
    fn output_words_are_an_ordered_subsequence_of_input(words in raw_words()) {
        let segmenter = TranscriptSegmenter::with_defaults();
        let segments = segmenter.segment_words(&words, None);

        let input: Vec<String> = words.iter().map(|w| w.text.clone()).collect();
        let output: Vec<String> = segments
            .iter()
            .flat_map(|s| s.words.clone().unwrap_or_default())
            .map(|w| w.text)
            .collect();

        let mut remaining = input.iter();
        for text in &output {
            prop_assert!(remaining.any(|candidate| candidate == text));
        }
    }

    #[test]
    fn normalization_is_idempotent(words in raw_words(), duration_centis in 1u32..4000) {
        let duration = Some(duration_centis as f64 / 100.0);
        let segmenter = TranscriptSegmenter::with_defaults();
        let once = segmenter.segment_words(&words, duration);
        let twice = normalize_segments(once.clone(), duration);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn clamped_segments_stay_inside_duration(words in raw_words(), duration_centis in 1u32..4000) {
        let duration = duration_centis as f64 / 100.0;
        let segments = TranscriptSegmenter::with_defaults().segment_words(&words, Some(duration));
        assert_well_formed(&segments);
        for segment in &segments {
            prop_assert!(segment.start < duration);
            prop_assert!(segment.end <= duration);
        }
    }

    #[test]
    fn planner_partitions_frame_range(total in 0u64..5000, concurrency in 1usize..32) {
        let ranges = plan_ranges(total, concurrency);
        prop_assert!(ranges.len() <= concurrency);

        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            prop_assert!(range.end > range.start);
            next = range.end;
        }
        prop_assert_eq!(next, total);
    }

    #[test]
    fn word_phase_never_moves_backward(
        start in 0.0f64..5.0,
        duration in 0.0f64..2.0,
        linger in 0.0f64..2.0,
    ) {
        let config = VisibilityConfig::default();
        let word = Word::new("w", start, start + duration);
        let state = WordState::new(&word, start + duration + linger, &config);

        let mut previous = state.classify(-1.0);
        for step in 0..1000 {
            let phase = state.classify(step as f64 * 0.01);
            prop_assert!(phase >= previous);
            previous = phase;
        }
    }

    #[test]
    fn active_caption_is_preferred(words in raw_words(), t in 0.0f64..30.0) {
        let config = VisibilityConfig::default();
        let captions = TranscriptSegmenter::with_defaults().segment_words(&words, None);
        let is_active = |segment: &Segment| {
            segment
                .timed_words()
                .is_some_and(|ws| ws.iter().any(|w| w.start <= t && t <= w.end))
        };

        if captions.iter().any(is_active) {
            let selected = select_caption(&captions, t, &config);
            prop_assert!(selected.is_some_and(is_active));
        }
    }
}
