//! Subtitle sidecars in SRT and WebVTT formats.
//!
//! WebVTT cues of word-timed captions carry inline timestamp tags
//! (`<00:00:01.200>`) before every word after the first, so players that
//! support karaoke-style cues highlight words in step with the burned-in
//! overlay.

use captionburn_caption_model::Segment;
use captionburn_common::error::CaptionburnResult;
use captionburn_common::timecode::format_clock;

/// Generate SRT subtitle content from captions.
pub fn generate_srt(segments: &[Segment]) -> String {
    let mut output = String::new();

    for (i, segment) in segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_clock(segment.start, ','),
            format_clock(segment.end, ','),
        ));
        output.push_str(&segment.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content from captions.
pub fn generate_vtt(segments: &[Segment]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for segment in segments {
        output.push_str(&format!(
            "{} --> {}\n",
            format_clock(segment.start, '.'),
            format_clock(segment.end, '.'),
        ));
        output.push_str(&vtt_cue_text(segment));
        output.push_str("\n\n");
    }

    output
}

fn vtt_cue_text(segment: &Segment) -> String {
    let Some(words) = segment.timed_words() else {
        return escape_vtt(&segment.text);
    };

    let mut text = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            text.push_str(&format!(" <{}>", format_clock(word.start, '.')));
        }
        text.push_str(&escape_vtt(&word.text));
    }
    text
}

fn escape_vtt(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Save subtitles to a file; `.vtt` selects WebVTT, anything else SRT.
pub fn save_subtitles(segments: &[Segment], path: &std::path::Path) -> CaptionburnResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("vtt") => generate_vtt(segments),
        _ => generate_srt(segments),
    };
    std::fs::write(path, content)?;
    tracing::debug!(path = %path.display(), cues = segments.len(), "Wrote subtitles");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionburn_caption_model::{CaptionPosition, Word};

    fn segment(text: &str, start: f64, end: f64, words: Option<Vec<Word>>) -> Segment {
        Segment {
            id: 0,
            text: text.to_string(),
            start,
            end,
            words,
            position: CaptionPosition::default(),
        }
    }

    #[test]
    fn test_srt_generation() {
        let segments = vec![
            segment("Hello world", 0.0, 2.5, None),
            segment("This is a test", 3.0, 5.0, None),
        ];

        let srt = generate_srt(&segments);
        assert!(srt.contains("1\n00:00:00,000 --> 00:00:02,500\nHello world"));
        assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nThis is a test"));
    }

    #[test]
    fn test_vtt_has_inline_word_timestamps() {
        let segments = vec![segment(
            "one minute",
            61.5,
            63.0,
            Some(vec![Word::new("one", 61.5, 62.0), Word::new("minute", 62.2, 63.0)]),
        )];

        let vtt = generate_vtt(&segments);
        assert!(vtt.starts_with("WEBVTT\n"));
        assert!(vtt.contains("00:01:01.500 --> 00:01:03.000\none <00:01:02.200>minute"));
    }

    #[test]
    fn test_vtt_escapes_markup() {
        let vtt = generate_vtt(&[segment("a<b & c", 0.0, 1.0, None)]);
        assert!(vtt.contains("a&lt;b &amp; c"));
    }

    #[test]
    fn test_save_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let segments = vec![segment("hi", 0.0, 1.0, None)];

        let vtt_path = dir.path().join("captions.vtt");
        save_subtitles(&segments, &vtt_path).unwrap();
        assert!(std::fs::read_to_string(&vtt_path).unwrap().starts_with("WEBVTT"));

        let srt_path = dir.path().join("captions.srt");
        save_subtitles(&segments, &srt_path).unwrap();
        assert!(std::fs::read_to_string(&srt_path).unwrap().starts_with("1\n"));
    }
}
