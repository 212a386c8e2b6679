//! Caption geometry shared by both rasterizers.
//!
//! Word slots are measured at the bold weight, the widest a word ever
//! gets, so positions do not shift while words change weight. Each word
//! is drawn centered in its slot.

use captionburn_caption_model::{StyleSpec, WeightClass};
use captionburn_caption_timing::CaptionFrame;
use captionburn_common::config::RenderTuning;

/// Text measurement provided by the backend's fonts.
pub trait TextMeasure {
    /// Advance width of `text` in pixels.
    fn text_width(&self, text: &str, weight: WeightClass, size: f32) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A word at its final position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    /// Left edge of the word slot.
    pub x: f32,
    pub slot_width: f32,
    /// Vertical center of the word's line.
    pub center_y: f32,
    pub opacity: f32,
    pub weight: WeightClass,
}

impl PlacedWord {
    pub fn center_x(&self) -> f32 {
        self.x + self.slot_width / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    /// Background box including padding.
    pub bounds: BoxRect,
    pub font_size: f32,
    pub line_height: f32,
    pub line_count: usize,
    pub words: Vec<PlacedWord>,
}

/// Lay out a resolved caption frame on a `width` x `height` canvas.
///
/// Returns `None` when the frame has no words.
pub fn layout_caption(
    frame: &CaptionFrame,
    style: &StyleSpec,
    tuning: &RenderTuning,
    width: u32,
    height: u32,
    measure: &dyn TextMeasure,
) -> Option<CaptionLayout> {
    if frame.words.is_empty() {
        return None;
    }

    let font_size = style.font_size;
    let gap = font_size * tuning.word_gap_em;
    let line_height = font_size * tuning.line_height;
    let max_text_width =
        (width as f32 * tuning.max_width_ratio - 2.0 * tuning.padding_x).max(font_size);

    let slots: Vec<f32> = frame
        .words
        .iter()
        .map(|w| measure.text_width(&w.text, WeightClass::Bold, font_size))
        .collect();

    // Greedy wrap: (first word index, end index, line width).
    let mut lines: Vec<(usize, usize, f32)> = Vec::new();
    let mut line_start = 0;
    let mut line_width = 0.0f32;
    for (i, slot) in slots.iter().enumerate() {
        let candidate = if i == line_start {
            *slot
        } else {
            line_width + gap + slot
        };
        if i > line_start && candidate > max_text_width {
            lines.push((line_start, i, line_width));
            line_start = i;
            line_width = *slot;
        } else {
            line_width = candidate;
        }
    }
    lines.push((line_start, slots.len(), line_width));

    let block_width = lines.iter().map(|(_, _, w)| *w).fold(0.0, f32::max);
    let block_height = lines.len() as f32 * line_height;
    let box_width = block_width + 2.0 * tuning.padding_x;
    let box_height = block_height + 2.0 * tuning.padding_y;

    let (anchor_x, anchor_y) = frame.position.to_pixels(width, height);
    let box_x = (anchor_x - box_width / 2.0).clamp(0.0, (width as f32 - box_width).max(0.0));
    let box_y = (anchor_y - box_height / 2.0).clamp(0.0, (height as f32 - box_height).max(0.0));

    let mut words = Vec::with_capacity(frame.words.len());
    for (line_index, (start, end, line_width)) in lines.iter().enumerate() {
        let mut x = box_x + tuning.padding_x + (block_width - line_width) / 2.0;
        let center_y = box_y + tuning.padding_y + (line_index as f32 + 0.5) * line_height;
        for i in *start..*end {
            let word = &frame.words[i];
            words.push(PlacedWord {
                text: word.text.clone(),
                x,
                slot_width: slots[i],
                center_y,
                opacity: word.opacity,
                weight: word.weight,
            });
            x += slots[i] + gap;
        }
    }

    Some(CaptionLayout {
        bounds: BoxRect {
            x: box_x,
            y: box_y,
            width: box_width,
            height: box_height,
        },
        font_size,
        line_height,
        line_count: lines.len(),
        words,
    })
}
