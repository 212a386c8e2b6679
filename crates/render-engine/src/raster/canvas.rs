//! Direct 2D rasterizer: tiny-skia shapes plus fontdue glyph coverage.

use std::sync::Arc;

use captionburn_caption_model::{CaptionPayload, Color};
use captionburn_common::config::RenderTuning;
use captionburn_common::error::{CaptionburnError, CaptionburnResult};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform};

use super::blur::blur_rgba;
use super::fonts::{FontBook, WeightFonts};
use super::layout::{CaptionLayout, TextMeasure};
use super::{not_loaded, premultiply, FrameRasterizer, JobContext, RenderSettings};

/// Cubic control point distance for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

pub struct CanvasRasterizer {
    book: FontBook,
    settings: RenderSettings,
    job: Option<JobContext>,
    blank: Vec<u8>,
}

impl CanvasRasterizer {
    pub fn new(book: FontBook, settings: RenderSettings) -> Self {
        Self {
            book,
            settings,
            job: None,
            blank: Vec::new(),
        }
    }

    fn paint(&self, job: &JobContext, layout: &CaptionLayout) -> CaptionburnResult<Pixmap> {
        let style = &job.payload.style;
        let tuning = &self.settings.tuning;
        let mut pixmap = new_pixmap(job.width, job.height)?;

        let bounds = layout.bounds;
        let box_path = rounded_rect(
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height,
            tuning.corner_radius,
        );

        if let (Some(background), Some(path)) = (style.effective_background(), &box_path) {
            paint_shadow(&mut pixmap, path, tuning)?;
            let alpha = background.color.alpha_f32() * tuning.boosted_opacity(background.opacity);
            pixmap.fill_path(
                path,
                &solid(background.color, alpha),
                FillRule::Winding,
                Transform::identity(),
                None,
            );

            if let Some(stroke) = style.effective_stroke() {
                let outline = Stroke {
                    width: stroke.width,
                    ..Stroke::default()
                };
                pixmap.stroke_path(
                    path,
                    &solid(stroke.color, stroke.color.alpha_f32()),
                    &outline,
                    Transform::identity(),
                    None,
                );
            }
        }

        if let Some(stroke) = style.effective_stroke() {
            for blur in [2.0 * stroke.width, stroke.width] {
                let mut glow = new_pixmap(job.width, job.height)?;
                Surface::of(&mut glow).paint_words(&job.fonts, layout, stroke.color);
                blur_rgba(
                    glow.data_mut(),
                    job.width as usize,
                    job.height as usize,
                    blur / 2.0,
                );
                pixmap.draw_pixmap(
                    0,
                    0,
                    glow.as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
            }
        }

        Surface::of(&mut pixmap).paint_words(&job.fonts, layout, style.color);
        Ok(pixmap)
    }
}

impl FrameRasterizer for CanvasRasterizer {
    fn name(&self) -> &'static str {
        "canvas"
    }

    fn load(&mut self, payload: Arc<CaptionPayload>) -> CaptionburnResult<()> {
        let job = JobContext::new(payload, &self.book, &self.settings)?;
        self.blank = encode(&new_pixmap(job.width, job.height)?)?;
        self.job = Some(job);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.job.is_some()
    }

    fn render_frame(&mut self, timestamp_secs: f64) -> CaptionburnResult<Vec<u8>> {
        let job = self.job.as_ref().ok_or_else(not_loaded)?;
        match job.layout_at(timestamp_secs, &self.settings.tuning) {
            Some(layout) => encode(&self.paint(job, &layout)?),
            None => Ok(self.blank.clone()),
        }
    }
}

fn new_pixmap(width: u32, height: u32) -> CaptionburnResult<Pixmap> {
    Pixmap::new(width, height).ok_or_else(|| {
        CaptionburnError::render_backend(format!("cannot allocate {width}x{height} pixmap"))
    })
}

fn encode(pixmap: &Pixmap) -> CaptionburnResult<Vec<u8>> {
    pixmap
        .encode_png()
        .map_err(|e| CaptionburnError::render_backend(format!("PNG encoding failed: {e}")))
}

fn solid(color: Color, alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(
        color.r,
        color.g,
        color.b,
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
    );
    paint.anti_alias = true;
    paint
}

fn paint_shadow(pixmap: &mut Pixmap, path: &Path, tuning: &RenderTuning) -> CaptionburnResult<()> {
    if tuning.shadow_opacity <= 0.0 {
        return Ok(());
    }
    let mut shadow = new_pixmap(pixmap.width(), pixmap.height())?;
    shadow.fill_path(
        path,
        &solid(Color::BLACK, tuning.shadow_opacity),
        FillRule::Winding,
        Transform::from_translate(0.0, tuning.shadow_offset_y),
        None,
    );
    let (width, height) = (shadow.width() as usize, shadow.height() as usize);
    blur_rgba(shadow.data_mut(), width, height, tuning.shadow_blur / 2.0);
    pixmap.draw_pixmap(
        0,
        0,
        shadow.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(())
}

/// Rounded rectangle; the radius is capped at half the shorter side.
fn rounded_rect(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Option<Path> {
    let r = radius.min(width / 2.0).min(height / 2.0).max(0.0);
    let k = r * KAPPA;
    let (right, bottom) = (x + width, y + height);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.cubic_to(right - r + k, y, right, y + r - k, right, y + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.cubic_to(x + r - k, bottom, x, bottom - r + k, x, bottom - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Premultiplied RGBA8 buffer glyphs are blended into.
struct Surface<'a> {
    width: u32,
    height: u32,
    data: &'a mut [u8],
}

impl<'a> Surface<'a> {
    fn of(pixmap: &'a mut Pixmap) -> Self {
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            data: pixmap.data_mut(),
        }
    }

    fn paint_words(&mut self, fonts: &WeightFonts, layout: &CaptionLayout, color: Color) {
        let size = layout.font_size;
        for word in &layout.words {
            if word.opacity <= 0.0 {
                continue;
            }
            let font = fonts.font(word.weight);
            let text_width = fonts.text_width(&word.text, word.weight, size);
            let baseline = match fonts.line_metrics(word.weight, size) {
                Some(m) => word.center_y + (m.ascent + m.descent) / 2.0,
                None => word.center_y + size * 0.35,
            };
            let alpha = color.alpha_f32() * word.opacity;

            let mut pen_x = word.center_x() - text_width / 2.0;
            let mut previous = None;
            for c in word.text.chars() {
                if let Some(prev) = previous {
                    pen_x += font.horizontal_kern(prev, c, size).unwrap_or(0.0);
                }
                let (metrics, coverage) = font.rasterize(c, size);
                let x = (pen_x + metrics.xmin as f32).round() as i32;
                let y = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i32;
                self.blend_glyph(x, y, metrics.width, &coverage, color, alpha);
                pen_x += metrics.advance_width;
                previous = Some(c);
            }
        }
    }

    /// Source-over blend of a coverage mask in `color` at `alpha`.
    fn blend_glyph(
        &mut self,
        x0: i32,
        y0: i32,
        glyph_width: usize,
        coverage: &[u8],
        color: Color,
        alpha: f32,
    ) {
        if glyph_width == 0 {
            return;
        }
        for (row, mask) in coverage.chunks_exact(glyph_width).enumerate() {
            let y = y0 + row as i32;
            if y < 0 || y >= self.height as i32 {
                continue;
            }
            for (col, &cover) in mask.iter().enumerate() {
                let x = x0 + col as i32;
                if x < 0 || x >= self.width as i32 || cover == 0 {
                    continue;
                }

                let a = cover as f32 / 255.0 * alpha;
                let src = [
                    premultiply(color.r, a),
                    premultiply(color.g, a),
                    premultiply(color.b, a),
                    premultiply(255, a),
                ];
                let offset = (y as usize * self.width as usize + x as usize) * 4;
                for (channel, value) in src.iter().enumerate() {
                    let dst = self.data[offset + channel] as f32;
                    self.data[offset + channel] =
                        (*value as f32 + dst * (1.0 - a)).round().min(255.0) as u8;
                }
            }
        }
    }
}
