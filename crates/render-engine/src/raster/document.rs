//! Declarative rasterizer: one SVG document per timestamp, rendered by resvg.
//!
//! The document mirrors the canvas backend layer for layer: box shadow,
//! box with border, two blurred glow layers of the words in stroke color,
//! then the words themselves.

use std::sync::Arc;

use captionburn_caption_model::{CaptionPayload, StyleSpec, WeightClass};
use captionburn_common::config::RenderTuning;
use captionburn_common::error::{CaptionburnError, CaptionburnResult};
use resvg::usvg;
use tiny_skia::{Pixmap, Transform};

use super::fonts::FontBook;
use super::layout::CaptionLayout;
use super::{not_loaded, FrameRasterizer, JobContext, RenderSettings};

pub struct DocumentRasterizer {
    book: FontBook,
    settings: RenderSettings,
    options: usvg::Options<'static>,
    job: Option<JobContext>,
    blank: Vec<u8>,
}

impl DocumentRasterizer {
    pub fn new(book: FontBook, settings: RenderSettings) -> Self {
        let options = usvg::Options {
            fontdb: book.database(),
            font_family: book.fallback_family().to_string(),
            ..usvg::Options::default()
        };
        Self {
            book,
            settings,
            options,
            job: None,
            blank: Vec::new(),
        }
    }

    fn rasterize(&self, svg: &str, width: u32, height: u32) -> CaptionburnResult<Vec<u8>> {
        let tree = usvg::Tree::from_str(svg, &self.options).map_err(|e| {
            CaptionburnError::render_backend(format!("invalid caption document: {e}"))
        })?;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            CaptionburnError::render_backend(format!("cannot allocate {width}x{height} pixmap"))
        })?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
        pixmap
            .encode_png()
            .map_err(|e| CaptionburnError::render_backend(format!("PNG encoding failed: {e}")))
    }
}

impl FrameRasterizer for DocumentRasterizer {
    fn name(&self) -> &'static str {
        "document"
    }

    fn load(&mut self, payload: Arc<CaptionPayload>) -> CaptionburnResult<()> {
        let job = JobContext::new(payload, &self.book, &self.settings)?;
        self.blank = self.rasterize(&empty_document(job.width, job.height), job.width, job.height)?;
        self.job = Some(job);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.job.is_some()
    }

    fn render_frame(&mut self, timestamp_secs: f64) -> CaptionburnResult<Vec<u8>> {
        let job = self.job.as_ref().ok_or_else(not_loaded)?;
        let Some(layout) = job.layout_at(timestamp_secs, &self.settings.tuning) else {
            return Ok(self.blank.clone());
        };

        let family = |weight: WeightClass| job.fonts.family(weight).to_string();
        let svg = build_document(
            &layout,
            &job.payload.style,
            &self.settings.tuning,
            job.width,
            job.height,
            &family,
        );
        self.rasterize(&svg, job.width, job.height)
    }
}

fn empty_document(width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"/>"#
    )
}

/// Build the SVG document for one laid-out caption.
///
/// `family` maps a weight class to the font family name to reference.
pub fn build_document(
    layout: &CaptionLayout,
    style: &StyleSpec,
    tuning: &RenderTuning,
    width: u32,
    height: u32,
    family: &dyn Fn(WeightClass) -> String,
) -> String {
    let mut svg = String::with_capacity(2048);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));

    let background = style.effective_background();
    let stroke = style.effective_stroke();

    svg.push_str("<defs>");
    if background.is_some() && tuning.shadow_opacity > 0.0 {
        svg.push_str(&blur_filter("shadow", tuning.shadow_blur / 2.0));
    }
    if let Some(stroke) = stroke {
        svg.push_str(&blur_filter("glow-outer", stroke.width));
        svg.push_str(&blur_filter("glow-inner", stroke.width / 2.0));
    }
    svg.push_str("</defs>");

    let b = layout.bounds;
    let radius = tuning.corner_radius.min(b.width / 2.0).min(b.height / 2.0).max(0.0);

    if let Some(background) = background {
        if tuning.shadow_opacity > 0.0 {
            svg.push_str(&format!(
                r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{radius:.2}" fill="#000000" fill-opacity="{:.3}" filter="url(#shadow)"/>"##,
                b.x,
                b.y + tuning.shadow_offset_y,
                b.width,
                b.height,
                tuning.shadow_opacity,
            ));
        }

        let border = match stroke {
            Some(stroke) => format!(
                r#" stroke="{}" stroke-opacity="{:.3}" stroke-width="{:.2}""#,
                stroke.color.to_hex_rgb(),
                stroke.color.alpha_f32(),
                stroke.width,
            ),
            None => String::new(),
        };
        svg.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{radius:.2}" fill="{}" fill-opacity="{:.3}"{border}/>"#,
            b.x,
            b.y,
            b.width,
            b.height,
            background.color.to_hex_rgb(),
            background.color.alpha_f32() * tuning.boosted_opacity(background.opacity),
        ));
    }

    if let Some(stroke) = stroke {
        for filter in ["glow-outer", "glow-inner"] {
            svg.push_str(&format!(
                r#"<g filter="url(#{filter})" fill="{}">"#,
                stroke.color.to_hex_rgb()
            ));
            push_words(&mut svg, layout, stroke.color.alpha_f32(), family);
            svg.push_str("</g>");
        }
    }

    svg.push_str(&format!(r#"<g fill="{}">"#, style.color.to_hex_rgb()));
    push_words(&mut svg, layout, style.color.alpha_f32(), family);
    svg.push_str("</g></svg>");
    svg
}

fn blur_filter(id: &str, std_deviation: f32) -> String {
    format!(
        r#"<filter id="{id}" x="-50%" y="-50%" width="200%" height="200%"><feGaussianBlur stdDeviation="{std_deviation:.2}"/></filter>"#
    )
}

fn push_words(
    svg: &mut String,
    layout: &CaptionLayout,
    color_alpha: f32,
    family: &dyn Fn(WeightClass) -> String,
) {
    for word in &layout.words {
        if word.opacity <= 0.0 {
            continue;
        }
        svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="'{}', sans-serif" font-size="{:.2}" font-weight="{}" text-anchor="middle" dominant-baseline="central" fill-opacity="{:.3}">{}</text>"#,
            word.center_x(),
            word.center_y,
            escape_xml(&family(word.weight)),
            layout.font_size,
            word.weight.numeric(),
            color_alpha * word.opacity,
            escape_xml(&word.text),
        ));
    }
}

/// Escape text for use in XML content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
