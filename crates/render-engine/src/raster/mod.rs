//! Caption overlay rasterization.
//!
//! A [`FrameRasterizer`] receives the caption payload once per job and then
//! answers any number of timestamp queries with a transparent PNG overlay.
//! Two interchangeable backends exist:
//!
//! - [`document::DocumentRasterizer`] writes an SVG document per timestamp
//!   and renders it with resvg.
//! - [`canvas::CanvasRasterizer`] paints directly on a tiny-skia pixmap
//!   with fontdue glyph coverage.
//!
//! Both go through [`layout::layout_caption`] so caption geometry is the
//! same whichever backend is configured. A rasterizer instance is a
//! rendering context: it is owned by exactly one worker.

pub mod blur;
pub mod canvas;
pub mod document;
pub mod fonts;
pub mod layout;

use std::sync::Arc;

use captionburn_caption_model::{CaptionPayload, WeightClass};
use captionburn_caption_timing::{resolve_frame, VisibilityConfig};
use captionburn_common::config::{AppConfig, RasterizerKind, RenderTuning};
use captionburn_common::error::{CaptionburnError, CaptionburnResult};

use self::fonts::{FontBook, WeightFonts};
use self::layout::{layout_caption, CaptionLayout};

/// Renders caption overlays for one job.
pub trait FrameRasterizer: Send {
    /// Backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Receive the job's payload. Called once, before any frame.
    fn load(&mut self, payload: Arc<CaptionPayload>) -> CaptionburnResult<()>;

    /// Whether frames can be requested.
    fn is_ready(&self) -> bool;

    /// Render the overlay for a playback timestamp as PNG bytes.
    fn render_frame(&mut self, timestamp_secs: f64) -> CaptionburnResult<Vec<u8>>;
}

/// Settings shared by both backends.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub tuning: RenderTuning,
    pub visibility: VisibilityConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tuning: RenderTuning::default(),
            visibility: VisibilityConfig::default(),
        }
    }
}

impl RenderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tuning: config.tuning,
            visibility: VisibilityConfig::default().with_lookahead(config.export.lookahead_secs),
        }
    }
}

/// Build a rasterizer of the configured kind.
pub fn create_rasterizer(
    kind: RasterizerKind,
    fonts: FontBook,
    settings: RenderSettings,
) -> Box<dyn FrameRasterizer> {
    match kind {
        RasterizerKind::Document => Box::new(document::DocumentRasterizer::new(fonts, settings)),
        RasterizerKind::Canvas => Box::new(canvas::CanvasRasterizer::new(fonts, settings)),
    }
}

/// Per-job state both backends derive from the payload.
pub(crate) struct JobContext {
    pub payload: Arc<CaptionPayload>,
    pub width: u32,
    pub height: u32,
    pub visibility: VisibilityConfig,
    pub fonts: WeightFonts,
}

impl JobContext {
    pub fn new(
        payload: Arc<CaptionPayload>,
        book: &FontBook,
        settings: &RenderSettings,
    ) -> CaptionburnResult<Self> {
        let (Some(width), Some(height)) = (payload.width, payload.height) else {
            return Err(CaptionburnError::render_backend(
                "payload canvas size must be resolved before loading",
            ));
        };
        if width == 0 || height == 0 {
            return Err(CaptionburnError::render_backend(format!(
                "invalid canvas size {width}x{height}"
            )));
        }

        let fonts = WeightFonts::load(book, &payload.style.font_family)?;
        let visibility = settings
            .visibility
            .with_plain_weight(WeightClass::from_numeric(payload.style.font_weight));

        Ok(Self {
            payload,
            width,
            height,
            visibility,
            fonts,
        })
    }

    /// Layout of the caption visible at a playback timestamp, if any.
    pub fn layout_at(&self, timestamp_secs: f64, tuning: &RenderTuning) -> Option<CaptionLayout> {
        let frame = resolve_frame(&self.payload.segments, timestamp_secs, &self.visibility)?;
        if !frame.is_visible() {
            return None;
        }
        layout_caption(
            &frame,
            &self.payload.style,
            tuning,
            self.width,
            self.height,
            &self.fonts,
        )
    }
}

pub(crate) fn not_loaded() -> CaptionburnError {
    CaptionburnError::render_backend("render_frame called before load")
}

/// Straight-alpha color channel to premultiplied.
pub(crate) fn premultiply(channel: u8, alpha: f32) -> u8 {
    (channel as f32 * alpha).round().clamp(0.0, 255.0) as u8
}
