//! Font discovery and per-weight face loading.
//!
//! One [`FontBook`] is built per job and shared read-only between workers.
//! Each worker then loads its own [`WeightFonts`] from it, so glyph caches
//! and parsed faces are never shared across threads.

use std::sync::Arc;

use captionburn_caption_model::WeightClass;
use captionburn_common::config::FontConfig;
use captionburn_common::error::{CaptionburnError, CaptionburnResult};
use fontdb::{Database, Family, Query, Stretch, Style, Weight, ID};
use fontdue::{Font, FontSettings, LineMetrics};

use super::layout::TextMeasure;

/// Shared font database with a configured fallback family.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<Database>,
    fallback_family: String,
}

impl FontBook {
    /// Scan system fonts and configured font locations.
    pub fn load(config: &FontConfig) -> Self {
        let mut db = Database::new();
        if config.load_system_fonts {
            db.load_system_fonts();
        }
        for dir in &config.font_dirs {
            db.load_fonts_dir(dir);
        }
        for file in &config.font_files {
            if let Err(e) = db.load_font_file(file) {
                tracing::warn!(path = %file.display(), error = %e, "Failed to load font file");
            }
        }
        db.set_sans_serif_family(config.fallback_family.clone());

        tracing::debug!(
            faces = db.len(),
            fallback = %config.fallback_family,
            "Font database loaded"
        );

        Self::from_database(db, config.fallback_family.clone())
    }

    pub fn from_database(db: Database, fallback_family: impl Into<String>) -> Self {
        Self {
            db: Arc::new(db),
            fallback_family: fallback_family.into(),
        }
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn fallback_family(&self) -> &str {
        &self.fallback_family
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Best face for `family` at `weight`, falling back to the configured
    /// family and then to any sans-serif face.
    pub fn resolve(&self, family: &str, weight: WeightClass) -> Option<ID> {
        let families = [
            Family::Name(family),
            Family::Name(&self.fallback_family),
            Family::SansSerif,
        ];
        self.db.query(&Query {
            families: &families,
            weight: Weight(weight.numeric()),
            stretch: Stretch::Normal,
            style: Style::Normal,
        })
    }

    /// Primary family name of a face.
    pub fn family_name(&self, id: ID) -> Option<String> {
        self.db
            .face(id)
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone())
    }

    /// Parse a face for glyph rasterization.
    pub fn load_face(&self, id: ID) -> Option<Font> {
        self.db
            .with_face_data(id, |data, index| {
                let settings = FontSettings {
                    collection_index: index,
                    ..FontSettings::default()
                };
                Font::from_bytes(data, settings).ok()
            })
            .flatten()
    }
}

/// One parsed face per weight class.
pub struct WeightFonts {
    fonts: Vec<Font>,
    families: Vec<String>,
}

impl WeightFonts {
    pub fn load(book: &FontBook, family: &str) -> CaptionburnResult<Self> {
        let mut fonts = Vec::with_capacity(WeightClass::ALL.len());
        let mut families = Vec::with_capacity(WeightClass::ALL.len());

        for weight in WeightClass::ALL {
            let id = book.resolve(family, weight).ok_or_else(|| {
                CaptionburnError::render_backend(format!(
                    "no font found for family '{family}' (fallback '{}')",
                    book.fallback_family()
                ))
            })?;
            let font = book.load_face(id).ok_or_else(|| {
                CaptionburnError::render_backend(format!("failed to parse font face for '{family}'"))
            })?;
            families.push(book.family_name(id).unwrap_or_else(|| family.to_string()));
            fonts.push(font);
        }

        tracing::trace!(requested = family, resolved = ?families, "Resolved caption fonts");
        Ok(Self { fonts, families })
    }

    fn index(weight: WeightClass) -> usize {
        match weight {
            WeightClass::Regular => 0,
            WeightClass::Medium => 1,
            WeightClass::Semibold => 2,
            WeightClass::Bold => 3,
        }
    }

    pub fn font(&self, weight: WeightClass) -> &Font {
        &self.fonts[Self::index(weight)]
    }

    /// Family name the face for `weight` was resolved to.
    pub fn family(&self, weight: WeightClass) -> &str {
        &self.families[Self::index(weight)]
    }

    pub fn line_metrics(&self, weight: WeightClass, size: f32) -> Option<LineMetrics> {
        self.font(weight).horizontal_line_metrics(size)
    }
}

impl TextMeasure for WeightFonts {
    fn text_width(&self, text: &str, weight: WeightClass, size: f32) -> f32 {
        let font = self.font(weight);
        let mut width = 0.0;
        let mut previous = None;
        for c in text.chars() {
            if let Some(prev) = previous {
                width += font.horizontal_kern(prev, c, size).unwrap_or(0.0);
            }
            width += font.metrics(c, size).advance_width;
            previous = Some(c);
        }
        width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_book_resolves_nothing() {
        let book = FontBook::from_database(Database::new(), "DejaVu Sans");
        assert!(book.is_empty());
        assert!(book.resolve("Inter", WeightClass::Bold).is_none());
        assert!(WeightFonts::load(&book, "Inter").is_err());
    }

    #[test]
    fn test_system_fonts_measure_positive_widths() {
        let book = FontBook::load(&FontConfig::default());
        let Ok(fonts) = WeightFonts::load(&book, "DejaVu Sans") else {
            eprintln!("skipping: no usable system fonts");
            return;
        };

        let narrow = fonts.text_width("i", WeightClass::Regular, 48.0);
        let wide = fonts.text_width("WWW", WeightClass::Regular, 48.0);
        assert!(narrow > 0.0);
        assert!(wide > narrow);
        assert!(fonts.line_metrics(WeightClass::Bold, 48.0).is_some());
    }
}
