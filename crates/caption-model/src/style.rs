//! Caption styling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// An sRGB color with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Alpha as a fraction in `[0, 1]`.
    pub fn alpha_f32(&self) -> f32 {
        self.a as f32 / 255.0
    }

    /// `#rrggbb`, dropping alpha.
    pub fn to_hex_rgb(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ModelError::InvalidColor {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let hex = value
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| invalid("expected a leading '#'"))?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("non-hex digit"));
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);

        let parsed = match hex.len() {
            3 => (nibble(0), nibble(1), nibble(2), Ok(255)),
            4 => (nibble(0), nibble(1), nibble(2), nibble(3)),
            6 => (byte(0), byte(2), byte(4), Ok(255)),
            8 => (byte(0), byte(2), byte(4), byte(6)),
            _ => return Err(invalid("expected 3, 4, 6 or 8 hex digits")),
        };

        match parsed {
            (Ok(r), Ok(g), Ok(b), Ok(a)) => Ok(Color { r, g, b, a }),
            _ => Err(invalid("non-hex digit")),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "{}", self.to_hex_rgb())
        } else {
            write!(f, "{}{:02x}", self.to_hex_rgb(), self.a)
        }
    }
}

/// The four weight classes a word cycles through while animating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightClass {
    Regular,
    Medium,
    Semibold,
    Bold,
}

impl WeightClass {
    pub const ALL: [WeightClass; 4] = [
        WeightClass::Regular,
        WeightClass::Medium,
        WeightClass::Semibold,
        WeightClass::Bold,
    ];

    /// CSS numeric weight.
    pub fn numeric(self) -> u16 {
        match self {
            WeightClass::Regular => 400,
            WeightClass::Medium => 500,
            WeightClass::Semibold => 600,
            WeightClass::Bold => 700,
        }
    }

    /// Nearest class for a numeric weight.
    pub fn from_numeric(weight: u16) -> Self {
        match weight {
            0..=449 => WeightClass::Regular,
            450..=549 => WeightClass::Medium,
            550..=649 => WeightClass::Semibold,
            _ => WeightClass::Bold,
        }
    }
}

/// Box drawn behind the caption text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundStyle {
    pub color: Color,
    /// Configured opacity in `[0, 1]` before backend correction.
    pub opacity: f32,
}

/// Glow around the text and border around the box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Color,
    /// Width in pixels.
    pub width: f32,
}

/// Look of the burned-in captions. Immutable for the duration of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleSpec {
    pub font_family: String,
    /// Font size in pixels of the payload canvas.
    pub font_size: f32,
    /// Weight used for plain-text captions.
    pub font_weight: u16,
    pub color: Color,
    pub background: Option<BackgroundStyle>,
    pub stroke: Option<StrokeStyle>,
}

impl Default for StyleSpec {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: 48.0,
            font_weight: 700,
            color: Color::WHITE,
            background: Some(BackgroundStyle {
                color: Color::BLACK,
                opacity: 0.6,
            }),
            stroke: None,
        }
    }
}

impl StyleSpec {
    /// Stroke settings, ignoring zero-width strokes.
    pub fn effective_stroke(&self) -> Option<StrokeStyle> {
        self.stroke.filter(|stroke| stroke.width > 0.0)
    }

    /// Background settings, ignoring fully transparent boxes.
    pub fn effective_background(&self) -> Option<BackgroundStyle> {
        self.background.filter(|bg| bg.opacity > 0.0)
    }
}
