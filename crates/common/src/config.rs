//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CaptionburnError, CaptionburnResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default export settings.
    pub export: ExportDefaults,

    /// Font discovery settings.
    pub fonts: FontConfig,

    /// Empirically tuned rendering constants.
    pub tuning: RenderTuning,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which frame rasterizer implementation renders caption overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerKind {
    /// Declarative document (SVG markup) rendered by resvg.
    Document,
    /// Direct 2D drawing on a pixmap with glyph metrics.
    #[default]
    Canvas,
}

impl RasterizerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RasterizerKind::Document => "document",
            RasterizerKind::Canvas => "canvas",
        }
    }
}

impl std::str::FromStr for RasterizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" | "dom" | "svg" => Ok(RasterizerKind::Document),
            "canvas" | "2d" => Ok(RasterizerKind::Canvas),
            other => Err(format!("unknown rasterizer '{other}' (use: document, canvas)")),
        }
    }
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Export frame rate.
    pub fps: u32,

    /// Number of parallel frame workers.
    pub concurrency: usize,

    /// Rasterizer backend.
    pub rasterizer: RasterizerKind,

    /// Lookahead added to every playback timestamp before caption
    /// selection (seconds).
    pub lookahead_secs: f64,

    /// Longest accepted source duration (seconds). `None` disables the cap.
    pub max_duration_secs: Option<f64>,

    /// Longest time without a single rendered frame before the job fails.
    pub frame_timeout_secs: u64,

    /// Upper bound for one ffmpeg invocation.
    pub tool_timeout_secs: u64,

    /// How long a terminal progress state stays queryable.
    pub progress_retention_secs: u64,

    /// Delay before the job's temporary files are removed.
    pub cleanup_grace_secs: u64,

    /// Video bitrate in kbps (0 = let the encoder pick via CRF).
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            concurrency: 4,
            rasterizer: RasterizerKind::default(),
            lookahead_secs: 0.05,
            max_duration_secs: Some(60.0),
            frame_timeout_secs: 30,
            tool_timeout_secs: 600,
            progress_retention_secs: 30,
            cleanup_grace_secs: 5,
            video_bitrate_kbps: 0,
            audio_bitrate_kbps: 192,
        }
    }
}

/// Where fonts are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Whether to scan the operating system's font directories.
    pub load_system_fonts: bool,

    /// Extra directories scanned recursively for font files.
    pub font_dirs: Vec<PathBuf>,

    /// Extra individual font files.
    pub font_files: Vec<PathBuf>,

    /// Family used when the requested family is not installed.
    pub fallback_family: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            load_system_fonts: true,
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            fallback_family: "DejaVu Sans".to_string(),
        }
    }
}

/// Layout and compositing constants shared by both rasterizers.
///
/// `background_opacity_boost` and `line_height` were tuned by eye so the
/// document and canvas paths match; keep them configurable rather than
/// derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderTuning {
    /// Multiplier applied to the configured background opacity (capped at 1).
    pub background_opacity_boost: f32,

    /// Line height as a multiple of the font size.
    pub line_height: f32,

    /// Maximum caption width as a fraction of the frame width.
    pub max_width_ratio: f32,

    /// Horizontal box padding (px).
    pub padding_x: f32,

    /// Vertical box padding (px).
    pub padding_y: f32,

    /// Box corner radius (px).
    pub corner_radius: f32,

    /// Gap between words as a multiple of the font size.
    pub word_gap_em: f32,

    /// Box shadow blur (px).
    pub shadow_blur: f32,

    /// Box shadow vertical offset (px).
    pub shadow_offset_y: f32,

    /// Box shadow opacity (black).
    pub shadow_opacity: f32,
}

impl Default for RenderTuning {
    fn default() -> Self {
        Self {
            background_opacity_boost: 1.15,
            line_height: 1.153,
            max_width_ratio: 0.9,
            padding_x: 16.0,
            padding_y: 10.0,
            corner_radius: 8.0,
            word_gap_em: 0.25,
            shadow_blur: 8.0,
            shadow_offset_y: 2.0,
            shadow_opacity: 0.3,
        }
    }
}

impl RenderTuning {
    /// Effective box opacity for a configured background opacity.
    pub fn boosted_opacity(&self, opacity: f32) -> f32 {
        (opacity * self.background_opacity_boost).clamp(0.0, 1.0)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "captionburn=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from a path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }
        match Self::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{e}, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from a file that must exist and parse.
    pub fn from_file(config_path: &Path) -> CaptionburnResult<Self> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            CaptionburnError::config(format!("cannot read {}: {e}", config_path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CaptionburnError::config(format!("invalid config {}: {e}", config_path.display()))
        })
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("captionburn").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"export": {"fps": 25, "rasterizer": "document"}}"#).unwrap();
        assert_eq!(config.export.fps, 25);
        assert_eq!(config.export.rasterizer, RasterizerKind::Document);
        assert_eq!(config.export.concurrency, 4);
        assert!((config.tuning.line_height - 1.153).abs() < 1e-6);
    }

    #[test]
    fn test_boosted_opacity_caps_at_one() {
        let tuning = RenderTuning::default();
        assert!((tuning.boosted_opacity(0.6) - 0.69).abs() < 1e-6);
        assert_eq!(tuning.boosted_opacity(0.95), 1.0);
    }

    #[test]
    fn test_rasterizer_kind_parsing() {
        assert_eq!("SVG".parse::<RasterizerKind>(), Ok(RasterizerKind::Document));
        assert_eq!("canvas".parse::<RasterizerKind>(), Ok(RasterizerKind::Canvas));
        assert!("opengl".parse::<RasterizerKind>().is_err());
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CaptionburnError::Config { .. }));
        assert!(err.to_string().contains("invalid config"));
        assert_eq!(AppConfig::load_from(&path).export.fps, 30);

        let missing = AppConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, CaptionburnError::Config { .. }));
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let config = AppConfig::load_from(std::path::Path::new("/nonexistent/captionburn.json"));
        assert_eq!(config.export.fps, 30);
        assert_eq!(config.fonts.fallback_family, "DejaVu Sans");
    }
}
