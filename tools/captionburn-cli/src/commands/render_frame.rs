//! Render one overlay frame for previewing styles and backends.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use captionburn_common::config::{AppConfig, RasterizerKind};
use captionburn_common::timecode::parse_clock;
use captionburn_render_engine::{create_rasterizer, FontBook, RenderSettings};

use super::load_payload;

/// Canvas used when neither the payload nor the flags give one.
const DEFAULT_CANVAS: (u32, u32) = (1920, 1080);

/// Seconds (`12.5`) or clock form (`00:00:12.500`).
pub(crate) fn parse_timestamp(value: &str) -> anyhow::Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .or_else(|| parse_clock(value))
        .filter(|t| t.is_finite() && *t >= 0.0)
        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp '{value}'"))
}

pub async fn run(
    config: &AppConfig,
    payload_path: PathBuf,
    time: String,
    output: PathBuf,
    rasterizer: Option<RasterizerKind>,
    width: Option<u32>,
    height: Option<u32>,
) -> anyhow::Result<()> {
    let timestamp = parse_timestamp(&time)?;
    let mut payload = load_payload(&payload_path)?;

    let (w, h) = payload.canvas_size(DEFAULT_CANVAS.0, DEFAULT_CANVAS.1);
    payload.width = Some(width.unwrap_or(w));
    payload.height = Some(height.unwrap_or(h));

    let kind = rasterizer.unwrap_or(config.export.rasterizer);
    let settings = RenderSettings::from_config(config);
    let fonts = config.fonts.clone();

    let png = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
        let book = FontBook::load(&fonts);
        if book.is_empty() {
            anyhow::bail!("No fonts available; configure fonts.font_dirs or fonts.font_files");
        }
        let mut rasterizer = create_rasterizer(kind, book, settings);
        rasterizer.load(Arc::new(payload))?;
        Ok(rasterizer.render_frame(timestamp)?)
    })
    .await??;

    std::fs::write(&output, &png)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Rendered {} frame at {timestamp:.3}s to {} ({} bytes)",
        kind.as_str(),
        output.display(),
        png.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_forms() {
        assert_eq!(parse_timestamp("1.25").unwrap(), 1.25);
        assert_eq!(parse_timestamp("00:01:02.5").unwrap(), 62.5);
        assert!(parse_timestamp("-1").is_err());
        assert!(parse_timestamp("soon").is_err());
    }
}
