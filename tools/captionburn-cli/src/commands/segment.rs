//! Group a transcript into display captions.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use captionburn_caption_model::Transcript;
use captionburn_caption_timing::{generate_srt, generate_vtt, segment_transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Srt,
    Vtt,
}

fn pick_format(format: Option<&str>, output: Option<&PathBuf>) -> anyhow::Result<OutputFormat> {
    let name = match format {
        Some(f) => f.to_ascii_lowercase(),
        None => output
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_else(|| "json".to_string()),
    };
    match name.as_str() {
        "json" => Ok(OutputFormat::Json),
        "srt" => Ok(OutputFormat::Srt),
        "vtt" => Ok(OutputFormat::Vtt),
        other => Err(anyhow::anyhow!("Unknown format: {other}. Use: json, srt, vtt")),
    }
}

pub fn run(
    transcript: PathBuf,
    duration: Option<f64>,
    format: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let format = pick_format(format.as_deref(), output.as_ref())?;

    let content = std::fs::read_to_string(&transcript)
        .with_context(|| format!("Failed to read transcript {}", transcript.display()))?;
    let parsed = Transcript::from_json(&content)
        .with_context(|| format!("Invalid transcript {}", transcript.display()))?;
    parsed
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid transcript: {e}"))?;

    let segments = segment_transcript(&parsed, duration.or(parsed.duration()));
    tracing::info!(captions = segments.len(), ?format, "Segmented transcript");

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&segments)?,
        OutputFormat::Srt => generate_srt(&segments),
        OutputFormat::Vtt => generate_vtt(&segments),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} captions to {}", segments.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}
