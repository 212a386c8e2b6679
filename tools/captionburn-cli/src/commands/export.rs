//! Burn captions into a video.

use std::io::Write;
use std::path::PathBuf;

use captionburn_caption_model::Stage;
use captionburn_caption_timing::save_subtitles;
use captionburn_common::config::{AppConfig, RasterizerKind};
use captionburn_render_engine::{export_captioned_video, ExportJob, ExportSettings, ProgressStore};

use super::load_payload;

/// Flags that override the configured export defaults.
#[derive(Debug, Default)]
pub struct Overrides {
    pub fps: Option<u32>,
    pub concurrency: Option<usize>,
    pub rasterizer: Option<RasterizerKind>,
    pub max_duration: Option<f64>,
    pub no_duration_cap: bool,
}

impl Overrides {
    fn apply(&self, settings: &mut ExportSettings) {
        if let Some(fps) = self.fps {
            settings.fps = fps;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency.max(1);
        }
        if let Some(kind) = self.rasterizer {
            settings.rasterizer = kind;
        }
        if self.no_duration_cap {
            settings.max_duration_secs = None;
        } else if let Some(cap) = self.max_duration {
            settings.max_duration_secs = Some(cap);
        }
    }
}

fn default_output(video: &std::path::Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    video.with_file_name(format!("{stem}.captioned.mp4"))
}

pub async fn run(
    config: &AppConfig,
    video: PathBuf,
    payload_path: PathBuf,
    output: Option<PathBuf>,
    overrides: Overrides,
    subtitles: Option<PathBuf>,
) -> anyhow::Result<()> {
    let payload = load_payload(&payload_path)?;
    let output_path = output.unwrap_or_else(|| default_output(&video));

    let mut settings = ExportSettings::from_config(config);
    overrides.apply(&mut settings);

    println!("Burning captions into: {}", video.display());
    println!("  Output: {}", output_path.display());
    println!("  Captions: {}", payload.segments.len());
    println!(
        "  Rasterizer: {} ({} workers @ {} fps)",
        settings.rasterizer.as_str(),
        settings.concurrency,
        settings.fps
    );

    if let Some(path) = &subtitles {
        save_subtitles(&payload.segments, path)?;
        println!("  Subtitles: {}", path.display());
    }

    let store = ProgressStore::new(std::time::Duration::from_secs(
        config.export.progress_retention_secs,
    ));
    let job = ExportJob::new(video, output_path.clone(), payload, settings);
    let _subscription = store.subscribe(&job.job_id, |state| {
        if state.is_terminal() {
            return;
        }
        print!(
            "\r  Progress: {:5.1}% [{:<8}] {:<48}",
            state.percent,
            state.stage.as_str(),
            state.message.as_deref().unwrap_or("")
        );
        let _ = std::io::stdout().flush();
    });

    match export_captioned_video(job, &store).await {
        Ok(report) => {
            println!("\nExport complete: {}", output_path.display());
            for timing in &report.stages {
                if timing.stage != Stage::Init || timing.secs > 0.0 {
                    println!("  {:<8} {:>7.2}s", timing.stage.as_str(), timing.secs);
                }
            }
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Export failed: {e}"))
        }
    }
}
