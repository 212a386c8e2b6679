//! Check external tools and font resolution.

use std::path::Path;
use std::time::Duration;

use captionburn_caption_model::{StyleSpec, WeightClass};
use captionburn_common::config::AppConfig;
use captionburn_render_engine::{FfmpegTool, FontBook};

pub async fn run(
    config: &AppConfig,
    config_path: &Path,
    family: Option<String>,
) -> anyhow::Result<()> {
    println!("captionburn System Check");
    println!("{}", "=".repeat(50));

    let mut ok = true;

    let source = if config_path.exists() { "loaded" } else { "not found, using defaults" };
    println!("Config: {} ({source})", config_path.display());
    println!();

    match FfmpegTool::locate(Duration::from_secs(config.export.tool_timeout_secs)) {
        Ok(tool) => {
            println!("[OK] ffmpeg:  {}", tool.ffmpeg_path().display());
            println!("[OK] ffprobe: {}", tool.ffprobe_path().display());
        }
        Err(e) => {
            ok = false;
            println!("[FAIL] {e}");
        }
    }

    let family = family.unwrap_or_else(|| StyleSpec::default().font_family);
    let fonts = config.fonts.clone();
    let book = tokio::task::spawn_blocking(move || FontBook::load(&fonts)).await?;

    println!();
    if book.is_empty() {
        ok = false;
        println!("[FAIL] No fonts found (system fonts: {})", config.fonts.load_system_fonts);
    } else {
        println!("Font resolution for '{family}' (fallback '{}'):", book.fallback_family());
        for weight in WeightClass::ALL {
            match book.resolve(&family, weight).and_then(|id| book.family_name(id)) {
                Some(resolved) => {
                    let status = if resolved.eq_ignore_ascii_case(&family) { "OK" } else { "WARN" };
                    println!("[{status}] {:>3} {:?}: {resolved}", weight.numeric(), weight);
                }
                None => {
                    ok = false;
                    println!("[FAIL] {:>3} {:?}: unresolved", weight.numeric(), weight);
                }
            }
        }
    }

    println!();
    if ok {
        println!("All requirements are available. captionburn is ready.");
    } else {
        println!("Some requirements are missing. See above for fixes.");
    }
    Ok(())
}
