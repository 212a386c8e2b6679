//! End-to-end export against a real ffmpeg. Skips when ffmpeg or fonts
//! are missing on the host.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use captionburn_caption_model::{CaptionPayload, Stage};
use captionburn_common::config::{FontConfig, RasterizerKind};
use captionburn_render_engine::{
    export_with_tool, ExportJob, ExportSettings, FfmpegTool, FontBook, ProgressStore,
};

fn fixture_payload() -> CaptionPayload {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-payload.json");
    let content = std::fs::read_to_string(path).expect("fixture payload should be readable");
    serde_json::from_str(&content).expect("fixture payload should parse")
}

fn tool_or_skip() -> Option<FfmpegTool> {
    match FfmpegTool::locate(Duration::from_secs(120)) {
        Ok(tool) => Some(tool),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}

fn make_source(tool: &FfmpegTool, dir: &Path, with_audio: bool) -> PathBuf {
    let path = dir.join("source.mp4");
    let mut cmd = Command::new(tool.ffmpeg_path());
    cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(["-f", "lavfi", "-i", "testsrc=size=320x180:rate=30:duration=2"]);
    if with_audio {
        cmd.args(["-f", "lavfi", "-i", "sine=frequency=440:duration=2"])
            .args(["-c:a", "aac"]);
    }
    cmd.args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-shortest"])
        .arg(&path);
    let status = cmd.status().expect("ffmpeg should start");
    assert!(status.success(), "failed to generate test source");
    path
}

async fn export_and_check(kind: RasterizerKind, with_audio: bool) {
    let Some(tool) = tool_or_skip() else { return };
    if FontBook::load(&FontConfig::default()).is_empty() {
        eprintln!("skipping: no fonts installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let source = make_source(&tool, dir.path(), with_audio);
    let output = dir.path().join("out").join("captioned.mp4");

    let mut settings = ExportSettings::default();
    settings.rasterizer = kind;
    settings.concurrency = 3;
    settings.cleanup_grace = Duration::ZERO;

    let job = ExportJob::new(&source, &output, fixture_payload(), settings);
    let report_path = job.report_path();
    let job_id = job.job_id.clone();

    let store = ProgressStore::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = store.subscribe(&job_id, move |state| {
        sink.lock().unwrap().push((state.stage, state.percent));
    });

    let report = export_with_tool(job, &tool, &store).await.unwrap();

    assert!((60..=61).contains(&report.frames), "frames {}", report.frames);
    assert_eq!(report.rasterizer, kind);
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
    assert!(report_path.exists());
    let duration = report.output_duration_secs.unwrap();
    assert!((duration - 2.0).abs() < 0.2, "output duration {duration}");

    let info = tool.probe(&output).await.unwrap();
    assert_eq!((info.width, info.height), (320, 180));
    assert_eq!(info.has_audio, with_audio);

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(seen.last().map(|s| s.0), Some(Stage::Complete));
    assert!(seen.iter().any(|s| s.0 == Stage::Captions));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn export_with_canvas_rasterizer_and_audio() {
    export_and_check(RasterizerKind::Canvas, true).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn export_with_document_rasterizer_without_audio() {
    export_and_check(RasterizerKind::Document, false).await;
}
