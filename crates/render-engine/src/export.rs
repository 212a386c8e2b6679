//! Export pipeline: source video + caption payload -> captioned MP4.
//!
//! Stages, each reporting into its band of the job's progress:
//!
//! 1. `init`: validate inputs, probe the source, enforce the duration cap
//! 2. `frames`: extract video frames at the export frame rate
//! 3. `captions`: normalize captions against the source duration, then
//!    render one overlay per frame on the worker pool
//! 4. `encode`: overlay by index, mux source audio, encode H.264/AAC
//! 5. `finalize`: verify the output and write the report
//!
//! Any failure ends the job with a single `error` state. The job
//! workspace is released on both paths.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use captionburn_caption_model::{check_duration, CaptionPayload, JobId, ProgressState, Stage};
use captionburn_caption_timing::normalize_segments;
use captionburn_common::config::{AppConfig, FontConfig, RasterizerKind};
use captionburn_common::error::{CaptionburnError, CaptionburnResult};
use captionburn_common::timecode::total_frames;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use crate::compositor::CompositionRequest;
use crate::ffmpeg::{FfmpegTool, MediaInfo};
use crate::pool::{render_overlays, PoolConfig, RasterizerFactory};
use crate::progress::{JobProgress, ProgressStore};
use crate::raster::fonts::FontBook;
use crate::raster::{create_rasterizer, RenderSettings};
use crate::workspace::JobWorkspace;

/// Knobs of one export run.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub fps: u32,
    pub concurrency: usize,
    pub rasterizer: RasterizerKind,
    pub render: RenderSettings,
    pub fonts: FontConfig,
    pub max_duration_secs: Option<f64>,
    pub frame_timeout: Duration,
    pub tool_timeout: Duration,
    pub cleanup_grace: Duration,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ExportSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let export = &config.export;
        Self {
            fps: export.fps,
            concurrency: export.concurrency,
            rasterizer: export.rasterizer,
            render: RenderSettings::from_config(config),
            fonts: config.fonts.clone(),
            max_duration_secs: export.max_duration_secs,
            frame_timeout: Duration::from_secs(export.frame_timeout_secs),
            tool_timeout: Duration::from_secs(export.tool_timeout_secs),
            cleanup_grace: Duration::from_secs(export.cleanup_grace_secs),
            video_bitrate_kbps: export.video_bitrate_kbps,
            audio_bitrate_kbps: export.audio_bitrate_kbps,
        }
    }
}

/// An export job ready to run.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub job_id: JobId,
    pub video_path: PathBuf,
    pub output_path: PathBuf,
    pub payload: CaptionPayload,
    pub settings: ExportSettings,
}

impl ExportJob {
    pub fn new(
        video_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        payload: CaptionPayload,
        settings: ExportSettings,
    ) -> Self {
        Self {
            job_id: JobId::generate(),
            video_path: video_path.into(),
            output_path: output_path.into(),
            payload,
            settings,
        }
    }

    /// Where the JSON report of a successful run is written.
    pub fn report_path(&self) -> PathBuf {
        self.output_path.with_extension("report.json")
    }
}

/// Wall time spent in one stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: Stage,
    pub secs: f64,
}

/// Summary of a successful export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub job_id: JobId,
    pub output: PathBuf,
    pub frames: u64,
    pub fps: u32,
    pub rasterizer: RasterizerKind,
    pub width: u32,
    pub height: u32,
    pub source_duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_duration_secs: Option<f64>,
    pub stages: Vec<StageTiming>,
    pub finished_at: DateTime<Utc>,
}

struct StageClock {
    stage: Stage,
    started: Instant,
    finished: Vec<StageTiming>,
}

impl StageClock {
    fn new() -> Self {
        Self {
            stage: Stage::Init,
            started: Instant::now(),
            finished: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.close();
        self.stage = stage;
        tracing::info!(stage = stage.as_str(), "Entering stage");
    }

    fn close(&mut self) {
        self.finished.push(StageTiming {
            stage: self.stage,
            secs: self.started.elapsed().as_secs_f64(),
        });
        self.started = Instant::now();
    }
}

/// Run an export, locating ffmpeg on `PATH`.
pub async fn export_captioned_video(
    job: ExportJob,
    store: &ProgressStore,
) -> CaptionburnResult<ExportReport> {
    let progress = store.reporter(job.job_id.clone());
    store.set(&job.job_id, ProgressState::initial());

    let tool = match FfmpegTool::locate(job.settings.tool_timeout) {
        Ok(tool) => tool,
        Err(e) => {
            progress.fail(e.to_string());
            return Err(e);
        }
    };
    export_with_tool(job, &tool, store).await
}

/// Run an export with an explicit ffmpeg installation.
pub async fn export_with_tool(
    job: ExportJob,
    tool: &FfmpegTool,
    store: &ProgressStore,
) -> CaptionburnResult<ExportReport> {
    let progress = store.reporter(job.job_id.clone());
    let span = tracing::info_span!("export", job_id = %job.job_id);

    async move {
        tracing::info!(
            video = %job.video_path.display(),
            output = %job.output_path.display(),
            rasterizer = job.settings.rasterizer.as_str(),
            "Starting export"
        );

        let mut workspace = None;
        let result = run_stages(&job, tool, &progress, &mut workspace).await;

        if let Some(workspace) = workspace {
            workspace.release(job.settings.cleanup_grace);
        }

        match &result {
            Ok(report) => {
                progress.complete(Some(format!(
                    "Exported {} frames to {}",
                    report.frames,
                    report.output.display()
                )));
                tracing::info!(frames = report.frames, "Export complete");
            }
            Err(e) => {
                progress.fail(e.to_string());
                tracing::error!(error = %e, "Export failed");
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn run_stages(
    job: &ExportJob,
    tool: &FfmpegTool,
    progress: &JobProgress,
    workspace_slot: &mut Option<JobWorkspace>,
) -> CaptionburnResult<ExportReport> {
    let settings = &job.settings;
    let mut clock = StageClock::new();

    // init
    if settings.fps == 0 {
        return Err(CaptionburnError::validation("fps must be positive"));
    }
    if tokio::fs::metadata(&job.video_path).await.is_err() {
        return Err(CaptionburnError::FileNotFound {
            path: job.video_path.clone(),
        });
    }
    job.payload
        .validate()
        .map_err(|e| CaptionburnError::validation(e.to_string()))?;

    let info = tool.probe(&job.video_path).await?;
    if let Some(cap) = settings.max_duration_secs {
        check_duration(info.duration_secs, cap)
            .map_err(|e| CaptionburnError::validation(e.to_string()))?;
    }
    progress.report(
        Stage::Init,
        0.5,
        Some(format!(
            "Source {}x{}, {:.2}s",
            info.width, info.height, info.duration_secs
        )),
    );

    if let Some(parent) = job.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let workspace = workspace_slot.insert(JobWorkspace::create(&job.job_id)?);
    progress.report(Stage::Init, 1.0, None);

    // frames
    clock.enter(Stage::Frames);
    let expected_frames = total_frames(info.duration_secs, settings.fps);
    let extracted = tool
        .extract_frames(
            &job.video_path,
            &workspace.frames_dir(),
            settings.fps,
            info.duration_secs,
            |fraction| {
                progress.report(Stage::Frames, fraction, None);
            },
        )
        .await?;
    if extracted == 0 {
        return Err(CaptionburnError::external_tool(
            "ffmpeg",
            "frame extraction produced no frames",
        ));
    }
    let frames = extracted.min(expected_frames.max(1));
    if extracted != expected_frames {
        tracing::debug!(extracted, expected_frames, "Extracted frame count differs from duration");
    }
    progress.report(
        Stage::Frames,
        1.0,
        Some(format!("Extracted {extracted} frames")),
    );

    // captions
    clock.enter(Stage::Captions);
    let payload = prepare_payload(&job.payload, &info);

    let font_config = settings.fonts.clone();
    let book = tokio::task::spawn_blocking(move || FontBook::load(&font_config))
        .await
        .map_err(|e| CaptionburnError::render_backend(format!("font loading panicked: {e}")))?;
    if book.is_empty() {
        return Err(CaptionburnError::render_backend("no fonts available for rendering"));
    }

    let kind = settings.rasterizer;
    let render = settings.render;
    let factory: RasterizerFactory =
        Arc::new(move || Ok(create_rasterizer(kind, book.clone(), render)));
    let pool = PoolConfig {
        concurrency: settings.concurrency,
        fps: settings.fps,
        frame_timeout: settings.frame_timeout,
    };
    render_overlays(
        Arc::new(payload),
        frames,
        &workspace.overlays_dir(),
        factory,
        &pool,
        Some(progress.clone()),
    )
    .await?;

    // encode
    clock.enter(Stage::Encode);
    let request = CompositionRequest {
        video_frames_dir: workspace.frames_dir(),
        overlay_frames_dir: workspace.overlays_dir(),
        audio_source: info.has_audio.then(|| job.video_path.clone()),
        output: job.output_path.clone(),
        fps: settings.fps,
        total_frames: frames,
        width: info.width,
        height: info.height,
        video_bitrate_kbps: settings.video_bitrate_kbps,
        audio_bitrate_kbps: settings.audio_bitrate_kbps,
    };
    tool.compose(&request, |fraction| {
        progress.report(Stage::Encode, fraction, None);
    })
    .await?;

    // finalize
    clock.enter(Stage::Finalize);
    verify_output(&job.output_path).await?;
    let output_duration_secs = match tool.probe(&job.output_path).await {
        Ok(out) => Some(out.duration_secs),
        Err(e) => {
            tracing::warn!(error = %e, "Could not probe exported file");
            None
        }
    };
    clock.close();

    let report = ExportReport {
        job_id: job.job_id.clone(),
        output: job.output_path.clone(),
        frames,
        fps: settings.fps,
        rasterizer: settings.rasterizer,
        width: info.width,
        height: info.height,
        source_duration_secs: info.duration_secs,
        output_duration_secs,
        stages: clock.finished,
        finished_at: Utc::now(),
    };
    write_report(&report, &job.report_path()).await?;
    progress.report(Stage::Finalize, 1.0, None);
    Ok(report)
}

/// Payload as the rasterizers see it: captions normalized against the
/// probed duration and the canvas size resolved.
fn prepare_payload(payload: &CaptionPayload, info: &MediaInfo) -> CaptionPayload {
    let (width, height) = payload.canvas_size(info.width, info.height);
    let received = payload.segments.len();
    let segments = normalize_segments(payload.segments.clone(), Some(info.duration_secs));
    if segments.len() != received {
        tracing::debug!(
            received,
            kept = segments.len(),
            "Dropped captions outside the source duration"
        );
    }
    if segments.is_empty() {
        tracing::warn!("No captions fall inside the source video");
    }

    CaptionPayload {
        style: payload.style.clone(),
        segments,
        width: Some(width),
        height: Some(height),
    }
}

async fn verify_output(path: &Path) -> CaptionburnResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(CaptionburnError::external_tool(
            "ffmpeg",
            format!("output {} is empty", path.display()),
        )),
        Err(_) => Err(CaptionburnError::external_tool(
            "ffmpeg",
            format!("output {} was not written", path.display()),
        )),
    }
}

async fn write_report(report: &ExportReport, path: &Path) -> CaptionburnResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    tracing::debug!(path = %path.display(), "Wrote export report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionburn_caption_model::{CaptionPosition, Segment, StyleSpec, MIN_SEGMENT_DURATION};
    use captionburn_caption_timing::{resolve_frame, VisibilityConfig};

    fn payload() -> CaptionPayload {
        CaptionPayload {
            style: StyleSpec::default(),
            segments: vec![Segment {
                id: 0,
                text: "hello".into(),
                start: 0.0,
                end: 1.0,
                words: None,
                position: CaptionPosition::default(),
            }],
            width: None,
            height: None,
        }
    }

    fn plain(id: u32, text: &str, start: f64, end: f64) -> Segment {
        Segment {
            id,
            text: text.into(),
            start,
            end,
            words: None,
            position: CaptionPosition::default(),
        }
    }

    fn fake_tool() -> FfmpegTool {
        FfmpegTool::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_settings_follow_config() {
        let mut config = AppConfig::default();
        config.export.fps = 24;
        config.export.lookahead_secs = 0.1;
        config.export.cleanup_grace_secs = 0;

        let settings = ExportSettings::from_config(&config);
        assert_eq!(settings.fps, 24);
        assert_eq!(settings.render.visibility.lookahead_secs, 0.1);
        assert_eq!(settings.cleanup_grace, Duration::ZERO);
    }

    #[test]
    fn test_report_path_sits_next_to_output() {
        let job = ExportJob::new("in.mp4", "/out/clip.mp4", payload(), ExportSettings::default());
        assert_eq!(job.report_path(), PathBuf::from("/out/clip.report.json"));
    }

    #[tokio::test]
    async fn test_missing_video_fails_before_processing() {
        let store = ProgressStore::default();
        let job = ExportJob::new(
            "/nonexistent/input.mp4",
            "/tmp/out.mp4",
            payload(),
            ExportSettings::default(),
        );
        let job_id = job.job_id.clone();

        let err = export_with_tool(job, &fake_tool(), &store).await.unwrap_err();
        assert!(err.is_validation());

        let state = store.get(&job_id).unwrap();
        assert_eq!(state.stage, Stage::Error);
        assert_eq!(state.percent, 100.0);
        assert!(state.message.unwrap().contains("input.mp4"));
    }

    #[tokio::test]
    async fn test_empty_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("in.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let mut empty = payload();
        empty.segments.clear();
        let store = ProgressStore::default();
        let job = ExportJob::new(&video, dir.path().join("out.mp4"), empty, ExportSettings::default());
        let job_id = job.job_id.clone();

        let err = export_with_tool(job, &fake_tool(), &store).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.get(&job_id).unwrap().stage, Stage::Error);
    }

    #[tokio::test]
    async fn test_missing_tool_is_external_failure() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("in.mp4");
        std::fs::write(&video, b"x").unwrap();

        let store = ProgressStore::default();
        let job = ExportJob::new(&video, dir.path().join("out.mp4"), payload(), ExportSettings::default());
        let err = export_with_tool(job, &fake_tool(), &store).await.unwrap_err();
        assert!(matches!(err, CaptionburnError::ExternalTool { .. }));
    }

    #[test]
    fn test_report_serializes_stage_names() {
        let report = ExportReport {
            job_id: JobId::from("j"),
            output: PathBuf::from("out.mp4"),
            frames: 30,
            fps: 30,
            rasterizer: RasterizerKind::Canvas,
            width: 640,
            height: 360,
            source_duration_secs: 1.0,
            output_duration_secs: None,
            stages: vec![StageTiming {
                stage: Stage::Frames,
                secs: 0.5,
            }],
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stages"][0]["stage"], "frames");
        assert_eq!(json["jobId"], "j");
        assert!(json.get("outputDurationSecs").is_none());
    }

    #[test]
    fn test_captions_are_normalized_before_rendering() {
        let mut raw = payload();
        raw.segments = vec![
            plain(0, "blink", 1.0, 1.05),
            plain(1, "first", 2.0, 3.0),
            plain(2, "second", 2.5, 3.5),
            plain(3, "late", 12.0, 13.0),
        ];
        let info = MediaInfo {
            duration_secs: 10.0,
            width: 1280,
            height: 720,
            has_audio: false,
        };

        let prepared = prepare_payload(&raw, &info);
        assert_eq!((prepared.width, prepared.height), (Some(1280), Some(720)));

        let texts: Vec<&str> = prepared.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["blink", "first", "second"]);
        for pair in prepared.segments.windows(2) {
            assert!(pair[0].end <= pair[1].start + 1e-9, "{pair:?}");
        }
        for segment in &prepared.segments {
            assert!(segment.duration() >= MIN_SEGMENT_DURATION - 1e-9, "{segment:?}");
            assert!(segment.end <= info.duration_secs);
        }

        let config = VisibilityConfig::default();
        assert!(resolve_frame(&raw.segments, 1.1, &config).is_none());
        let frame = resolve_frame(&prepared.segments, 1.1, &config).unwrap();
        assert!(frame.is_visible());
    }
}
