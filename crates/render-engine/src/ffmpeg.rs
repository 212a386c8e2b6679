//! ffmpeg / ffprobe invocation.
//!
//! Every run is bounded by a timeout, drains stderr concurrently so the
//! child never blocks on a full pipe, and parses `-progress pipe:1`
//! key/value lines from stdout into [`FfmpegProgress`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use captionburn_common::error::{CaptionburnError, CaptionburnResult};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::compositor::{extraction_args, file_url, CompositionRequest, FRAME_PREFIX};

/// Characters of stderr kept in error messages.
const STDERR_TAIL_CHARS: usize = 2000;

/// Properties of the source video needed to plan an export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Located ffmpeg and ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfmpegTool {
    /// Find both binaries on `PATH`.
    pub fn locate(timeout: Duration) -> CaptionburnResult<Self> {
        let find = |name: &str| {
            which::which(name).map_err(|e| {
                CaptionburnError::external_tool(name, format!("not found in PATH: {e}"))
            })
        };
        Ok(Self::with_paths(find("ffmpeg")?, find("ffprobe")?, timeout))
    }

    pub fn with_paths(ffmpeg: PathBuf, ffprobe: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            timeout,
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }

    /// Duration, size, and audio presence of `video`.
    pub async fn probe(&self, video: &Path) -> CaptionburnResult<MediaInfo> {
        let mut args: Vec<OsString> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(file_url(video));

        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                CaptionburnError::external_tool(
                    "ffprobe",
                    format!("timed out after {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| CaptionburnError::external_tool("ffprobe", format!("failed to start: {e}")))?;

        if !output.status.success() {
            return Err(CaptionburnError::external_tool(
                "ffprobe",
                format!(
                    "{}: {}",
                    output.status,
                    tail(&String::from_utf8_lossy(&output.stderr))
                ),
            ));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Decode `video` into `out_dir/frame_%06d.png` at `fps`. Returns the
    /// number of frame files written.
    pub async fn extract_frames(
        &self,
        video: &Path,
        out_dir: &Path,
        fps: u32,
        expected_secs: f64,
        on_progress: impl FnMut(f64),
    ) -> CaptionburnResult<u64> {
        let args = extraction_args(video, out_dir, fps);
        self.run(&args, expected_secs, on_progress).await?;
        count_frames(out_dir, FRAME_PREFIX)
    }

    /// Encode the captioned output.
    pub async fn compose(
        &self,
        request: &CompositionRequest,
        on_progress: impl FnMut(f64),
    ) -> CaptionburnResult<()> {
        let expected_secs = request.total_frames as f64 / request.fps.max(1) as f64;
        self.run(&request.build_args(), expected_secs, on_progress)
            .await
    }

    /// Run ffmpeg with `args`, reporting completed fraction of
    /// `expected_secs` of output.
    pub async fn run(
        &self,
        args: &[OsString],
        expected_secs: f64,
        mut on_progress: impl FnMut(f64),
    ) -> CaptionburnResult<()> {
        tracing::debug!(binary = %self.ffmpeg.display(), ?args, "Running ffmpeg");

        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptionburnError::external_tool("ffmpeg", format!("failed to start: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptionburnError::external_tool("ffmpeg", "stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptionburnError::external_tool("ffmpeg", "stderr not captured"))?;

        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            if let Err(err) = stderr.read_to_string(&mut output).await {
                output.push_str(&format!("<failed to read ffmpeg stderr: {err}>"));
            }
            output
        });

        let start = Instant::now();
        let drive = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut progress = FfmpegProgress::default();
            while let Some(line) = lines.next_line().await? {
                if progress.update_line(&line) {
                    on_progress(progress.fraction(expected_secs));
                }
            }
            child.wait().await
        };

        let outcome = tokio::time::timeout(self.timeout, drive).await;
        let status = match outcome {
            Ok(status) => status.map_err(|e| {
                CaptionburnError::external_tool("ffmpeg", format!("failed waiting for exit: {e}"))
            })?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed out ffmpeg");
                }
                stderr_task.abort();
                return Err(CaptionburnError::external_tool(
                    "ffmpeg",
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(CaptionburnError::external_tool(
                "ffmpeg",
                format!("{status}: {}", tail(&stderr_output)),
            ));
        }

        tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "ffmpeg finished");
        on_progress(1.0);
        Ok(())
    }
}

/// Accumulated `-progress` output.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FfmpegProgress {
    pub out_time_secs: f64,
    pub frame: u64,
    pub complete: bool,
}

impl FfmpegProgress {
    /// Apply one `key=value` line. Returns true at the end of a progress
    /// block.
    pub fn update_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        let value = value.trim();
        match key {
            // Despite its name, out_time_ms carries microseconds.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = (us / 1_000_000.0).max(0.0);
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "progress" => {
                self.complete = value == "end";
                return true;
            }
            _ => {}
        }
        false
    }

    pub fn fraction(&self, expected_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(json: &str) -> CaptionburnResult<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| CaptionburnError::validation("input has no video stream"))?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(CaptionburnError::validation(
                "video stream has no usable dimensions",
            ))
        }
    };

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| CaptionburnError::validation("could not determine video duration"))?;

    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        duration_secs,
        width,
        height,
        has_audio,
    })
}

/// Count `<prefix>_NNNNNN.png` files in `dir`.
pub fn count_frames(dir: &Path, prefix: &str) -> CaptionburnResult<u64> {
    let head = format!("{prefix}_");
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&head) && name.ends_with(".png") {
            count += 1;
        }
    }
    Ok(count)
}

fn tail(text: &str) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - STDERR_TAIL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_lines() {
        let mut progress = FfmpegProgress::default();
        assert!(!progress.update_line("frame=45"));
        assert!(!progress.update_line("out_time_us=1500000"));
        assert!(!progress.update_line("garbage"));
        assert!(progress.update_line("progress=continue"));

        assert_eq!(progress.frame, 45);
        assert!((progress.fraction(3.0) - 0.5).abs() < 1e-9);
        assert_eq!(progress.fraction(0.0), 0.0);

        progress.update_line("out_time_ms=9000000");
        assert_eq!(progress.fraction(3.0), 1.0);

        progress.update_line("out_time_ms=0");
        progress.update_line("progress=end");
        assert!(progress.complete);
        assert_eq!(progress.fraction(3.0), 1.0);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720, "duration": "9.9"},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "10.026"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert!(info.has_audio);
        assert!((info.duration_secs - 10.026).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_falls_back_to_stream_duration() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 64, "height": 64, "duration": "2.5"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.duration_secs, 2.5);
    }

    #[test]
    fn test_parse_probe_rejects_audio_only() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3"}}"#;
        let err = parse_probe_output(json).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_count_frames_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_000000.png", "frame_000001.png", "overlay_000000.png", "frame.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        assert_eq!(count_frames(dir.path(), FRAME_PREFIX).unwrap(), 2);
    }

    #[test]
    fn test_tail_keeps_end() {
        let long = "x".repeat(STDERR_TAIL_CHARS) + "END";
        let t = tail(&long);
        assert!(t.ends_with("END"));
        assert_eq!(t.chars().count(), STDERR_TAIL_CHARS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let tool = FfmpegTool::with_paths(
            PathBuf::from("/bin/sh"),
            PathBuf::from("/bin/sh"),
            Duration::from_secs(10),
        );
        let args = vec![
            OsString::from("-c"),
            OsString::from("echo progress=continue; echo boom >&2; exit 3"),
        ];
        let mut seen = Vec::new();
        let err = tool.run(&args, 1.0, |f| seen.push(f)).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("ffmpeg failed"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
        assert_eq!(seen, vec![0.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let tool = FfmpegTool::with_paths(
            PathBuf::from("/bin/sh"),
            PathBuf::from("/bin/sh"),
            Duration::from_millis(200),
        );
        let args = vec![OsString::from("-c"), OsString::from("sleep 5")];
        let err = tool.run(&args, 1.0, |_| {}).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
