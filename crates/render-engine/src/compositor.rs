//! ffmpeg argument construction for frame extraction and final composition.
//!
//! Composition stacks each overlay frame on the video frame with the same
//! index: both image sequences are read at the export frame rate starting
//! from index 0, the overlay is scaled to the video size, and audio is
//! copied from the source when present.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use captionburn_caption_model::FrameJob;

pub const FRAME_PREFIX: &str = "frame";
pub const OVERLAY_PREFIX: &str = "overlay";

/// Constant rate factor used when no video bitrate is requested.
const DEFAULT_CRF: &str = "18";

/// Everything needed to encode the captioned output.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub video_frames_dir: PathBuf,
    pub overlay_frames_dir: PathBuf,
    /// Source whose first audio stream is copied into the output.
    pub audio_source: Option<PathBuf>,
    pub output: PathBuf,
    pub fps: u32,
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
    /// 0 selects CRF encoding.
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

/// `dir/<prefix>_%06d.png`, matching [`FrameJob::file_name`].
pub fn sequence_pattern(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}_%06d.png"))
}

/// Path of one frame file in a sequence directory.
pub fn frame_path(dir: &Path, prefix: &str, index: u64) -> PathBuf {
    dir.join(FrameJob { index, timestamp_seconds: 0.0 }.file_name(prefix))
}

/// A path as an ffmpeg url. The `file:` protocol keeps names that start
/// with `-` or contain `:` from being read as options or protocols, and
/// the bytes pass through unchanged.
pub fn file_url(path: &Path) -> OsString {
    let mut url = OsString::from("file:");
    url.push(path.as_os_str());
    url
}

fn flags<'a, const N: usize>(values: [&'a str; N]) -> impl Iterator<Item = OsString> + 'a {
    values.into_iter().map(OsString::from)
}

/// Flags shared by every ffmpeg run: quiet stderr, progress on stdout.
fn common_args() -> Vec<OsString> {
    flags([
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
    ])
    .collect()
}

impl CompositionRequest {
    /// Full ffmpeg argument list.
    pub fn build_args(&self) -> Vec<OsString> {
        let fps = self.fps.max(1).to_string();
        let mut args = common_args();

        for (dir, prefix) in [
            (&self.video_frames_dir, FRAME_PREFIX),
            (&self.overlay_frames_dir, OVERLAY_PREFIX),
        ] {
            args.extend(flags(["-framerate", &fps, "-start_number", "0", "-i"]));
            args.push(file_url(&sequence_pattern(dir, prefix)));
        }

        if let Some(audio) = &self.audio_source {
            args.push("-i".into());
            args.push(file_url(audio));
        }

        args.extend(flags(["-filter_complex", &self.filter_graph(), "-map", "[vout]"]));

        if self.audio_source.is_some() {
            args.extend(flags(["-map", "2:a:0?"]));
        } else {
            args.push("-an".into());
        }

        args.extend(self.codec_args());
        let total_frames = self.total_frames.to_string();
        args.extend(flags([
            "-r",
            &fps,
            "-frames:v",
            &total_frames,
            "-shortest",
            "-movflags",
            "+faststart",
        ]));
        args.push(file_url(&self.output));
        args
    }

    fn filter_graph(&self) -> String {
        format!(
            "[1:v]scale={w}:{h}[ov];[0:v][ov]overlay=0:0:format=auto,format=yuv420p[vout]",
            w = self.width,
            h = self.height,
        )
    }

    fn codec_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> =
            flags(["-c:v", "libx264", "-preset", "medium", "-pix_fmt", "yuv420p"]).collect();
        if self.video_bitrate_kbps > 0 {
            args.push("-b:v".into());
            args.push(format!("{}k", self.video_bitrate_kbps).into());
        } else {
            args.extend(flags(["-crf", DEFAULT_CRF]));
        }
        if self.audio_source.is_some() {
            args.extend(flags(["-c:a", "aac", "-b:a"]));
            args.push(format!("{}k", self.audio_bitrate_kbps.max(64)).into());
        }
        args
    }
}

/// Arguments that dump `video` as PNG frames at `fps` into `out_dir`.
pub fn extraction_args(video: &Path, out_dir: &Path, fps: u32) -> Vec<OsString> {
    let mut args = common_args();
    args.push("-i".into());
    args.push(file_url(video));
    args.extend(flags(["-vf", &format!("fps={}", fps.max(1)), "-start_number", "0"]));
    args.push(file_url(&sequence_pattern(out_dir, FRAME_PREFIX)));
    args
}
