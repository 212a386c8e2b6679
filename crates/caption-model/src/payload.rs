//! What a render job works on: the caption payload, frame jobs, job ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::segment::Segment;
use crate::style::StyleSpec;

/// Identifier of one export job. Root key for all per-job state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a rasterizer needs, delivered once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionPayload {
    #[serde(default)]
    pub style: StyleSpec,
    pub segments: Vec<Segment>,
    /// Canvas width the style was authored for. Defaults to the video width.
    #[serde(default)]
    pub width: Option<u32>,
    /// Canvas height the style was authored for. Defaults to the video height.
    #[serde(default)]
    pub height: Option<u32>,
}

impl CaptionPayload {
    pub fn new(style: StyleSpec, segments: Vec<Segment>, width: u32, height: u32) -> Self {
        Self {
            style,
            segments,
            width: Some(width),
            height: Some(height),
        }
    }

    /// Canvas size, falling back to the given video size.
    pub fn canvas_size(&self, video_width: u32, video_height: u32) -> (u32, u32) {
        (
            self.width.unwrap_or(video_width),
            self.height.unwrap_or(video_height),
        )
    }

    /// Structural checks done before any processing starts.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.segments.is_empty() {
            return Err(ModelError::EmptyPayload);
        }
        match (self.width, self.height) {
            (Some(0), Some(h)) => Err(ModelError::InvalidCanvas { width: 0, height: h }),
            (Some(w), Some(0)) => Err(ModelError::InvalidCanvas { width: w, height: 0 }),
            _ => Ok(()),
        }
    }
}

/// One unit of rasterization work. The index orders the output, the
/// timestamp selects the content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameJob {
    pub index: u64,
    pub timestamp_seconds: f64,
}

impl FrameJob {
    pub fn new(index: u64, fps: u32) -> Self {
        let timestamp_seconds = if fps == 0 {
            0.0
        } else {
            index as f64 / fps as f64
        };
        Self {
            index,
            timestamp_seconds,
        }
    }

    /// Zero-padded file name so lexical order equals frame order.
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{prefix}_{:06}.png", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_job_timestamp_and_name() {
        let job = FrameJob::new(45, 30);
        assert!((job.timestamp_seconds - 1.5).abs() < 1e-12);
        assert_eq!(job.file_name("overlay"), "overlay_000045.png");
    }

    #[test]
    fn test_payload_validation() {
        let payload = CaptionPayload {
            style: StyleSpec::default(),
            segments: vec![],
            width: None,
            height: None,
        };
        assert_eq!(payload.validate(), Err(ModelError::EmptyPayload));
    }

    #[test]
    fn test_canvas_size_falls_back_to_video() {
        let payload: CaptionPayload = serde_json::from_str(
            r#"{"segments": [{"id": 0, "text": "hi", "start": 0, "end": 1}], "width": 720}"#,
        )
        .unwrap();
        assert_eq!(payload.canvas_size(1920, 1080), (720, 1080));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_generated_job_ids_are_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }
}
