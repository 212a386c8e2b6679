//! Export progress records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stages of a caption export, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Init,
    Frames,
    Captions,
    Encode,
    Finalize,
    Complete,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Frames => "frames",
            Stage::Captions => "captions",
            Stage::Encode => "encode",
            Stage::Finalize => "finalize",
            Stage::Complete => "complete",
            Stage::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Error)
    }

    /// Global percentage band owned by the stage.
    pub fn band(self) -> StageBand {
        match self {
            Stage::Init => StageBand::new(0.0, 10.0),
            Stage::Frames => StageBand::new(10.0, 30.0),
            Stage::Captions => StageBand::new(30.0, 70.0),
            Stage::Encode => StageBand::new(70.0, 95.0),
            Stage::Finalize => StageBand::new(95.0, 100.0),
            Stage::Complete | Stage::Error => StageBand::new(100.0, 100.0),
        }
    }
}

/// A disjoint slice of the global `0..=100` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageBand {
    pub start: f64,
    pub end: f64,
}

impl StageBand {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Map local stage progress `fraction in [0, 1]` into the band.
    pub fn map(&self, fraction: f64) -> f64 {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.start + fraction * (self.end - self.start)
    }
}

/// Latest progress of one export job, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Global percent in `[0, 100]`.
    #[serde(rename = "progress")]
    pub percent: f64,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressState {
    pub fn new(stage: Stage, percent: f64, message: Option<String>) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            stage,
            message,
            updated_at: Utc::now(),
        }
    }

    /// State for a stage's local progress.
    pub fn at(stage: Stage, fraction: f64, message: Option<String>) -> Self {
        Self::new(stage, stage.band().map(fraction), message)
    }

    pub fn initial() -> Self {
        Self::new(Stage::Init, 0.0, Some("Starting export".to_string()))
    }

    pub fn complete(message: Option<String>) -> Self {
        Self::new(Stage::Complete, 100.0, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Stage::Error, 100.0, Some(message.into()))
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_mapping() {
        assert_eq!(Stage::Captions.band().map(0.5), 50.0);
        assert_eq!(Stage::Frames.band().map(0.0), 10.0);
        assert_eq!(Stage::Encode.band().map(1.0), 95.0);
        assert_eq!(Stage::Init.band().map(2.0), 10.0);
        assert_eq!(Stage::Init.band().map(f64::NAN), 0.0);
    }

    #[test]
    fn test_bands_are_contiguous() {
        let order = [
            Stage::Init,
            Stage::Frames,
            Stage::Captions,
            Stage::Encode,
            Stage::Finalize,
        ];
        for pair in order.windows(2) {
            assert_eq!(pair[0].band().end, pair[1].band().start);
        }
        assert_eq!(Stage::Finalize.band().end, 100.0);
    }

    #[test]
    fn test_progress_record_wire_shape() {
        let state = ProgressState::error("ffmpeg exited with status 1");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["progress"], 100.0);
        assert_eq!(json["stage"], "error");
        assert_eq!(json["message"], "ffmpeg exited with status 1");
    }
}
