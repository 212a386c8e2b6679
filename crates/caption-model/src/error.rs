//! Errors raised while parsing or validating wire types.

/// Problems with caption input data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid color '{value}': {reason}")]
    InvalidColor { value: String, reason: String },

    #[error("transcript is empty")]
    EmptyTranscript,

    #[error("audio duration {duration_secs:.2}s exceeds the {cap_secs:.0}s limit")]
    DurationExceeded { duration_secs: f64, cap_secs: f64 },

    #[error("caption payload has no segments")]
    EmptyPayload,

    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },
}
