//! Error types shared across captionburn crates.

use std::path::PathBuf;

/// Top-level error type for captionburn operations.
///
/// The variants mirror how a failure is surfaced: validation problems are
/// reported before any work starts, tool and backend failures abort the
/// job, cleanup failures are only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum CaptionburnError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Render backend error: {message}")]
    RenderBackend { message: String },

    #[error("Cleanup error: {message}")]
    Cleanup { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CaptionburnError.
pub type CaptionburnResult<T> = Result<T, CaptionburnError>;

impl CaptionburnError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn external_tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    pub fn render_backend(msg: impl Into<String>) -> Self {
        Self::RenderBackend {
            message: msg.into(),
        }
    }

    pub fn cleanup(msg: impl Into<String>) -> Self {
        Self::Cleanup {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the error was raised before any processing started.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::FileNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_tool_message_names_tool() {
        let err = CaptionburnError::external_tool("ffmpeg", "exited with status 1");
        assert_eq!(err.to_string(), "ffmpeg failed: exited with status 1");
    }

    #[test]
    fn test_validation_classification() {
        assert!(CaptionburnError::validation("no video").is_validation());
        assert!(CaptionburnError::FileNotFound {
            path: PathBuf::from("/missing.mp4")
        }
        .is_validation());
        assert!(!CaptionburnError::render_backend("worker crashed").is_validation());
    }
}
