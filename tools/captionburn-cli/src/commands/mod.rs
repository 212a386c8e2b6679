pub mod check;
pub mod export;
pub mod render_frame;
pub mod segment;

use std::path::Path;

use anyhow::Context;
use captionburn_caption_model::CaptionPayload;

/// Read and validate a caption payload file.
pub(crate) fn load_payload(path: &Path) -> anyhow::Result<CaptionPayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    let payload: CaptionPayload = serde_json::from_str(&content)
        .with_context(|| format!("Invalid caption payload {}", path.display()))?;
    payload
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid caption payload {}: {e}", path.display()))?;
    Ok(payload)
}
