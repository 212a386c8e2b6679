//! Frame and timestamp conversions.
//!
//! Overlay frames and decoded video frames are matched 1:1 by index, and
//! an index maps to a playback timestamp as `index / fps`. Everything that
//! turns seconds into frame counts goes through here so the extractor,
//! the planner and the compositor agree on the numbers.

/// Number of frames needed to cover `duration_secs` at `fps`.
pub fn total_frames(duration_secs: f64, fps: u32) -> u64 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 || fps == 0 {
        return 0;
    }
    // Guard against 2.0000000001 * 30 rounding up to an extra frame.
    let exact = duration_secs * fps as f64;
    let rounded = exact.round();
    if (exact - rounded).abs() < 1e-6 {
        rounded as u64
    } else {
        exact.ceil() as u64
    }
}

/// Playback timestamp of a frame index.
pub fn frame_to_secs(index: u64, fps: u32) -> f64 {
    if fps == 0 {
        return 0.0;
    }
    index as f64 / fps as f64
}

/// Round seconds to two decimals (centisecond resolution).
pub fn round_centis(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// Parse an ffmpeg `HH:MM:SS.micro` clock value into seconds.
pub fn parse_clock(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Format seconds as `HH:MM:SS<sep>mmm`, the shape shared by SRT (`,`)
/// and WebVTT (`.`).
pub fn format_clock(secs: f64, millis_separator: char) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}{millis_separator}{millis:03}")
}
