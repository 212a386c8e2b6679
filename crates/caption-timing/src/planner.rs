//! Frame range partitioning for parallel render workers.

use std::ops::Range;

use captionburn_caption_model::FrameJob;

/// Split `[0, total_frames)` into contiguous ranges, one per worker.
///
/// Every range holds `ceil(total / concurrency)` frames except the last,
/// which is truncated. Empty ranges are omitted, so fewer than
/// `concurrency` ranges come back for short clips. A concurrency of zero
/// is treated as one.
pub fn plan_ranges(total_frames: u64, concurrency: usize) -> Vec<Range<u64>> {
    let workers = concurrency.max(1) as u64;
    let chunk = total_frames.div_ceil(workers);
    if chunk == 0 {
        return Vec::new();
    }

    (0..workers)
        .map(|i| (i * chunk).min(total_frames)..((i + 1) * chunk).min(total_frames))
        .filter(|range| !range.is_empty())
        .collect()
}

/// The frame jobs of one range, in index order.
pub fn frame_jobs(range: Range<u64>, fps: u32) -> impl Iterator<Item = FrameJob> {
    range.map(move |index| FrameJob::new(index, fps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_frames_four_workers() {
        assert_eq!(plan_ranges(10, 4), vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn test_fewer_frames_than_workers() {
        assert_eq!(plan_ranges(2, 4), vec![0..1, 1..2]);
        assert_eq!(plan_ranges(5, 4), vec![0..2, 2..4, 4..5]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(plan_ranges(0, 4).is_empty());
        assert_eq!(plan_ranges(7, 0), vec![0..7]);
    }

    #[test]
    fn test_frame_jobs_timestamps() {
        let jobs: Vec<FrameJob> = frame_jobs(29..32, 30).collect();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].index, 29);
        assert!((jobs[1].timestamp_seconds - 1.0).abs() < 1e-12);
    }
}
