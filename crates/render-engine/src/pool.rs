//! Parallel overlay rendering.
//!
//! The frame range is split into contiguous chunks, one per worker. Each
//! worker runs on the blocking pool with its own rasterizer, loads the
//! payload once, and writes `overlay_%06d.png` files named by frame index,
//! so completion order never affects the output sequence.
//!
//! Workers share only a completed-frame counter and a cancel flag. The
//! first failure sets the flag and the remaining workers stop at their
//! next frame. A watchdog fails the job when no frame completes within
//! the configured timeout.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use captionburn_caption_model::{CaptionPayload, Stage};
use captionburn_caption_timing::{frame_jobs, plan_ranges};
use captionburn_common::error::{CaptionburnError, CaptionburnResult};
use tokio::task::JoinSet;

use crate::compositor::{frame_path, OVERLAY_PREFIX};
use crate::progress::JobProgress;
use crate::raster::FrameRasterizer;

/// Builds one rasterizer per worker.
pub type RasterizerFactory =
    Arc<dyn Fn() -> CaptionburnResult<Box<dyn FrameRasterizer>> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub fps: u32,
    /// Longest time without a completed frame before the job fails.
    pub frame_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fps: 30,
            frame_timeout: Duration::from_secs(30),
        }
    }
}

struct Shared {
    completed: AtomicU64,
    cancel: AtomicBool,
    total: u64,
    report_every: u64,
    progress: Option<JobProgress>,
}

impl Shared {
    fn frame_done(&self) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(progress) = &self.progress {
            if done % self.report_every == 0 || done == self.total {
                progress.report(
                    Stage::Captions,
                    done as f64 / self.total as f64,
                    Some(format!("Rendered {done}/{} caption frames", self.total)),
                );
            }
        }
    }
}

/// Render overlays for frames `0..total_frames` into `out_dir`.
///
/// Returns the number of frames written, which always equals
/// `total_frames` on success.
pub async fn render_overlays(
    payload: Arc<CaptionPayload>,
    total_frames: u64,
    out_dir: &Path,
    factory: RasterizerFactory,
    config: &PoolConfig,
    progress: Option<JobProgress>,
) -> CaptionburnResult<u64> {
    if total_frames == 0 {
        return Ok(0);
    }
    if config.fps == 0 {
        return Err(CaptionburnError::validation("fps must be positive"));
    }

    let shared = Arc::new(Shared {
        completed: AtomicU64::new(0),
        cancel: AtomicBool::new(false),
        total: total_frames,
        report_every: (total_frames / 100).max(1),
        progress,
    });

    let ranges = plan_ranges(total_frames, config.concurrency);
    tracing::info!(
        total_frames,
        workers = ranges.len(),
        fps = config.fps,
        "Rendering caption overlays"
    );

    let mut workers = JoinSet::new();
    for (worker, range) in ranges.into_iter().enumerate() {
        let payload = Arc::clone(&payload);
        let factory = Arc::clone(&factory);
        let shared = Arc::clone(&shared);
        let out_dir = out_dir.to_path_buf();
        let fps = config.fps;

        workers.spawn_blocking(move || {
            let result = run_worker(worker, range, fps, payload, &out_dir, factory, &shared);
            if let Err(e) = &result {
                tracing::warn!(worker, error = %e, "Frame worker failed");
                shared.cancel.store(true, Ordering::SeqCst);
            }
            result
        });
    }

    let mut failure: Option<CaptionburnError> = None;
    let mut last_seen = 0;
    loop {
        match tokio::time::timeout(config.frame_timeout, workers.join_next()).await {
            Ok(None) => break,
            Ok(Some(Ok(Ok(rendered)))) => {
                tracing::debug!(rendered, "Frame worker finished");
            }
            Ok(Some(Ok(Err(e)))) => {
                failure.get_or_insert(e);
                break;
            }
            Ok(Some(Err(join_error))) => {
                shared.cancel.store(true, Ordering::SeqCst);
                failure.get_or_insert(CaptionburnError::render_backend(format!(
                    "frame worker panicked: {join_error}"
                )));
                break;
            }
            Err(_) => {
                let now = shared.completed.load(Ordering::SeqCst);
                if now == last_seen {
                    shared.cancel.store(true, Ordering::SeqCst);
                    failure.get_or_insert(CaptionburnError::render_backend(format!(
                        "frame rendering stalled: no frame completed in {}s ({now}/{total_frames} done)",
                        config.frame_timeout.as_secs_f64()
                    )));
                    break;
                }
                last_seen = now;
            }
        }
    }

    if let Some(error) = failure {
        drain(&mut workers, config.frame_timeout).await;
        return Err(error);
    }

    let rendered = shared.completed.load(Ordering::SeqCst);
    if rendered != total_frames {
        return Err(CaptionburnError::render_backend(format!(
            "rendered {rendered} of {total_frames} caption frames"
        )));
    }
    Ok(rendered)
}

fn run_worker(
    worker: usize,
    range: std::ops::Range<u64>,
    fps: u32,
    payload: Arc<CaptionPayload>,
    out_dir: &Path,
    factory: RasterizerFactory,
    shared: &Shared,
) -> CaptionburnResult<u64> {
    let mut rasterizer = factory()?;
    rasterizer.load(payload)?;
    if !rasterizer.is_ready() {
        return Err(CaptionburnError::render_backend(format!(
            "{} rasterizer not ready after load",
            rasterizer.name()
        )));
    }
    tracing::trace!(worker, start = range.start, end = range.end, "Frame worker started");

    let mut rendered = 0;
    for job in frame_jobs(range, fps) {
        if shared.cancel.load(Ordering::SeqCst) {
            break;
        }
        let png = rasterizer.render_frame(job.timestamp_seconds)?;
        std::fs::write(frame_path(out_dir, OVERLAY_PREFIX, job.index), png)?;
        rendered += 1;
        shared.frame_done();
    }
    Ok(rendered)
}

/// Wait for cancelled workers to stop, up to `timeout` without progress.
async fn drain(workers: &mut JoinSet<CaptionburnResult<u64>>, timeout: Duration) {
    loop {
        match tokio::time::timeout(timeout, workers.join_next()).await {
            Ok(Some(Ok(Err(e)))) => tracing::debug!(error = %e, "Additional worker failure"),
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(_) => {
                tracing::warn!(remaining = workers.len(), "Abandoning unresponsive frame workers");
                workers.detach_all();
                return;
            }
        }
    }
}
