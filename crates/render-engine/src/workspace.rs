//! Per-job temporary directory.
//!
//! Layout:
//! ```text
//! captionburn-<job>-XXXXXX/
//! ├── frames/     # extracted video frames, frame_000000.png ...
//! └── overlays/   # rendered caption overlays, overlay_000000.png ...
//! ```
//!
//! Removal failures are logged and never surface to the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use captionburn_caption_model::JobId;
use captionburn_common::error::{CaptionburnError, CaptionburnResult};
use tempfile::TempDir;
use tokio::task::JoinError;

pub const FRAMES_DIR: &str = "frames";
pub const OVERLAYS_DIR: &str = "overlays";

/// Scratch space for one export job.
#[derive(Debug)]
pub struct JobWorkspace {
    job: JobId,
    root: PathBuf,
    dir: Option<TempDir>,
}

impl JobWorkspace {
    /// Create the workspace under the system temp directory.
    pub fn create(job: &JobId) -> CaptionburnResult<Self> {
        Self::create_in(job, std::env::temp_dir())
    }

    pub fn create_in(job: &JobId, parent: impl AsRef<Path>) -> CaptionburnResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("captionburn-{job}-"))
            .tempdir_in(parent)?;
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join(FRAMES_DIR))?;
        std::fs::create_dir_all(root.join(OVERLAYS_DIR))?;

        tracing::debug!(job_id = %job, path = %root.display(), "Created job workspace");
        Ok(Self {
            job: job.clone(),
            root,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join(FRAMES_DIR)
    }

    pub fn overlays_dir(&self) -> PathBuf {
        self.root.join(OVERLAYS_DIR)
    }

    /// Schedule removal after `grace`.
    ///
    /// Inside a tokio runtime the removal runs on a background task;
    /// otherwise it happens immediately.
    pub fn release(mut self, grace: Duration) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let job = self.job.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(grace).await;
                    let removal = {
                        let job = job.clone();
                        tokio::task::spawn_blocking(move || remove(&job, dir))
                    };
                    log_removal_outcome(&job, removal.await);
                });
            }
            Err(_) => remove(&job, dir),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            remove(&self.job, dir);
        }
    }
}

fn remove(job: &JobId, dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => tracing::debug!(job_id = %job, path = %path.display(), "Removed job workspace"),
        Err(e) => {
            let err = CaptionburnError::cleanup(format!(
                "failed to remove {}: {e}",
                path.display()
            ));
            tracing::warn!(job_id = %job, error = %err, "Workspace cleanup failed");
        }
    }
}

fn log_removal_outcome(job: &JobId, outcome: Result<(), JoinError>) {
    if let Err(e) = outcome {
        let err = CaptionburnError::cleanup(format!("workspace removal task failed: {e}"));
        tracing::warn!(job_id = %job, error = %err, "Workspace cleanup failed");
    }
}
