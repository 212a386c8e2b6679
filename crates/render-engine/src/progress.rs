//! Per-job progress store with subscriptions and retention.
//!
//! Publishers (pipeline stages and frame workers) call [`ProgressStore::set`]
//! or go through a [`JobProgress`] reporter. The store keeps only the
//! latest state per job and enforces:
//!
//! - percent never decreases within a job;
//! - terminal states (`complete`, `error`) are always 100 and final;
//! - a terminal job is dropped after the retention window.
//!
//! Subscriber callbacks run outside the store lock. Each delivery carries a
//! sequence number and a subscriber never sees an older state after a newer
//! one, even when publishers race.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use captionburn_caption_model::{JobId, ProgressState, Stage};

/// Callback invoked with every published state of a job.
pub type ProgressCallback = Box<dyn Fn(&ProgressState) + Send + Sync>;

struct Subscriber {
    id: u64,
    last_seq: AtomicU64,
    callback: ProgressCallback,
}

impl Subscriber {
    fn deliver(&self, seq: u64, state: &ProgressState) {
        if self.last_seq.fetch_max(seq, Ordering::SeqCst) < seq {
            (self.callback)(state);
        }
    }
}

#[derive(Default)]
struct JobEntry {
    state: Option<ProgressState>,
    seq: u64,
    subscribers: Vec<Arc<Subscriber>>,
}

struct Inner {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    next_subscriber: AtomicU64,
    retention: Duration,
}

impl Inner {
    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        // A panicking subscriber never holds this lock, so poisoning only
        // means a publisher panicked mid-update; the map is still usable.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Latest progress state per job id.
#[derive(Clone)]
pub struct ProgressStore {
    inner: Arc<Inner>,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ProgressStore {
    /// `retention` is how long a terminal state stays queryable.
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                next_subscriber: AtomicU64::new(1),
                retention,
            }),
        }
    }

    /// Publish a state and return the state actually stored.
    ///
    /// Updates after a terminal state are ignored and the terminal state is
    /// returned instead.
    pub fn set(&self, job: &JobId, state: ProgressState) -> ProgressState {
        let (stored, seq, subscribers, became_terminal) = {
            let mut jobs = self.inner.jobs();
            let entry = jobs.entry(job.clone()).or_default();

            if let Some(current) = entry.state.as_ref().filter(|s| s.is_terminal()) {
                tracing::trace!(job_id = %job, stage = ?state.stage, "Ignoring update after terminal state");
                return current.clone();
            }

            let mut next = state;
            if next.is_terminal() {
                next.percent = 100.0;
            } else if let Some(current) = &entry.state {
                next.percent = next.percent.max(current.percent);
            }

            entry.seq += 1;
            entry.state = Some(next.clone());
            (
                next,
                entry.seq,
                entry.subscribers.clone(),
                entry.state.as_ref().is_some_and(|s| s.is_terminal()),
            )
        };

        for subscriber in &subscribers {
            subscriber.deliver(seq, &stored);
        }

        if became_terminal {
            tracing::debug!(job_id = %job, stage = stored.stage.as_str(), "Job reached terminal state");
            self.schedule_removal(job.clone());
        }

        stored
    }

    pub fn get(&self, job: &JobId) -> Option<ProgressState> {
        self.inner.jobs().get(job).and_then(|entry| entry.state.clone())
    }

    /// Drop a job's state and subscribers.
    pub fn remove(&self, job: &JobId) -> Option<ProgressState> {
        self.inner.jobs().remove(job).and_then(|entry| entry.state)
    }

    /// Number of jobs with state or subscribers.
    pub fn len(&self) -> usize {
        self.inner.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive every state published for `job`, starting with the current
    /// one if there is any. Dropping the returned handle unsubscribes.
    pub fn subscribe(
        &self,
        job: &JobId,
        callback: impl Fn(&ProgressState) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            last_seq: AtomicU64::new(0),
            callback: Box::new(callback),
        });

        let current = {
            let mut jobs = self.inner.jobs();
            let entry = jobs.entry(job.clone()).or_default();
            entry.subscribers.push(Arc::clone(&subscriber));
            entry.state.clone().map(|state| (entry.seq, state))
        };
        if let Some((seq, state)) = current {
            subscriber.deliver(seq, &state);
        }

        Subscription {
            store: Arc::downgrade(&self.inner),
            job: job.clone(),
            id,
        }
    }

    /// Reporter bound to one job.
    pub fn reporter(&self, job: JobId) -> JobProgress {
        JobProgress {
            store: self.clone(),
            job,
        }
    }

    fn schedule_removal(&self, job: JobId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::downgrade(&self.inner);
        let retention = self.inner.retention;
        runtime.spawn(async move {
            tokio::time::sleep(retention).await;
            if let Some(inner) = store.upgrade() {
                let mut jobs = inner.jobs();
                if jobs
                    .get(&job)
                    .and_then(|entry| entry.state.as_ref())
                    .is_some_and(|state| state.is_terminal())
                {
                    jobs.remove(&job);
                    tracing::trace!(job_id = %job, "Progress retention expired");
                }
            }
        });
    }
}

/// Subscription handle. Dropping it detaches the callback.
pub struct Subscription {
    store: Weak<Inner>,
    job: JobId,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut jobs = inner.jobs();
        if let Some(entry) = jobs.get_mut(&self.job) {
            entry.subscribers.retain(|s| s.id != self.id);
            if entry.state.is_none() && entry.subscribers.is_empty() {
                jobs.remove(&self.job);
            }
        }
    }
}

/// Cloneable progress reporter for one job.
#[derive(Clone)]
pub struct JobProgress {
    store: ProgressStore,
    job: JobId,
}

impl JobProgress {
    pub fn job_id(&self) -> &JobId {
        &self.job
    }

    /// Report local progress `fraction` of `stage`.
    pub fn report(&self, stage: Stage, fraction: f64, message: Option<String>) -> ProgressState {
        self.store
            .set(&self.job, ProgressState::at(stage, fraction, message))
    }

    pub fn complete(&self, message: Option<String>) -> ProgressState {
        self.store.set(&self.job, ProgressState::complete(message))
    }

    pub fn fail(&self, message: impl Into<String>) -> ProgressState {
        self.store.set(&self.job, ProgressState::error(message))
    }

    pub fn current(&self) -> Option<ProgressState> {
        self.store.get(&self.job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(store: &ProgressStore, job: &JobId) -> (Arc<Mutex<Vec<f64>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = store.subscribe(job, move |state| {
            sink.lock().unwrap().push(state.percent);
        });
        (seen, subscription)
    }

    #[test]
    fn test_percent_is_monotonic() {
        let store = ProgressStore::default();
        let progress = store.reporter(JobId::from("job"));

        progress.report(Stage::Captions, 0.5, None);
        let stored = progress.report(Stage::Frames, 0.5, None);

        assert_eq!(stored.stage, Stage::Frames);
        assert_eq!(stored.percent, 50.0);
    }

    #[test]
    fn test_terminal_state_is_final_and_full() {
        let store = ProgressStore::default();
        let progress = store.reporter(JobId::from("job"));

        progress.report(Stage::Encode, 0.2, None);
        let failed = progress.fail("ffmpeg failed: exit 1");
        assert_eq!(failed.percent, 100.0);
        assert_eq!(failed.stage, Stage::Error);

        let after = progress.report(Stage::Finalize, 1.0, None);
        assert_eq!(after.stage, Stage::Error);
        assert_eq!(progress.complete(None).stage, Stage::Error);
        assert_eq!(
            progress.current().and_then(|s| s.message),
            Some("ffmpeg failed: exit 1".to_string())
        );
    }

    #[test]
    fn test_subscribers_get_current_and_later_states() {
        let store = ProgressStore::default();
        let job = JobId::from("job");
        store.set(&job, ProgressState::at(Stage::Init, 0.5, None));

        let (seen, subscription) = recorder(&store, &job);
        store.set(&job, ProgressState::at(Stage::Frames, 1.0, None));
        drop(subscription);
        store.set(&job, ProgressState::at(Stage::Captions, 1.0, None));

        assert_eq!(*seen.lock().unwrap(), vec![5.0, 30.0]);
    }

    #[test]
    fn test_subscriptions_are_scoped_to_their_job() {
        let store = ProgressStore::default();
        let (a, b) = (JobId::from("a"), JobId::from("b"));
        let (seen, _subscription) = recorder(&store, &a);

        store.set(&b, ProgressState::at(Stage::Encode, 1.0, None));
        store.set(&a, ProgressState::complete(None));

        assert_eq!(*seen.lock().unwrap(), vec![100.0]);
    }

    #[test]
    fn test_unsubscribe_without_state_leaves_no_entry() {
        let store = ProgressStore::default();
        let subscription = store.subscribe(&JobId::from("idle"), |_| {});
        assert_eq!(store.len(), 1);
        subscription.unsubscribe();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_publishers_keep_latest_maximum() {
        let store = ProgressStore::default();
        let job = JobId::from("job");
        let (seen, _subscription) = recorder(&store, &job);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = store.clone();
                let job = job.clone();
                scope.spawn(move || {
                    for i in 0..250 {
                        let fraction = (worker * 250 + i) as f64 / 1000.0;
                        store.set(&job, ProgressState::at(Stage::Captions, fraction, None));
                    }
                });
            }
        });

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        let latest = store.get(&job).unwrap().percent;
        assert!((latest - Stage::Captions.band().map(0.999)).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_jobs_expire_after_retention() {
        let store = ProgressStore::new(Duration::from_secs(30));
        let progress = store.reporter(JobId::from("job"));
        progress.complete(Some("done".into()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(progress.current().is_some());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(progress.current().is_none());
    }
}
