//! Shared FIFO job queue
//!
//! Producers on any thread push; workers block in [`JobQueue::next_job`] until
//! a job arrives, their own stop flag is raised, or the queue is closed. The
//! queue is shared through `Arc` and never owned exclusively by either side.

use crate::config::{Backpressure, QueueConfig, ShutdownPolicy};
use crate::job::Job;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use vault_core::{ConfigValidation, Result, VaultError};

/// Submission refused by the queue; the job is handed back untouched
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Bounded queue is full and the policy is `Backpressure::Reject`, or
    /// `Backpressure::Block` through [`JobQueue::try_submit`]
    #[error("job queue is full ({capacity} jobs)")]
    QueueFull {
        /// The rejected job; its callback has not been invoked
        job: Job,
        /// Configured capacity
        capacity: usize,
    },
}

impl SubmitError {
    /// Take back the rejected job
    pub fn into_job(self) -> Job {
        match self {
            Self::QueueFull { job, .. } => job,
        }
    }
}

impl From<SubmitError> for VaultError {
    fn from(err: SubmitError) -> Self {
        VaultError::queue_overflow(err.to_string())
    }
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// Multi-producer, multi-consumer FIFO of pending jobs
#[derive(Debug)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    space: Condvar,
    config: QueueConfig,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            space: Condvar::new(),
            config: QueueConfig::default(),
        }
    }
}

impl JobQueue {
    /// Unbounded queue with silent-drop shutdown
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue with validated configuration
    pub fn with_config(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Active configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a job without waiting for it to be processed
    ///
    /// Only `Backpressure::Block` can make this wait, and only while a bounded
    /// queue is full. Once the queue is closed the job is still accepted but
    /// never runs: `SilentDrop` discards it without a callback, `FailPending`
    /// completes it immediately on the calling thread with `PipelineClosed`.
    pub fn submit(&self, job: impl Into<Job>) -> std::result::Result<(), SubmitError> {
        self.enqueue(job.into(), true)
    }

    /// Enqueue a job without ever waiting for space
    ///
    /// Same as [`JobQueue::submit`], except that a full queue under
    /// `Backpressure::Block` refuses the job with `SubmitError::QueueFull`.
    pub fn try_submit(&self, job: impl Into<Job>) -> std::result::Result<(), SubmitError> {
        self.enqueue(job.into(), false)
    }

    fn enqueue(&self, job: Job, wait: bool) -> std::result::Result<(), SubmitError> {
        let mut evicted = None;

        let mut state = self.state.lock();
        loop {
            if state.closed {
                drop(state);
                tracing::debug!(blob_id = %job.blob_id(), "Job submitted after close");
                if self.config.shutdown == ShutdownPolicy::FailPending {
                    job.fail(VaultError::pipeline_closed(
                        "job submitted after the pipeline closed",
                    ));
                }
                return Ok(());
            }

            let capacity = match self.config.capacity {
                Some(capacity) if state.jobs.len() >= capacity => capacity,
                _ => break,
            };

            match self.config.backpressure {
                Backpressure::Block if wait => self.space.wait(&mut state),
                Backpressure::Block | Backpressure::Reject => {
                    return Err(SubmitError::QueueFull { job, capacity })
                }
                Backpressure::DropOldest => {
                    evicted = state.jobs.pop_front();
                    break;
                }
            }
        }

        state.jobs.push_back(job);
        self.available.notify_one();
        drop(state);

        if let Some(evicted) = evicted {
            tracing::warn!(
                blob_id = %evicted.blob_id(),
                kind = %evicted.kind(),
                "Queue full, evicting oldest job"
            );
            if self.config.shutdown == ShutdownPolicy::FailPending {
                evicted.fail(VaultError::queue_overflow(
                    "job evicted from a full queue before processing",
                ));
            }
        }
        Ok(())
    }

    /// Block until a job is available
    ///
    /// Returns `None` once `stop` is raised or the queue is closed; queued jobs
    /// are left in place either way.
    pub(crate) fn next_job(&self, stop: &AtomicBool) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if stop.load(Ordering::Acquire) || state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                self.space.notify_one();
                return Some(job);
            }
            self.available.wait(&mut state);
        }
    }

    /// Wake every blocked worker so it re-checks its stop flag
    pub(crate) fn wake_all(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
    }

    /// Stop handing out jobs and release blocked producers and workers
    ///
    /// Idempotent. Returns true on the call that closed the queue.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        self.available.notify_all();
        self.space.notify_all();
        true
    }

    /// Whether [`JobQueue::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Complete every queued job with `PipelineClosed`
    ///
    /// No-op unless the queue is closed and configured with
    /// `ShutdownPolicy::FailPending`. Callbacks run on the calling thread,
    /// outside the queue lock. Returns how many jobs were failed.
    pub fn fail_pending(&self) -> usize {
        if self.config.shutdown != ShutdownPolicy::FailPending {
            return 0;
        }

        let pending: Vec<Job> = {
            let mut state = self.state.lock();
            if !state.closed {
                return 0;
            }
            state.jobs.drain(..).collect()
        };

        let count = pending.len();
        for job in pending {
            job.fail(VaultError::pipeline_closed(
                "pipeline closed before the job was processed",
            ));
        }
        if count > 0 {
            tracing::info!(count, "Failed pending jobs on close");
        }
        count
    }

    /// Drop every queued job without invoking its callback
    pub fn clear(&self) -> usize {
        let dropped: Vec<Job> = self.state.lock().jobs.drain(..).collect();
        self.space.notify_all();
        dropped.len()
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Whether no job is queued
    pub fn is_empty(&self) -> bool {
        self.state.lock().jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DecryptJob;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;
    use vault_core::BlobId;

    fn job() -> DecryptJob {
        DecryptJob::new(BlobId::new(1u16, 1u16, 1u64), vec![], vec![], |_, _| {})
    }

    fn reporting_job(tx: mpsc::Sender<Result<Vec<u8>>>) -> DecryptJob {
        DecryptJob::new(BlobId::new(1u16, 1u16, 1u64), vec![], vec![], move |_, result| {
            let _ = tx.send(result);
        })
    }

    #[test]
    fn test_fifo_order() {
        let queue = JobQueue::new();
        let ids: Vec<BlobId> = (0..5).map(|i| BlobId::new(1u16, 1u16, i as u64)).collect();
        for id in &ids {
            queue
                .submit(DecryptJob::new(*id, vec![], vec![], |_, _| {}))
                .unwrap();
        }

        let stop = AtomicBool::new(false);
        for id in &ids {
            assert_eq!(queue.next_job(&stop).unwrap().blob_id(), *id);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_stop_flag_interrupts_wait() {
        let queue = Arc::new(JobQueue::new());
        let stop = Arc::new(AtomicBool::new(false));

        let waiter = {
            let queue = queue.clone();
            let stop = stop.clone();
            thread::spawn(move || queue.next_job(&stop).is_none())
        };

        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::Release);
        queue.wake_all();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_closed_queue_hands_out_nothing_but_keeps_jobs() {
        let queue = JobQueue::new();
        queue.submit(job()).unwrap();
        assert!(queue.close());
        assert!(!queue.close());

        let stop = AtomicBool::new(false);
        assert!(queue.next_job(&stop).is_none());

        // Silent drop: later submissions are accepted and discarded
        let (tx, rx) = mpsc::channel();
        queue.submit(reporting_job(tx)).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.fail_pending(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fail_pending_completes_queued_and_late_jobs() {
        let config = QueueConfig::unbounded().with_shutdown(ShutdownPolicy::FailPending);
        let queue = JobQueue::with_config(config).unwrap();
        let (tx, rx) = mpsc::channel();

        queue.submit(reporting_job(tx.clone())).unwrap();
        queue.submit(reporting_job(tx.clone())).unwrap();
        assert_eq!(queue.fail_pending(), 0);

        queue.close();
        assert_eq!(queue.fail_pending(), 2);
        queue.submit(reporting_job(tx)).unwrap();

        let results: Vec<_> = rx.try_iter().collect();
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(VaultError::PipelineClosed { .. }))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reject_hands_job_back() {
        let queue = JobQueue::with_config(QueueConfig::bounded(1, Backpressure::Reject)).unwrap();
        queue.submit(job()).unwrap();

        let err = queue.submit(job()).unwrap_err();
        assert!(err.to_string().contains("full"));
        let _job = err.into_job();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drop_oldest_evicts_front() {
        let config = QueueConfig::bounded(2, Backpressure::DropOldest)
            .with_shutdown(ShutdownPolicy::FailPending);
        let queue = JobQueue::with_config(config).unwrap();
        let (tx, rx) = mpsc::channel();

        let first = BlobId::new(1u16, 1u16, 1u64);
        let tx_first = tx.clone();
        queue
            .submit(DecryptJob::new(first, vec![], vec![], move |id, result| {
                let _ = tx_first.send((id, result));
            }))
            .unwrap();
        queue.submit(job()).unwrap();
        queue.submit(job()).unwrap();

        let (evicted, result) = rx.try_recv().unwrap();
        assert_eq!(evicted, first);
        assert!(matches!(result, Err(VaultError::QueueOverflow { .. })));
        assert_eq!(queue.len(), 2);
        drop(tx);
    }

    #[test]
    fn test_block_waits_for_space() {
        let queue = Arc::new(JobQueue::with_config(QueueConfig::bounded(1, Backpressure::Block)).unwrap());
        queue.submit(job()).unwrap();

        let submitted = Arc::new(AtomicUsize::new(0));
        let producer = {
            let queue = queue.clone();
            let submitted = submitted.clone();
            thread::spawn(move || {
                queue.submit(job()).unwrap();
                submitted.fetch_add(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(submitted.load(Ordering::SeqCst), 0);

        let stop = AtomicBool::new(false);
        assert!(queue.next_job(&stop).is_some());
        producer.join().unwrap();
        assert_eq!(submitted.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_try_submit_never_blocks() {
        let queue = JobQueue::with_config(QueueConfig::bounded(1, Backpressure::Block)).unwrap();
        queue.try_submit(job()).unwrap();

        let err = queue.try_submit(job()).unwrap_err();
        assert!(matches!(err, SubmitError::QueueFull { capacity: 1, .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_close_releases_blocked_producer() {
        let queue = Arc::new(JobQueue::with_config(QueueConfig::bounded(1, Backpressure::Block)).unwrap());
        queue.submit(job()).unwrap();

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.submit(job()).is_ok())
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();
        assert!(producer.join().unwrap());
    }

    #[test]
    fn test_clear_drops_without_callbacks() {
        let queue = JobQueue::new();
        let (tx, rx) = mpsc::channel();
        queue.submit(reporting_job(tx)).unwrap();

        assert_eq!(queue.clear(), 1);
        assert!(rx.try_recv().is_err());
    }
}
