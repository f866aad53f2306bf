//! Crypto worker thread
//!
//! A worker owns one OS thread that pulls jobs from a shared [`JobQueue`],
//! runs the envelope protocol against the injected services, and hands the
//! outcome to the job's callback. Several workers may share one queue.

use crate::job::{Job, JobKind};
use crate::protocol;
use crate::queue::JobQueue;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use vault_core::{BlobId, Result, VaultError};
use vault_crypto::{CryptoService, KeyManagementService};

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Built but not started
    Created,
    /// Pulling and processing jobs
    Running,
    /// Stop requested; the in-flight job, if any, is finishing
    Stopping,
    /// Thread has exited (terminal)
    Stopped,
}

/// Counters of one worker, or the sum over a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Jobs dequeued and run
    pub processed: u64,
    /// Jobs whose callback received `Ok`
    pub succeeded: u64,
    /// Jobs whose callback received `Err`
    pub failed: u64,
    /// Callbacks that panicked
    pub callback_panics: u64,
}

impl std::ops::Add for WorkerStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            processed: self.processed + other.processed,
            succeeded: self.succeeded + other.succeeded,
            failed: self.failed + other.failed,
            callback_panics: self.callback_panics + other.callback_panics,
        }
    }
}

#[derive(Debug, Default)]
struct StatsCounters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    callback_panics: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct WorkerShared {
    id: usize,
    stop: AtomicBool,
    state: Mutex<WorkerState>,
    thread_id: Mutex<Option<ThreadId>>,
    stats: StatsCounters,
}

impl WorkerShared {
    fn request_stop(&self, queue: &JobQueue) {
        self.stop.store(true, Ordering::Release);
        {
            let mut state = self.state.lock();
            match *state {
                WorkerState::Created => *state = WorkerState::Stopped,
                WorkerState::Running => *state = WorkerState::Stopping,
                WorkerState::Stopping | WorkerState::Stopped => {}
            }
        }
        queue.wake_all();
    }

    fn on_worker_thread(&self) -> bool {
        *self.thread_id.lock() == Some(thread::current().id())
    }
}

/// Cloneable handle that asks a worker to stop without joining it
///
/// Safe to use from inside a callback, where joining would deadlock.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shared: Arc<WorkerShared>,
    queue: Arc<JobQueue>,
}

impl StopHandle {
    /// Raise the stop flag and wake the worker
    pub fn request_stop(&self) {
        self.shared.request_stop(&self.queue);
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }
}

/// One crypto worker thread bound to a shared queue
pub struct Worker {
    shared: Arc<WorkerShared>,
    queue: Arc<JobQueue>,
    crypto: Arc<dyn CryptoService>,
    kms: Arc<dyn KeyManagementService>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Create a worker; nothing runs until [`Worker::start`]
    pub fn new(
        id: usize,
        queue: Arc<JobQueue>,
        crypto: Arc<dyn CryptoService>,
        kms: Arc<dyn KeyManagementService>,
    ) -> Self {
        Self {
            shared: Arc::new(WorkerShared {
                id,
                stop: AtomicBool::new(false),
                state: Mutex::new(WorkerState::Created),
                thread_id: Mutex::new(None),
                stats: StatsCounters::default(),
            }),
            queue,
            crypto,
            kms,
            handle: Mutex::new(None),
        }
    }

    /// Worker index, also used in the thread name
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock()
    }

    /// Snapshot of this worker's counters
    pub fn stats(&self) -> WorkerStats {
        self.shared.stats.snapshot()
    }

    /// Handle for requesting a stop from callbacks or other threads
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Spawn the worker thread
    ///
    /// A worker starts at most once; starting a running or stopped worker is
    /// an `Invalid` error.
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if *state != WorkerState::Created {
            return Err(VaultError::invalid(format!(
                "Worker {} cannot start from state {:?}",
                self.shared.id, *state
            )));
        }

        let context = WorkerContext {
            shared: self.shared.clone(),
            queue: self.queue.clone(),
            crypto: self.crypto.clone(),
            kms: self.kms.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("vault-crypto-worker-{}", self.shared.id))
            .spawn(move || context.run())?;

        *self.shared.thread_id.lock() = Some(handle.thread().id());
        *self.handle.lock() = Some(handle);
        // The thread marks itself Stopped on exit, which needs this lock
        *state = WorkerState::Running;
        Ok(())
    }

    /// Stop the worker and wait for its thread to exit
    ///
    /// The in-flight job finishes and its callback fires; queued jobs stay in
    /// the queue. Idempotent. Called from the worker's own thread (inside a
    /// callback) this only raises the stop flag; a later call from another
    /// thread joins.
    pub fn stop(&self) {
        self.shared.request_stop(&self.queue);
        if self.shared.on_worker_thread() {
            return;
        }

        let mut handle = self.handle.lock();
        if let Some(handle) = handle.take() {
            if handle.join().is_err() {
                tracing::error!(worker = self.shared.id, "Crypto worker thread panicked");
            }
        }
        *self.shared.state.lock() = WorkerState::Stopped;
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WorkerContext {
    shared: Arc<WorkerShared>,
    queue: Arc<JobQueue>,
    crypto: Arc<dyn CryptoService>,
    kms: Arc<dyn KeyManagementService>,
}

impl WorkerContext {
    fn run(self) {
        tracing::info!(worker = self.shared.id, "Crypto worker started");

        while let Some(job) = self.queue.next_job(&self.shared.stop) {
            self.process(job);
        }

        *self.shared.state.lock() = WorkerState::Stopped;
        tracing::info!(
            worker = self.shared.id,
            processed = self.shared.stats.processed.load(Ordering::Relaxed),
            "Crypto worker stopped"
        );
    }

    fn process(&self, job: Job) {
        let kind = job.kind();
        tracing::debug!(worker = self.shared.id, blob_id = %job.blob_id(), %kind, "Processing job");
        self.shared.stats.processed.fetch_add(1, Ordering::Relaxed);

        match job {
            Job::Encrypt(job) => {
                let (blob_id, plaintext, per_blob_key, callback) = job.into_parts();
                let result = self.guarded(kind, || {
                    protocol::encrypt_blob(
                        self.crypto.as_ref(),
                        self.kms.as_ref(),
                        &blob_id,
                        &plaintext,
                        &per_blob_key,
                    )
                });
                self.complete(blob_id, kind, result, callback);
            }
            Job::Decrypt(job) => {
                let (blob_id, encrypted_key, encrypted_content, callback) = job.into_parts();
                let result = self.guarded(kind, || {
                    protocol::decrypt_blob(
                        self.crypto.as_ref(),
                        self.kms.as_ref(),
                        &blob_id,
                        &encrypted_key,
                        &encrypted_content,
                    )
                });
                self.complete(blob_id, kind, result, callback);
            }
        }
    }

    /// Run a protocol step, turning a panicking service into an `Internal` error
    fn guarded<T>(&self, kind: JobKind, step: impl FnOnce() -> Result<T>) -> Result<T> {
        panic::catch_unwind(AssertUnwindSafe(step)).unwrap_or_else(|payload| {
            Err(VaultError::internal(format!(
                "{kind} job panicked: {}",
                panic_message(payload.as_ref())
            )))
        })
    }

    fn complete<T>(
        &self,
        blob_id: BlobId,
        kind: JobKind,
        result: Result<T>,
        callback: Box<dyn FnOnce(BlobId, Result<T>) + Send + 'static>,
    ) {
        match &result {
            Ok(_) => {
                self.shared.stats.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                self.shared.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    worker = self.shared.id,
                    blob_id = %blob_id,
                    %kind,
                    error = %error,
                    "Job failed"
                );
            }
        }

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(blob_id, result))) {
            self.shared.stats.callback_panics.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                worker = self.shared.id,
                blob_id = %blob_id,
                %kind,
                panic = %panic_message(payload.as_ref()),
                "Job callback panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
