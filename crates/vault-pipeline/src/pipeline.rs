//! Pipeline: a job queue with a pool of crypto workers
//!
//! The pipeline wires the queue, the workers and the two services together,
//! mints per-blob keys for encrypt requests, and offers async helpers that
//! resolve when the job's callback fires.

use crate::config::{PipelineConfig, ShutdownPolicy, MAX_WORKERS};
use crate::job::{DecryptJob, EncryptJob, EncryptedBlob, Job};
use crate::queue::{JobQueue, SubmitError};
use crate::worker::{Worker, WorkerStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use vault_core::{BlobId, ConfigValidation, Result, VaultError};
use vault_crypto::{build_kms, CryptoService, GcmCryptoService, KeyManagementService};

/// Running encryption pipeline
pub struct Pipeline {
    queue: Arc<JobQueue>,
    workers: Vec<Worker>,
    kms: Arc<dyn KeyManagementService>,
    closed: AtomicBool,
}

impl Pipeline {
    /// Start a pipeline over the given services
    ///
    /// Only the worker count and queue sections of `config` are used; the
    /// crypto and KMS sections describe services built by [`Pipeline::from_config`].
    pub fn new(
        config: &PipelineConfig,
        crypto: Arc<dyn CryptoService>,
        kms: Arc<dyn KeyManagementService>,
    ) -> Result<Self> {
        if config.workers == 0 || config.workers > MAX_WORKERS {
            return Err(VaultError::config(format!(
                "Worker count must be between 1 and {MAX_WORKERS}, got {}",
                config.workers
            )));
        }

        let queue = Arc::new(JobQueue::with_config(config.queue.clone())?);
        let workers: Vec<Worker> = (0..config.workers)
            .map(|id| Worker::new(id, queue.clone(), crypto.clone(), kms.clone()))
            .collect();

        let pipeline = Self {
            queue,
            workers,
            kms,
            closed: AtomicBool::new(false),
        };
        for worker in &pipeline.workers {
            // Dropping `pipeline` on error stops the workers already started
            worker.start()?;
        }

        tracing::info!(
            workers = config.workers,
            capacity = ?config.queue.capacity,
            backpressure = ?config.queue.backpressure,
            shutdown = ?config.queue.shutdown,
            "Encryption pipeline started"
        );
        Ok(pipeline)
    }

    /// Validate `config`, build the GCM crypto service and the configured KMS, and start
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let crypto = Arc::new(GcmCryptoService::new(config.crypto.clone())?);
        let kms = build_kms(&config.kms)?;
        Self::new(config, crypto, kms)
    }

    /// Key-management service shared by the workers
    pub fn kms(&self) -> &Arc<dyn KeyManagementService> {
        &self.kms
    }

    /// Shared job queue
    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a worker
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Counters summed over every worker
    pub fn stats(&self) -> WorkerStats {
        self.workers
            .iter()
            .map(Worker::stats)
            .fold(WorkerStats::default(), |total, stats| total + stats)
    }

    /// Whether [`Pipeline::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Enqueue a prepared job
    pub fn submit(&self, job: impl Into<Job>) -> std::result::Result<(), SubmitError> {
        self.queue.submit(job)
    }

    /// Mint a per-blob key and enqueue an encrypt job
    ///
    /// A refused submission is reported as `QueueOverflow` and the callback
    /// is dropped uninvoked.
    pub fn submit_encrypt<F>(&self, blob_id: BlobId, plaintext: Vec<u8>, callback: F) -> Result<()>
    where
        F: FnOnce(BlobId, Result<EncryptedBlob>) + Send + 'static,
    {
        let job = self.encrypt_job(blob_id, plaintext, callback)?;
        self.enqueue(job, true)
    }

    /// Enqueue a decrypt job for the output of an encrypt job
    pub fn submit_decrypt<F>(&self, blob_id: BlobId, blob: EncryptedBlob, callback: F) -> Result<()>
    where
        F: FnOnce(BlobId, Result<Vec<u8>>) + Send + 'static,
    {
        tracing::debug!(blob_id = %blob_id, "Submitting decrypt job");
        self.enqueue(DecryptJob::from_encrypted(blob_id, blob, callback), true)
    }

    /// Encrypt one blob and wait for the result
    ///
    /// Never parks the calling runtime thread on a full queue: under every
    /// backpressure policy, `Block` included, a full bounded queue yields
    /// `QueueOverflow`. Resolves to `PipelineClosed` if the pipeline closes
    /// before the job runs.
    pub async fn encrypt(&self, blob_id: BlobId, plaintext: Vec<u8>) -> Result<EncryptedBlob> {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        let job = self.encrypt_job(blob_id, plaintext, move |_, result| {
            let _ = tx.send(result);
        })?;
        self.enqueue(job, false)?;
        rx.await.unwrap_or_else(|_| Err(dropped(blob_id)))
    }

    /// Decrypt one blob and wait for the plaintext
    ///
    /// Queueing behaves as in [`Pipeline::encrypt`].
    pub async fn decrypt(&self, blob_id: BlobId, blob: EncryptedBlob) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        let job = DecryptJob::from_encrypted(blob_id, blob, move |_, result| {
            let _ = tx.send(result);
        });
        self.enqueue(job, false)?;
        rx.await.unwrap_or_else(|_| Err(dropped(blob_id)))
    }

    /// Stop every worker and settle the jobs left in the queue
    ///
    /// In-flight jobs finish first. Queued jobs are then failed with
    /// `PipelineClosed` or dropped, per the queue's shutdown policy.
    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.queue.close();
        for worker in &self.workers {
            worker.stop();
        }

        let settled = match self.queue.config().shutdown {
            ShutdownPolicy::FailPending => self.queue.fail_pending(),
            ShutdownPolicy::SilentDrop => self.queue.clear(),
        };
        let stats = self.stats();
        tracing::info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            abandoned = settled,
            "Encryption pipeline closed"
        );
    }

    fn encrypt_job<F>(&self, blob_id: BlobId, plaintext: Vec<u8>, callback: F) -> Result<EncryptJob>
    where
        F: FnOnce(BlobId, Result<EncryptedBlob>) + Send + 'static,
    {
        let per_blob_key = self.kms.random_key()?;
        tracing::debug!(
            blob_id = %blob_id,
            key = %per_blob_key.fingerprint(),
            len = plaintext.len(),
            "Submitting encrypt job"
        );
        Ok(EncryptJob::new(blob_id, plaintext, per_blob_key, callback))
    }

    /// Enqueue, waiting for space only when `wait` is set
    fn enqueue(&self, job: impl Into<Job>, wait: bool) -> Result<()> {
        if wait {
            self.queue.submit(job)?;
        } else {
            self.queue.try_submit(job)?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(VaultError::pipeline_closed("pipeline is closed"));
        }
        Ok(())
    }
}

fn dropped(blob_id: BlobId) -> VaultError {
    VaultError::pipeline_closed(format!("job for {blob_id} was dropped before completion"))
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.workers)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}
