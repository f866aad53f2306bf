//! Worker scenarios: round trip, failure delivery, and stop semantics
//!
//! Each test drives a single worker over a shared queue with the
//! failure-injecting services from the testkit.

use assert_matches::assert_matches;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vault_core::{BlobId, VaultError};
use vault_crypto::{CryptoService, KeyManagementService, SecretKey};
use vault_pipeline::{DecryptJob, EncryptJob, EncryptedBlob, JobQueue, Worker, WorkerState};
use vault_testkit::{
    init_test_logging, random_blob_id, random_data, test_master_key, CallbackLog,
    MockCryptoService, MockKeyManagementService,
};

const WAIT: Duration = Duration::from_secs(30);

struct Harness {
    queue: Arc<JobQueue>,
    crypto: Arc<MockCryptoService>,
    kms: Arc<MockKeyManagementService>,
    worker: Worker,
}

impl Harness {
    fn start() -> Self {
        init_test_logging();
        let queue = Arc::new(JobQueue::new());
        let crypto = Arc::new(MockCryptoService::new());
        let kms = Arc::new(MockKeyManagementService::new(test_master_key()));
        let worker = Worker::new(0, queue.clone(), crypto.clone(), kms.clone());
        worker.start().unwrap();
        Self {
            queue,
            crypto,
            kms,
            worker,
        }
    }

    fn per_blob_key(&self) -> SecretKey {
        self.kms.random_key().unwrap()
    }

    fn submit_encrypt(&self, blob_id: BlobId, data: Vec<u8>, log: &CallbackLog<EncryptedBlob>) {
        self.queue
            .submit(EncryptJob::new(blob_id, data, self.per_blob_key(), log.recorder()))
            .unwrap();
    }

    fn submit_decrypt(&self, blob_id: BlobId, blob: EncryptedBlob, log: &CallbackLog<Vec<u8>>) {
        self.queue
            .submit(DecryptJob::from_encrypted(blob_id, blob, log.recorder()))
            .unwrap();
    }

    /// Encrypt `data` directly with the harness services, bypassing the worker
    fn seal(&self, blob_id: &BlobId, data: &[u8]) -> EncryptedBlob {
        vault_pipeline::encrypt_blob(
            self.crypto.as_ref(),
            self.kms.as_ref(),
            blob_id,
            data,
            &self.per_blob_key(),
        )
        .unwrap()
    }
}

#[test]
fn encrypt_then_decrypt_ten_blobs() {
    let harness = Harness::start();
    let blobs: HashMap<BlobId, Vec<u8>> = (0..10).map(|_| (random_blob_id(), random_data())).collect();

    let encrypted = CallbackLog::new();
    for (blob_id, data) in &blobs {
        harness.submit_encrypt(*blob_id, data.clone(), &encrypted);
    }
    assert!(encrypted.wait_for(blobs.len(), WAIT), "encrypt callbacks timed out");

    let decrypted = CallbackLog::new();
    for (blob_id, result) in encrypted.take() {
        harness.submit_decrypt(blob_id, result.unwrap(), &decrypted);
    }
    assert!(decrypted.wait_for(blobs.len(), WAIT), "decrypt callbacks timed out");

    for (blob_id, result) in decrypted.take() {
        assert_eq!(&result.unwrap(), &blobs[&blob_id]);
    }
    harness.worker.stop();
}

#[test]
fn encrypt_failure_reaches_callback() {
    let harness = Harness::start();
    harness.crypto.fail_encrypt(VaultError::crypto("injected encrypt failure"));

    let log = CallbackLog::new();
    let blob_id = random_blob_id();
    harness.submit_encrypt(blob_id, random_data(), &log);
    assert!(log.wait_for(1, WAIT));

    let (id, result) = log.take().remove(0);
    assert_eq!(id, blob_id);
    assert_matches!(result, Err(VaultError::Crypto { .. }));
    harness.worker.stop();
}

#[test]
fn key_wrap_failure_discards_encrypted_content() {
    let harness = Harness::start();
    // Content encryption succeeds; wrapping the per-blob key fails
    harness
        .crypto
        .fail_encrypt_after(1, VaultError::crypto("injected wrap failure"));

    let log = CallbackLog::new();
    let blob_id = random_blob_id();
    harness.submit_encrypt(blob_id, random_data(), &log);
    assert!(log.wait_for(1, WAIT));

    let (id, result) = log.take().remove(0);
    assert_eq!(id, blob_id);
    assert_matches!(result, Err(VaultError::Crypto { ref message }) if message.contains("wrap"));
    assert_eq!(harness.crypto.encrypt_calls(), 2);
    assert_eq!(harness.worker.stats().failed, 1);
    harness.worker.stop();
}

#[test]
fn stop_from_another_thread_leaves_queue_consistent() {
    let harness = Harness::start();
    let log = CallbackLog::<EncryptedBlob>::new();
    for _ in 0..10 {
        harness.submit_encrypt(random_blob_id(), random_data(), &log);
    }

    assert!(log.wait_for(4, WAIT));
    harness.worker.stop();

    // Every job either completed before the stop or is still queued
    assert_eq!(log.len() + harness.queue.len(), 10);
    assert!(log.take().into_iter().all(|(_, result)| result.is_ok()));
}

#[test]
fn kms_failure_on_encrypt_discards_content() {
    let harness = Harness::start();
    harness.kms.fail_key(VaultError::key_resolution("injected kms failure"));

    let log = CallbackLog::new();
    harness.submit_encrypt(random_blob_id(), random_data(), &log);
    assert!(log.wait_for(1, WAIT));

    assert_matches!(log.take().remove(0).1, Err(VaultError::KeyResolution { .. }));
    // Content was encrypted before the lookup failed; nothing else ran
    assert_eq!(harness.crypto.encrypt_calls(), 1);
    harness.worker.stop();
}

#[test]
fn kms_failure_on_decrypt_reaches_callback() {
    let harness = Harness::start();
    let blob_id = random_blob_id();
    let sealed = harness.seal(&blob_id, &random_data());

    harness.kms.fail_key(VaultError::key_resolution("injected kms failure"));
    let log = CallbackLog::new();
    harness.submit_decrypt(blob_id, sealed, &log);
    assert!(log.wait_for(1, WAIT));

    let (id, result) = log.take().remove(0);
    assert_eq!(id, blob_id);
    assert_matches!(result, Err(VaultError::KeyResolution { .. }));
    harness.worker.stop();
}

#[test]
fn crypto_failure_on_decrypt_reaches_callback() {
    let harness = Harness::start();
    let blob_id = random_blob_id();
    let sealed = harness.seal(&blob_id, &random_data());

    harness.crypto.fail_decrypt(VaultError::crypto("injected decrypt failure"));
    let log = CallbackLog::new();
    harness.submit_decrypt(blob_id, sealed, &log);
    assert!(log.wait_for(1, WAIT));

    assert_matches!(log.take().remove(0).1, Err(VaultError::Crypto { .. }));
    harness.worker.stop();
}

#[test]
fn stop_from_callback_leaves_remaining_jobs_unprocessed() {
    let harness = Harness::start();
    let stop = harness.worker.stop_handle();
    let log = CallbackLog::<EncryptedBlob>::new();
    let fired = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let stop = stop.clone();
        let log = log.clone();
        let fired = fired.clone();
        harness
            .queue
            .submit(EncryptJob::new(
                random_blob_id(),
                random_data(),
                harness.per_blob_key(),
                move |blob_id, result| {
                    log.record(blob_id, result);
                    if fired.fetch_add(1, Ordering::SeqCst) + 1 == 4 {
                        stop.request_stop();
                    }
                },
            ))
            .unwrap();
    }

    assert!(log.wait_for(4, WAIT));
    // Give a misbehaving worker time to pick up a fifth job
    assert!(!log.wait_for(5, Duration::from_millis(200)));

    harness.worker.stop();
    harness.worker.stop();
    assert_eq!(harness.worker.state(), WorkerState::Stopped);
    assert_eq!(log.len(), 4);
    assert_eq!(harness.queue.len(), 6);
}

#[test]
fn submit_after_stop_never_fires() {
    let harness = Harness::start();
    harness.worker.stop();

    let log = CallbackLog::new();
    harness.submit_encrypt(random_blob_id(), random_data(), &log);
    assert!(!log.wait_for(1, Duration::from_millis(200)));
    assert_eq!(harness.queue.len(), 1);
}

#[test]
fn jobs_complete_in_submission_order() {
    let harness = Harness::start();
    let log = CallbackLog::new();
    let ids: Vec<BlobId> = (0..20).map(|_| random_blob_id()).collect();
    for blob_id in &ids {
        harness.submit_encrypt(*blob_id, vec![1, 2, 3], &log);
    }
    assert!(log.wait_for(ids.len(), WAIT));

    let order: Vec<BlobId> = log.take().into_iter().map(|(id, _)| id).collect();
    assert_eq!(order, ids);
    harness.worker.stop();
}

#[test]
fn failing_job_does_not_affect_neighbours() {
    let harness = Harness::start();
    let log = CallbackLog::new();

    let good_before = random_blob_id();
    let bad = random_blob_id();
    let good_after = random_blob_id();
    for blob_id in [good_before, bad, good_after] {
        let blob = if blob_id == bad {
            EncryptedBlob {
                encrypted_key: vec![0xff; 40],
                encrypted_content: vec![0xee; 40],
            }
        } else {
            harness.seal(&blob_id, b"intact")
        };
        harness.submit_decrypt(blob_id, blob, &log);
    }
    assert!(log.wait_for(3, WAIT));

    for (blob_id, result) in log.take() {
        if blob_id == bad {
            assert_matches!(result, Err(VaultError::Crypto { .. }));
        } else {
            assert_eq!(result.unwrap(), b"intact");
        }
    }
    let stats = harness.worker.stats();
    assert_eq!((stats.succeeded, stats.failed), (2, 1));
    harness.worker.stop();
}

#[test]
fn in_flight_job_finishes_before_stop_returns() {
    let harness = Harness::start();
    let log = CallbackLog::<EncryptedBlob>::new();
    let (started_tx, started_rx) = std::sync::mpsc::channel();

    let recorder = log.recorder();
    harness
        .queue
        .submit(EncryptJob::new(
            random_blob_id(),
            random_data(),
            harness.per_blob_key(),
            move |blob_id, result| {
                let _ = started_tx.send(());
                thread::sleep(Duration::from_millis(100));
                recorder(blob_id, result);
            },
        ))
        .unwrap();

    started_rx.recv_timeout(WAIT).unwrap();
    harness.worker.stop();
    assert_eq!(log.len(), 1);
}

#[test]
fn stop_on_worker_thread_does_not_deadlock() {
    init_test_logging();
    let queue = Arc::new(JobQueue::new());
    let crypto: Arc<dyn CryptoService> = Arc::new(MockCryptoService::new());
    let kms: Arc<dyn KeyManagementService> =
        Arc::new(MockKeyManagementService::new(test_master_key()));
    let worker = Arc::new(Worker::new(7, queue.clone(), crypto, kms.clone()));
    worker.start().unwrap();

    let log = CallbackLog::<EncryptedBlob>::new();
    let inner = worker.clone();
    let recorder = log.recorder();
    queue
        .submit(EncryptJob::new(
            random_blob_id(),
            vec![9; 16],
            kms.random_key().unwrap(),
            move |blob_id, result| {
                inner.stop();
                recorder(blob_id, result);
            },
        ))
        .unwrap();

    assert!(log.wait_for(1, WAIT));
    worker.stop();
    assert_eq!(worker.state(), WorkerState::Stopped);
}
