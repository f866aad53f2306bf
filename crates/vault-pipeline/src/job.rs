//! Encrypt and decrypt jobs
//!
//! A job is immutable once built and carries its own completion callback.
//! Ownership moves into the queue on submit; the worker that dequeues it
//! consumes it and invokes the callback exactly once.

use std::fmt;
use vault_core::{BlobId, Result, VaultError};
use vault_crypto::SecretKey;

/// Output of a successful encrypt job
///
/// The two halves only decrypt together: `encrypted_key` is the per-blob key
/// wrapped under the container master key, `encrypted_content` is the blob
/// body under the per-blob key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// Per-blob key wrapped by the container master key
    pub encrypted_key: Vec<u8>,
    /// Blob content encrypted by the per-blob key
    pub encrypted_content: Vec<u8>,
}

impl fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("encrypted_key_len", &self.encrypted_key.len())
            .field("encrypted_content_len", &self.encrypted_content.len())
            .finish()
    }
}

/// Completion callback of an encrypt job
///
/// Runs on the worker thread; keep it short or hand work to another executor.
pub type EncryptCallback = Box<dyn FnOnce(BlobId, Result<EncryptedBlob>) + Send + 'static>;

/// Completion callback of a decrypt job
///
/// Runs on the worker thread; keep it short or hand work to another executor.
pub type DecryptCallback = Box<dyn FnOnce(BlobId, Result<Vec<u8>>) + Send + 'static>;

/// Request to encrypt one blob
pub struct EncryptJob {
    blob_id: BlobId,
    plaintext: Vec<u8>,
    per_blob_key: SecretKey,
    callback: EncryptCallback,
}

impl EncryptJob {
    /// Build an encrypt job; `per_blob_key` comes from `KeyManagementService::random_key`
    pub fn new<F>(
        blob_id: BlobId,
        plaintext: Vec<u8>,
        per_blob_key: SecretKey,
        callback: F,
    ) -> Self
    where
        F: FnOnce(BlobId, Result<EncryptedBlob>) + Send + 'static,
    {
        Self {
            blob_id,
            plaintext,
            per_blob_key,
            callback: Box::new(callback),
        }
    }

    /// Blob this job belongs to
    pub fn blob_id(&self) -> BlobId {
        self.blob_id
    }

    /// Size of the plaintext in bytes
    pub fn plaintext_len(&self) -> usize {
        self.plaintext.len()
    }

    pub(crate) fn into_parts(self) -> (BlobId, Vec<u8>, SecretKey, EncryptCallback) {
        (self.blob_id, self.plaintext, self.per_blob_key, self.callback)
    }
}

impl fmt::Debug for EncryptJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptJob")
            .field("blob_id", &self.blob_id)
            .field("plaintext_len", &self.plaintext.len())
            .field("per_blob_key", &self.per_blob_key)
            .finish_non_exhaustive()
    }
}

/// Request to decrypt one blob
pub struct DecryptJob {
    blob_id: BlobId,
    encrypted_key: Vec<u8>,
    encrypted_content: Vec<u8>,
    callback: DecryptCallback,
}

impl DecryptJob {
    /// Build a decrypt job from the two halves of an [`EncryptedBlob`]
    pub fn new<F>(
        blob_id: BlobId,
        encrypted_key: Vec<u8>,
        encrypted_content: Vec<u8>,
        callback: F,
    ) -> Self
    where
        F: FnOnce(BlobId, Result<Vec<u8>>) + Send + 'static,
    {
        Self {
            blob_id,
            encrypted_key,
            encrypted_content,
            callback: Box::new(callback),
        }
    }

    /// Build a decrypt job from an encrypt job's output
    pub fn from_encrypted<F>(blob_id: BlobId, blob: EncryptedBlob, callback: F) -> Self
    where
        F: FnOnce(BlobId, Result<Vec<u8>>) + Send + 'static,
    {
        Self::new(blob_id, blob.encrypted_key, blob.encrypted_content, callback)
    }

    /// Blob this job belongs to
    pub fn blob_id(&self) -> BlobId {
        self.blob_id
    }

    pub(crate) fn into_parts(self) -> (BlobId, Vec<u8>, Vec<u8>, DecryptCallback) {
        (
            self.blob_id,
            self.encrypted_key,
            self.encrypted_content,
            self.callback,
        )
    }
}

impl fmt::Debug for DecryptJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptJob")
            .field("blob_id", &self.blob_id)
            .field("encrypted_key_len", &self.encrypted_key.len())
            .field("encrypted_content_len", &self.encrypted_content.len())
            .finish_non_exhaustive()
    }
}

/// Kind of work a job requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Envelope-encrypt a blob
    Encrypt,
    /// Envelope-decrypt a blob
    Decrypt,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypt => f.write_str("encrypt"),
            Self::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Unit of work travelling through the queue
#[derive(Debug)]
pub enum Job {
    /// Encrypt request
    Encrypt(EncryptJob),
    /// Decrypt request
    Decrypt(DecryptJob),
}

impl Job {
    /// Blob this job belongs to
    pub fn blob_id(&self) -> BlobId {
        match self {
            Self::Encrypt(job) => job.blob_id(),
            Self::Decrypt(job) => job.blob_id(),
        }
    }

    /// Kind of this job
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Encrypt(_) => JobKind::Encrypt,
            Self::Decrypt(_) => JobKind::Decrypt,
        }
    }

    /// Complete the job with `error` without running it
    pub(crate) fn fail(self, error: VaultError) {
        match self {
            Self::Encrypt(job) => (job.callback)(job.blob_id, Err(error)),
            Self::Decrypt(job) => (job.callback)(job.blob_id, Err(error)),
        }
    }
}

impl From<EncryptJob> for Job {
    fn from(job: EncryptJob) -> Self {
        Self::Encrypt(job)
    }
}

impl From<DecryptJob> for Job {
    fn from(job: DecryptJob) -> Self {
        Self::Decrypt(job)
    }
}
