//! Vault Pipeline - asynchronous blob envelope encryption
//!
//! Producers submit encrypt and decrypt jobs to a shared [`JobQueue`]; one or
//! more [`Worker`] threads run the envelope protocol against a
//! [`vault_crypto::CryptoService`] and a [`vault_crypto::KeyManagementService`]
//! and report each outcome through the job's callback, exactly once per
//! dequeued job. [`Pipeline`] bundles a queue and a worker pool.
//!
//! ```no_run
//! use vault_core::BlobId;
//! use vault_crypto::{KeySize, KmsConfig, SecretKey};
//! use vault_pipeline::{Pipeline, PipelineConfig};
//!
//! let master = SecretKey::generate(KeySize::Aes256);
//! let pipeline = Pipeline::from_config(&PipelineConfig::with_kms(KmsConfig::single_key(&master)))?;
//!
//! pipeline.submit_encrypt(BlobId::new(1u16, 1u16, 0u64), b"blob".to_vec(), |blob_id, result| {
//!     match result {
//!         Ok(sealed) => println!("{blob_id}: {} key bytes", sealed.encrypted_key.len()),
//!         Err(e) => eprintln!("{blob_id}: {e}"),
//!     }
//! })?;
//! pipeline.close();
//! # Ok::<(), vault_core::VaultError>(())
//! ```

pub mod config;
pub mod job;
pub mod pipeline;
pub mod protocol;
pub mod queue;
pub mod worker;

pub use config::{Backpressure, PipelineConfig, QueueConfig, ShutdownPolicy, MAX_WORKERS};
pub use job::{DecryptCallback, DecryptJob, EncryptCallback, EncryptJob, EncryptedBlob, Job, JobKind};
pub use pipeline::Pipeline;
pub use protocol::{decrypt_blob, encrypt_blob};
pub use queue::{JobQueue, SubmitError};
pub use worker::{StopHandle, Worker, WorkerState, WorkerStats};

pub use vault_core::{BlobId, Result, VaultError};

/// Error delivered to job callbacks
pub type PipelineError = VaultError;
