//! Pipeline configuration
//!
//! `PipelineConfig` is the top-level config file for a vault process. It nests
//! the queue settings with the crypto and key-management sections:
//!
//! ```toml
//! workers = 4
//!
//! [queue]
//! capacity = 1024
//! backpressure = "reject"
//! shutdown = "fail_pending"
//!
//! [kms]
//! default_key = "…hex…"
//! ```

use serde::{Deserialize, Serialize};
use vault_core::{ConfigValidation, Result, VaultConfig, VaultError};
use vault_crypto::{CryptoServiceConfig, KmsConfig};

/// Upper bound on workers sharing one queue
pub const MAX_WORKERS: usize = 256;

/// What a producer experiences when a bounded queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Block the producer until a worker frees a slot or the queue closes
    #[default]
    Block,
    /// Hand the job back to the producer
    Reject,
    /// Evict the oldest queued job to make room
    DropOldest,
}

/// What happens to jobs that are never dequeued because the pipeline stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Never invoke their callbacks; later submissions are accepted and never run
    #[default]
    SilentDrop,
    /// Invoke their callbacks with a `PipelineClosed` error; later submissions
    /// complete with `PipelineClosed` immediately
    FailPending,
}

/// Job queue configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of queued jobs; `None` means unbounded
    pub capacity: Option<usize>,
    /// Policy applied when a bounded queue is full
    pub backpressure: Backpressure,
    /// Policy for jobs stranded by shutdown
    pub shutdown: ShutdownPolicy,
}

impl QueueConfig {
    /// Unbounded queue with silent-drop shutdown
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounded queue with the given backpressure policy
    pub fn bounded(capacity: usize, backpressure: Backpressure) -> Self {
        Self {
            capacity: Some(capacity),
            backpressure,
            ..Self::default()
        }
    }

    /// Same queue with a different shutdown policy
    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Apply a `queue.*` override
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "capacity" => {
                self.capacity = match value {
                    "" | "none" | "unbounded" => None,
                    _ => Some(value.parse().map_err(|_| {
                        VaultError::config(format!("Invalid queue capacity: {value}"))
                    })?),
                };
            }
            "backpressure" => {
                self.backpressure = match value {
                    "block" => Backpressure::Block,
                    "reject" => Backpressure::Reject,
                    "drop_oldest" => Backpressure::DropOldest,
                    other => {
                        return Err(VaultError::config(format!(
                            "Unknown backpressure policy: {other}"
                        )))
                    }
                };
            }
            "shutdown" => {
                self.shutdown = match value {
                    "silent_drop" => ShutdownPolicy::SilentDrop,
                    "fail_pending" => ShutdownPolicy::FailPending,
                    other => {
                        return Err(VaultError::config(format!(
                            "Unknown shutdown policy: {other}"
                        )))
                    }
                };
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl ConfigValidation for QueueConfig {
    fn validate(&self) -> Result<()> {
        if self.capacity == Some(0) {
            return Err(VaultError::config("Queue capacity cannot be 0"));
        }
        Ok(())
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of worker threads sharing the queue
    pub workers: usize,
    /// Job queue settings
    pub queue: QueueConfig,
    /// Crypto service settings
    pub crypto: CryptoServiceConfig,
    /// Key-management settings
    pub kms: KmsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue: QueueConfig::default(),
            crypto: CryptoServiceConfig::default(),
            kms: KmsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Default pipeline settings around a key-management configuration
    pub fn with_kms(kms: KmsConfig) -> Self {
        Self {
            kms,
            ..Self::default()
        }
    }
}

impl ConfigValidation for PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(VaultError::config(format!(
                "Worker count must be between 1 and {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        self.queue.validate()?;
        self.crypto.validate()?;
        self.kms.validate()
    }
}

impl VaultConfig for PipelineConfig {
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<bool> {
        if key == "workers" {
            self.workers = value
                .parse()
                .map_err(|_| VaultError::config(format!("Invalid worker count: {value}")))?;
            return Ok(true);
        }

        match key.split_once('.') {
            Some(("queue", rest)) => self.queue.set_from_string(rest, value),
            Some(("crypto", rest)) => self.crypto.set_from_string(rest, value),
            Some(("kms", rest)) => self.kms.set_from_string(rest, value),
            _ => Ok(false),
        }
    }
}
