//! Unified error system for the vault crates
//!
//! One error type flows through every layer: the crypto and key-management
//! services return it, and the pipeline hands it to job callbacks unchanged.
//! It is `Clone` so a single failure can be reported to several observers.

use serde::{Deserialize, Serialize};

/// Unified error type for all vault operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VaultError {
    /// Invalid input
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Cryptographic operation failed (bad key, tampered ciphertext, cipher fault)
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// No master key could be resolved for an account/container
    #[error("Key resolution failed: {message}")]
    KeyResolution {
        /// Error message describing the resolution failure
        message: String,
    },

    /// The pipeline stopped before the job could run
    #[error("Pipeline closed: {message}")]
    PipelineClosed {
        /// Error message describing why the job was not processed
        message: String,
    },

    /// The job was evicted from a full queue
    #[error("Queue overflow: {message}")]
    QueueOverflow {
        /// Error message describing the eviction
        message: String,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl VaultError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a key resolution error
    pub fn key_resolution(message: impl Into<String>) -> Self {
        Self::KeyResolution {
            message: message.into(),
        }
    }

    /// Create a pipeline closed error
    pub fn pipeline_closed(message: impl Into<String>) -> Self {
        Self::PipelineClosed {
            message: message.into(),
        }
    }

    /// Create a queue overflow error
    pub fn queue_overflow(message: impl Into<String>) -> Self {
        Self::QueueOverflow {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for failures raised by a cipher
    pub fn is_crypto(&self) -> bool {
        matches!(self, Self::Crypto { .. })
    }

    /// True for failures raised while resolving a master key
    pub fn is_key_resolution(&self) -> bool {
        matches!(self, Self::KeyResolution { .. })
    }

    /// True when the job never ran because the pipeline shut down
    pub fn is_pipeline_closed(&self) -> bool {
        matches!(self, Self::PipelineClosed { .. })
    }
}

/// Standard Result type for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(format!("Invalid JSON: {err}"))
    }
}

impl From<toml::de::Error> for VaultError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Invalid TOML: {err}"))
    }
}
