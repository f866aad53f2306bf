//! Key-management services
//!
//! A key-management service answers two questions: which master key wraps
//! per-blob keys for an account/container, and what is a fresh per-blob key.
//! Master-key resolution must be deterministic for the lifetime of one
//! instance; `random_key` must never repeat.

mod derived;
mod static_keys;

pub use derived::DerivedKeyManagementService;
pub use static_keys::StaticKeyManagementService;

use crate::config::{KmsConfig, KmsMode};
use crate::key::SecretKey;
use std::sync::Arc;
use vault_core::{AccountId, ContainerId, Result};

/// Resolves master keys and mints per-blob keys
pub trait KeyManagementService: Send + Sync {
    /// Master key for an account/container pair
    ///
    /// Fails with [`vault_core::VaultError::KeyResolution`] when no key can be
    /// resolved; never returns a placeholder key.
    fn key(&self, account: AccountId, container: ContainerId) -> Result<SecretKey>;

    /// Fresh random per-blob key, unrelated to any account or container
    fn random_key(&self) -> Result<SecretKey>;
}

/// Build the key-management service described by `config`
pub fn build_kms(config: &KmsConfig) -> Result<Arc<dyn KeyManagementService>> {
    match config.mode {
        KmsMode::Static => Ok(Arc::new(StaticKeyManagementService::from_config(config)?)),
        KmsMode::Derived => Ok(Arc::new(DerivedKeyManagementService::from_config(config)?)),
    }
}
