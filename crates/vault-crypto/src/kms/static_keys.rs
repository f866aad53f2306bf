//! Configuration-driven key store
//!
//! Explicit per-container keys take precedence; any other container falls back
//! to the default key when one is configured. With only a default key this is
//! the single-key service used by small deployments and tests.

use super::KeyManagementService;
use crate::config::KmsConfig;
use crate::key::{KeySize, SecretKey};
use std::collections::HashMap;
use vault_core::{AccountId, ConfigValidation, ContainerId, Result, VaultError};

/// Key-management service backed by a fixed key table
#[derive(Debug)]
pub struct StaticKeyManagementService {
    container_keys: HashMap<(AccountId, ContainerId), SecretKey>,
    default_key: Option<SecretKey>,
    random_key_size: KeySize,
}

impl StaticKeyManagementService {
    /// Build from validated configuration
    pub fn from_config(config: &KmsConfig) -> Result<Self> {
        config.validate()?;

        let default_key = config
            .default_key
            .as_deref()
            .map(SecretKey::from_hex)
            .transpose()?;

        let mut container_keys = HashMap::with_capacity(config.container_keys.len());
        for entry in &config.container_keys {
            let slot = (AccountId(entry.account), ContainerId(entry.container));
            if container_keys
                .insert(slot, SecretKey::from_hex(&entry.key)?)
                .is_some()
            {
                return Err(VaultError::config(format!(
                    "Duplicate key entry for {}/{}",
                    entry.account, entry.container
                )));
            }
        }

        tracing::info!(
            containers = container_keys.len(),
            has_default = default_key.is_some(),
            random_key_bits = config.random_key_size_bits,
            "Static key management service ready"
        );

        Ok(Self {
            container_keys,
            default_key,
            random_key_size: config.random_key_size()?,
        })
    }

    /// Service that resolves every container to `default_key`
    pub fn single_key(default_key: SecretKey, random_key_size: KeySize) -> Self {
        Self {
            container_keys: HashMap::new(),
            default_key: Some(default_key),
            random_key_size,
        }
    }

    /// Number of explicitly mapped containers
    pub fn container_count(&self) -> usize {
        self.container_keys.len()
    }
}

impl KeyManagementService for StaticKeyManagementService {
    fn key(&self, account: AccountId, container: ContainerId) -> Result<SecretKey> {
        self.container_keys
            .get(&(account, container))
            .or(self.default_key.as_ref())
            .cloned()
            .ok_or_else(|| {
                VaultError::key_resolution(format!(
                    "No master key for account {account} container {container}"
                ))
            })
    }

    fn random_key(&self) -> Result<SecretKey> {
        Ok(SecretKey::generate(self.random_key_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (SecretKey, SecretKey) {
        (
            SecretKey::generate(KeySize::Aes256),
            SecretKey::generate(KeySize::Aes256),
        )
    }

    #[test]
    fn test_explicit_key_wins_over_default() {
        let (default_key, container_key) = keys();
        let config = KmsConfig::single_key(&default_key).with_container_key(3, 4, &container_key);
        let kms = StaticKeyManagementService::from_config(&config).unwrap();

        assert_eq!(kms.key(AccountId(3), ContainerId(4)).unwrap(), container_key);
        assert_eq!(kms.key(AccountId(3), ContainerId(5)).unwrap(), default_key);
        assert_eq!(kms.container_count(), 1);
    }

    #[test]
    fn test_missing_mapping_is_resolution_error() {
        let (_, container_key) = keys();
        let config = KmsConfig::default().with_container_key(1, 1, &container_key);
        let kms = StaticKeyManagementService::from_config(&config).unwrap();

        let err = kms.key(AccountId(1), ContainerId(2)).unwrap_err();
        assert!(err.is_key_resolution());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let (default_key, _) = keys();
        let kms = StaticKeyManagementService::single_key(default_key, KeySize::Aes256);
        let first = kms.key(AccountId(9), ContainerId(9)).unwrap();
        for _ in 0..10 {
            assert_eq!(kms.key(AccountId(9), ContainerId(9)).unwrap(), first);
        }
    }

    #[test]
    fn test_random_keys_use_configured_size() {
        let (default_key, _) = keys();
        let kms = StaticKeyManagementService::single_key(default_key.clone(), KeySize::Aes128);
        let a = kms.random_key().unwrap();
        let b = kms.random_key().unwrap();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        assert_ne!(a, default_key);
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let (a, b) = keys();
        let config = KmsConfig::default()
            .with_container_key(1, 1, &a)
            .with_container_key(1, 1, &b);
        assert!(StaticKeyManagementService::from_config(&config).is_err());
    }
}
