//! HKDF-derived container keys
//!
//! Every account/container pair gets its own master key without a key table:
//! `HKDF-SHA256(ikm = root, info = "vault-master-key-v1:{account}:{container}")`.
//! The derived key has the same length as the root key.

use super::KeyManagementService;
use crate::config::KmsConfig;
use crate::key::{KeySize, SecretKey};
use hkdf::Hkdf;
use sha2::Sha256;
use vault_core::{AccountId, ConfigValidation, ContainerId, Result, VaultError};
use zeroize::Zeroizing;

const INFO_PREFIX: &str = "vault-master-key-v1";

/// Key-management service deriving container keys from one root key
#[derive(Debug)]
pub struct DerivedKeyManagementService {
    root_key: SecretKey,
    random_key_size: KeySize,
}

impl DerivedKeyManagementService {
    /// Build from validated configuration
    pub fn from_config(config: &KmsConfig) -> Result<Self> {
        config.validate()?;
        let root_key = config
            .root_key
            .as_deref()
            .map(SecretKey::from_hex)
            .transpose()?
            .ok_or_else(|| VaultError::config("Derived KMS needs a root_key"))?;

        tracing::info!(
            root = %root_key.fingerprint(),
            random_key_bits = config.random_key_size_bits,
            "Derived key management service ready"
        );

        Ok(Self::new(root_key, config.random_key_size()?))
    }

    /// Create from a root key
    pub fn new(root_key: SecretKey, random_key_size: KeySize) -> Self {
        Self {
            root_key,
            random_key_size,
        }
    }
}

impl KeyManagementService for DerivedKeyManagementService {
    fn key(&self, account: AccountId, container: ContainerId) -> Result<SecretKey> {
        let hkdf = Hkdf::<Sha256>::new(None, self.root_key.as_bytes());
        let info = format!("{INFO_PREFIX}:{account}:{container}");

        let mut output = Zeroizing::new(vec![0u8; self.root_key.len()]);
        hkdf.expand(info.as_bytes(), &mut output).map_err(|e| {
            VaultError::key_resolution(format!(
                "HKDF expansion failed for {account}/{container}: {e}"
            ))
        })?;

        SecretKey::from_bytes(output.to_vec()).map_err(|e| {
            VaultError::key_resolution(format!(
                "Derived key for {account}/{container} unusable: {e}"
            ))
        })
    }

    fn random_key(&self) -> Result<SecretKey> {
        Ok(SecretKey::generate(self.random_key_size))
    }
}
