//! Crypto and key-management configuration
//!
//! Key material appears here hex-encoded, as it would in a config file. The
//! `Debug` impls never print it.

use crate::key::{KeySize, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use vault_core::{ConfigValidation, Result, VaultError};

/// Nonce length accepted by the AES-GCM service
pub const GCM_NONCE_SIZE: usize = 12;

/// Configuration for [`crate::GcmCryptoService`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoServiceConfig {
    /// Nonce (IV) length in bytes
    pub nonce_size_bytes: usize,
}

impl Default for CryptoServiceConfig {
    fn default() -> Self {
        Self {
            nonce_size_bytes: GCM_NONCE_SIZE,
        }
    }
}

impl CryptoServiceConfig {
    /// Apply a `crypto.*` override
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "nonce_size_bytes" => {
                self.nonce_size_bytes = value
                    .parse()
                    .map_err(|_| VaultError::config(format!("Invalid nonce size: {value}")))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl ConfigValidation for CryptoServiceConfig {
    fn validate(&self) -> Result<()> {
        if self.nonce_size_bytes != GCM_NONCE_SIZE {
            return Err(VaultError::config(format!(
                "AES-GCM nonce must be {GCM_NONCE_SIZE} bytes, got {}",
                self.nonce_size_bytes
            )));
        }
        Ok(())
    }
}

/// How master keys are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KmsMode {
    /// Explicit per-container keys with an optional default key
    #[default]
    Static,
    /// Every container key is derived from one root key
    Derived,
}

/// Master key bound to one account/container pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerKeyConfig {
    /// Account id
    pub account: u16,
    /// Container id
    pub container: u16,
    /// Hex-encoded key
    pub key: String,
}

impl fmt::Debug for ContainerKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerKeyConfig")
            .field("account", &self.account)
            .field("container", &self.container)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Configuration for the key-management services
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmsConfig {
    /// Resolution mode
    pub mode: KmsMode,
    /// Hex key used for any container without an explicit entry (static mode)
    pub default_key: Option<String>,
    /// Explicit per-container keys (static mode)
    pub container_keys: Vec<ContainerKeyConfig>,
    /// Hex root key all container keys are derived from (derived mode)
    pub root_key: Option<String>,
    /// Size of per-blob keys minted by `random_key`
    pub random_key_size_bits: u32,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            mode: KmsMode::Static,
            default_key: None,
            container_keys: Vec::new(),
            root_key: None,
            random_key_size_bits: KeySize::Aes256.bits(),
        }
    }
}

impl KmsConfig {
    /// Single-key configuration: every container resolves to `default_key`
    pub fn single_key(default_key: &SecretKey) -> Self {
        Self {
            default_key: Some(default_key.to_hex()),
            ..Self::default()
        }
    }

    /// Derived configuration rooted at `root_key`
    pub fn derived(root_key: &SecretKey) -> Self {
        Self {
            mode: KmsMode::Derived,
            root_key: Some(root_key.to_hex()),
            ..Self::default()
        }
    }

    /// Add an explicit key for one container
    pub fn with_container_key(mut self, account: u16, container: u16, key: &SecretKey) -> Self {
        self.container_keys.push(ContainerKeyConfig {
            account,
            container,
            key: key.to_hex(),
        });
        self
    }

    /// Per-blob key size
    pub fn random_key_size(&self) -> Result<KeySize> {
        KeySize::try_from(self.random_key_size_bits)
    }

    /// Apply a `kms.*` override
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "mode" => {
                self.mode = match value {
                    "static" => KmsMode::Static,
                    "derived" => KmsMode::Derived,
                    other => {
                        return Err(VaultError::config(format!("Unknown KMS mode: {other}")))
                    }
                };
            }
            "default_key" => self.default_key = Some(value.to_string()),
            "root_key" => self.root_key = Some(value.to_string()),
            "random_key_size_bits" => {
                self.random_key_size_bits = value
                    .parse()
                    .map_err(|_| VaultError::config(format!("Invalid key size: {value}")))?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl ConfigValidation for KmsConfig {
    fn validate(&self) -> Result<()> {
        self.random_key_size()?;

        let check = |label: &str, encoded: &str| {
            SecretKey::from_hex(encoded)
                .map(|_| ())
                .map_err(|e| VaultError::config(format!("Invalid {label}: {e}")))
        };

        match self.mode {
            KmsMode::Static => {
                if self.default_key.is_none() && self.container_keys.is_empty() {
                    return Err(VaultError::config(
                        "Static KMS needs a default_key or at least one container key",
                    ));
                }
                if let Some(key) = &self.default_key {
                    check("default_key", key)?;
                }
                for entry in &self.container_keys {
                    check(
                        &format!("key for {}/{}", entry.account, entry.container),
                        &entry.key,
                    )?;
                }
            }
            KmsMode::Derived => match &self.root_key {
                Some(key) => check("root_key", key)?,
                None => return Err(VaultError::config("Derived KMS needs a root_key")),
            },
        }
        Ok(())
    }
}

impl fmt::Debug for KmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsConfig")
            .field("mode", &self.mode)
            .field("default_key", &self.default_key.as_ref().map(|_| "<redacted>"))
            .field("container_keys", &self.container_keys)
            .field("root_key", &self.root_key.as_ref().map(|_| "<redacted>"))
            .field("random_key_size_bits", &self.random_key_size_bits)
            .finish()
    }
}
