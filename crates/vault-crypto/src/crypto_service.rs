//! Crypto service: stateless encryption of byte strings
//!
//! The AES-GCM service picks AES-128-GCM or AES-256-GCM from the key length,
//! draws a fresh random nonce per call, and embeds it in the output record:
//!
//! ```text
//! version (1 byte) || nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```

use crate::config::{CryptoServiceConfig, GCM_NONCE_SIZE};
use crate::key::SecretKey;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use rand::RngCore;
use vault_core::{ConfigValidation, Result, VaultError};

/// Record format version written by [`GcmCryptoService`]
pub const RECORD_VERSION: u8 = 1;

const TAG_SIZE: usize = 16;

/// Encrypt/decrypt primitive used by pipeline workers
///
/// Implementations hold no per-call mutable state; one instance is shared by
/// every worker. `decrypt(encrypt(x, k), k) == x` for every key the
/// key-management service hands out, and a wrong key or tampered input must
/// fail with [`VaultError::Crypto`] rather than return garbage.
pub trait CryptoService: Send + Sync {
    /// Encrypt `data` under `key`
    fn encrypt(&self, data: &[u8], key: &SecretKey) -> Result<Vec<u8>>;

    /// Decrypt a record produced by [`CryptoService::encrypt`]
    fn decrypt(&self, record: &[u8], key: &SecretKey) -> Result<Vec<u8>>;
}

/// AES-GCM crypto service
#[derive(Debug, Clone, Default)]
pub struct GcmCryptoService {
    config: CryptoServiceConfig,
}

enum GcmCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl GcmCipher {
    fn for_key(key: &SecretKey) -> Result<Self> {
        let bytes = key.as_bytes();
        let cipher = match bytes.len() {
            16 => Aes128Gcm::new_from_slice(bytes).map(Self::Aes128),
            32 => Aes256Gcm::new_from_slice(bytes).map(Self::Aes256),
            other => {
                return Err(VaultError::crypto(format!(
                    "Unsupported key length {other} bytes"
                )))
            }
        };
        cipher.map_err(|e| VaultError::crypto(format!("Failed to create cipher: {e}")))
    }

    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from(gcm_nonce(nonce)?);
        let sealed = match self {
            Self::Aes128(cipher) => cipher.encrypt(&nonce, plaintext),
            Self::Aes256(cipher) => cipher.encrypt(&nonce, plaintext),
        };
        sealed.map_err(|e| VaultError::crypto(format!("AES-GCM encryption failed: {e}")))
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from(gcm_nonce(nonce)?);
        let opened = match self {
            Self::Aes128(cipher) => cipher.decrypt(&nonce, ciphertext),
            Self::Aes256(cipher) => cipher.decrypt(&nonce, ciphertext),
        };
        opened.map_err(|e| VaultError::crypto(format!("AES-GCM decryption failed: {e}")))
    }
}

fn gcm_nonce(nonce: &[u8]) -> Result<[u8; GCM_NONCE_SIZE]> {
    nonce.try_into().map_err(|_| {
        VaultError::crypto(format!(
            "AES-GCM nonce must be {GCM_NONCE_SIZE} bytes, got {}",
            nonce.len()
        ))
    })
}

impl GcmCryptoService {
    /// Create a service from validated configuration
    pub fn new(config: CryptoServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &CryptoServiceConfig {
        &self.config
    }

    /// Bytes preceding the ciphertext in a record: version and nonce
    pub fn header_size(&self) -> usize {
        1 + self.config.nonce_size_bytes
    }
}

impl CryptoService for GcmCryptoService {
    fn encrypt(&self, data: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
        let cipher = GcmCipher::for_key(key)?;

        let mut nonce = vec![0u8; self.config.nonce_size_bytes];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher.seal(&nonce, data)?;

        let mut record = Vec::with_capacity(self.header_size() + ciphertext.len());
        record.push(RECORD_VERSION);
        record.extend_from_slice(&nonce);
        record.extend_from_slice(&ciphertext);
        Ok(record)
    }

    fn decrypt(&self, record: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
        let header_size = self.header_size();
        if record.len() < header_size + TAG_SIZE {
            return Err(VaultError::crypto(format!(
                "Ciphertext too short: {} bytes",
                record.len()
            )));
        }
        if record[0] != RECORD_VERSION {
            return Err(VaultError::crypto(format!(
                "Unknown record version {}",
                record[0]
            )));
        }

        GcmCipher::for_key(key)?.open(&record[1..header_size], &record[header_size..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeySize;

    #[test]
    fn test_encryption_roundtrip() {
        let service = GcmCryptoService::default();
        for size in [KeySize::Aes128, KeySize::Aes256] {
            let key = SecretKey::generate(size);
            let plaintext = b"Hello, blob!";

            let record = service.encrypt(plaintext, &key).unwrap();
            assert_eq!(
                record.len(),
                service.header_size() + plaintext.len() + TAG_SIZE
            );
            assert_eq!(record[0], RECORD_VERSION);

            let decrypted = service.decrypt(&record, &key).unwrap();
            assert_eq!(decrypted.as_slice(), plaintext);
        }
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let service = GcmCryptoService::default();
        let key = SecretKey::generate(KeySize::Aes256);
        let record = service.encrypt(&[], &key).unwrap();
        assert!(service.decrypt(&record, &key).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let service = GcmCryptoService::default();
        let key = SecretKey::generate(KeySize::Aes256);
        let a = service.encrypt(b"same", &key).unwrap();
        let b = service.encrypt(b"same", &key).unwrap();
        let header = service.header_size();
        assert_eq!(header, 1 + GCM_NONCE_SIZE);
        assert_ne!(a[1..header], b[1..header]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_and_unversioned_records_fail() {
        let service = GcmCryptoService::default();
        let key = SecretKey::generate(KeySize::Aes256);
        assert!(service.decrypt(&[RECORD_VERSION; 8], &key).unwrap_err().is_crypto());

        let mut record = service.encrypt(b"payload", &key).unwrap();
        record[0] = 9;
        let err = service.decrypt(&record, &key).unwrap_err();
        assert!(err.is_crypto());
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_record_layout_follows_configured_nonce_size() {
        let service = GcmCryptoService::new(CryptoServiceConfig::default()).unwrap();
        let key = SecretKey::generate(KeySize::Aes128);
        let record = service.encrypt(b"abc", &key).unwrap();
        assert_eq!(record.len(), 1 + service.config().nonce_size_bytes + 3 + TAG_SIZE);

        // A record cut inside the nonce is rejected before any cipher work
        let truncated = &record[..service.header_size() + TAG_SIZE - 1];
        assert!(service.decrypt(truncated, &key).unwrap_err().is_crypto());
    }

    #[test]
    fn test_gcm_nonce_length_checked() {
        assert!(gcm_nonce(&[0u8; GCM_NONCE_SIZE]).is_ok());
        assert!(gcm_nonce(&[0u8; 8]).unwrap_err().is_crypto());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CryptoServiceConfig {
            nonce_size_bytes: 8,
        };
        assert!(GcmCryptoService::new(config).is_err());
    }
}
