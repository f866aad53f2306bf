//! Secret key material
//!
//! `SecretKey` is the opaque key value passed between the key-management and
//! crypto services. It is zeroized on drop, compares in constant time, and
//! never prints its bytes.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use vault_core::{Result, VaultError};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Supported symmetric key sizes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum KeySize {
    /// 128-bit key (AES-128-GCM)
    Aes128,
    /// 256-bit key (AES-256-GCM)
    #[default]
    Aes256,
}

impl KeySize {
    /// Key length in bits
    pub fn bits(self) -> u32 {
        match self {
            Self::Aes128 => 128,
            Self::Aes256 => 256,
        }
    }

    /// Key length in bytes
    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Key size for a byte length, if supported
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Aes128),
            32 => Some(Self::Aes256),
            _ => None,
        }
    }
}

impl TryFrom<u32> for KeySize {
    type Error = VaultError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(Self::Aes128),
            256 => Ok(Self::Aes256),
            other => Err(VaultError::config(format!(
                "Unsupported key size {other} bits, expected 128 or 256"
            ))),
        }
    }
}

impl From<KeySize> for u32 {
    fn from(size: KeySize) -> Self {
        size.bits()
    }
}

/// Symmetric key bytes
///
/// Construction validates the length (16 or 32 bytes) and rejects the
/// all-zero key, so a `SecretKey` is always usable by the crypto service.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    /// Wrap existing key bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut bytes = bytes;
        if KeySize::from_len(bytes.len()).is_none() {
            let len = bytes.len();
            bytes.zeroize();
            return Err(VaultError::invalid(format!(
                "Key must be 16 or 32 bytes, got {len}"
            )));
        }
        if bytes.iter().all(|b| *b == 0) {
            return Err(VaultError::invalid("Key must not be all zeros"));
        }
        Ok(Self { bytes })
    }

    /// Parse a hex-encoded key
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| VaultError::invalid(format!("Key is not valid hex: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Generate a fresh key from the thread-local CSPRNG
    pub fn generate(size: KeySize) -> Self {
        let mut bytes = vec![0u8; size.bytes()];
        loop {
            rand::thread_rng().fill_bytes(&mut bytes);
            if bytes.iter().any(|b| *b != 0) {
                return Self { bytes };
            }
        }
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty keys cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Key size class
    pub fn size(&self) -> KeySize {
        match self.bytes.len() {
            16 => KeySize::Aes128,
            _ => KeySize::Aes256,
        }
    }

    /// Short non-secret identifier for logs (first 8 bytes of BLAKE3, hex)
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vault-key-fingerprint-v1:");
        hasher.update(&self.bytes);
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }

    /// Hex encoding of the key bytes
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.len() == other.bytes.len() && bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("bits", &self.size().bits())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sizes() {
        assert_eq!(SecretKey::generate(KeySize::Aes128).len(), 16);
        assert_eq!(SecretKey::generate(KeySize::Aes256).len(), 32);
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = SecretKey::generate(KeySize::Aes256);
        let b = SecretKey::generate(KeySize::Aes256);
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_bad_lengths_and_zero_key() {
        assert!(SecretKey::from_bytes(vec![1u8; 24]).is_err());
        assert!(SecretKey::from_bytes(Vec::new()).is_err());
        assert!(SecretKey::from_bytes(vec![0u8; 32]).is_err());
        assert!(SecretKey::from_bytes(vec![1u8; 32]).is_ok());
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = SecretKey::generate(KeySize::Aes128);
        let parsed = SecretKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(parsed, key);
        assert!(SecretKey::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_hides_key_bytes() {
        let key = SecretKey::from_bytes(vec![0xab; 32]).unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains(&key.to_hex()));
        assert!(rendered.contains(&key.fingerprint()));
    }

    #[test]
    fn test_key_size_from_bits() {
        assert_eq!(KeySize::try_from(128).unwrap(), KeySize::Aes128);
        assert_eq!(KeySize::try_from(256).unwrap(), KeySize::Aes256);
        assert!(KeySize::try_from(192).is_err());
    }
}
