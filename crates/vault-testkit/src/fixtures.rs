//! Blob and key fixtures

use rand::{Rng, RngCore};
use vault_core::BlobId;
use vault_crypto::{KeySize, KmsConfig, SecretKey};

/// Upper bound (exclusive) on random payload sizes
pub const MAX_DATA_SIZE: usize = 10_000;

/// Blob id with random account, container and partition
pub fn random_blob_id() -> BlobId {
    let mut rng = rand::thread_rng();
    BlobId::new(rng.gen::<u16>(), rng.gen::<u16>(), rng.gen::<u64>())
}

/// Random payload of 0 to `MAX_DATA_SIZE - 1` bytes
pub fn random_data() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut data = vec![0u8; rng.gen_range(0..MAX_DATA_SIZE)];
    rng.fill_bytes(&mut data);
    data
}

/// Fresh AES-256 master key
pub fn test_master_key() -> SecretKey {
    SecretKey::generate(KeySize::Aes256)
}

/// Single-key KMS configuration around a fresh master key
pub fn single_key_kms_config() -> (SecretKey, KmsConfig) {
    let key = test_master_key();
    let config = KmsConfig::single_key(&key);
    (key, config)
}
