//! Envelope encryption steps run by a worker for one job
//!
//! Encrypt: content under the per-blob key, then the per-blob key under the
//! container master key. Decrypt reverses it. Any failing step aborts the job
//! and intermediate output is discarded, so a caller sees either both byte
//! outputs or an error.

use crate::job::EncryptedBlob;
use vault_core::{BlobId, Result, VaultError};
use vault_crypto::{CryptoService, KeyManagementService, SecretKey};

/// Envelope-encrypt `plaintext` for `blob_id`
pub fn encrypt_blob(
    crypto: &dyn CryptoService,
    kms: &dyn KeyManagementService,
    blob_id: &BlobId,
    plaintext: &[u8],
    per_blob_key: &SecretKey,
) -> Result<EncryptedBlob> {
    let encrypted_content = crypto.encrypt(plaintext, per_blob_key)?;
    let master_key = kms.key(blob_id.account_id(), blob_id.container_id())?;
    let encrypted_key = crypto.encrypt(per_blob_key.as_bytes(), &master_key)?;

    Ok(EncryptedBlob {
        encrypted_key,
        encrypted_content,
    })
}

/// Envelope-decrypt the two halves produced by [`encrypt_blob`]
pub fn decrypt_blob(
    crypto: &dyn CryptoService,
    kms: &dyn KeyManagementService,
    blob_id: &BlobId,
    encrypted_key: &[u8],
    encrypted_content: &[u8],
) -> Result<Vec<u8>> {
    let master_key = kms.key(blob_id.account_id(), blob_id.container_id())?;
    let per_blob_key = SecretKey::from_bytes(crypto.decrypt(encrypted_key, &master_key)?)
        .map_err(|e| VaultError::crypto(format!("Unwrapped per-blob key is unusable: {e}")))?;

    crypto.decrypt(encrypted_content, &per_blob_key)
}
