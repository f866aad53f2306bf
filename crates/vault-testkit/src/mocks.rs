//! Failure-injecting service doubles
//!
//! Both mocks delegate to the real implementations until a failure is armed,
//! after which every matching call returns the armed error until cleared.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use vault_core::{AccountId, ContainerId, Result, VaultError};
use vault_crypto::{
    CryptoService, GcmCryptoService, KeyManagementService, KeySize, SecretKey,
    StaticKeyManagementService,
};

/// GCM crypto service with switchable encrypt/decrypt failures
#[derive(Debug, Default)]
pub struct MockCryptoService {
    inner: GcmCryptoService,
    // Armed error and the call count after which it applies
    encrypt_failure: Mutex<Option<(usize, VaultError)>>,
    decrypt_failure: Mutex<Option<VaultError>>,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl MockCryptoService {
    /// Mock that behaves like `GcmCryptoService` until armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent `encrypt` with `error`
    pub fn fail_encrypt(&self, error: VaultError) {
        self.fail_encrypt_after(0, error);
    }

    /// Let the next `successes` calls to `encrypt` through, then fail every
    /// later one with `error`
    pub fn fail_encrypt_after(&self, successes: usize, error: VaultError) {
        let threshold = self.encrypt_calls() + successes;
        *self.encrypt_failure.lock() = Some((threshold, error));
    }

    /// Fail every subsequent `decrypt` with `error`
    pub fn fail_decrypt(&self, error: VaultError) {
        *self.decrypt_failure.lock() = Some(error);
    }

    /// Disarm both failures
    pub fn clear_failures(&self) {
        *self.encrypt_failure.lock() = None;
        *self.decrypt_failure.lock() = None;
    }

    /// Calls to `encrypt` so far
    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    /// Calls to `decrypt` so far
    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

impl CryptoService for MockCryptoService {
    fn encrypt(&self, data: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
        let call = self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((threshold, error)) = self.encrypt_failure.lock().as_ref() {
            if call >= *threshold {
                return Err(error.clone());
            }
        }
        self.inner.encrypt(data, key)
    }

    fn decrypt(&self, record: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.decrypt_failure.lock().clone() {
            return Err(error);
        }
        self.inner.decrypt(record, key)
    }
}

/// Single-key KMS with a switchable master-key failure
#[derive(Debug)]
pub struct MockKeyManagementService {
    inner: StaticKeyManagementService,
    key_failure: Mutex<Option<VaultError>>,
    random_key_failure: Mutex<Option<VaultError>>,
}

impl MockKeyManagementService {
    /// Mock resolving every container to `master_key`
    pub fn new(master_key: SecretKey) -> Self {
        Self {
            inner: StaticKeyManagementService::single_key(master_key, KeySize::Aes256),
            key_failure: Mutex::new(None),
            random_key_failure: Mutex::new(None),
        }
    }

    /// Fail every subsequent `key` lookup with `error`
    pub fn fail_key(&self, error: VaultError) {
        *self.key_failure.lock() = Some(error);
    }

    /// Fail every subsequent `random_key` with `error`
    pub fn fail_random_key(&self, error: VaultError) {
        *self.random_key_failure.lock() = Some(error);
    }

    /// Disarm both failures
    pub fn clear_failures(&self) {
        *self.key_failure.lock() = None;
        *self.random_key_failure.lock() = None;
    }
}

impl KeyManagementService for MockKeyManagementService {
    fn key(&self, account: AccountId, container: ContainerId) -> Result<SecretKey> {
        if let Some(error) = self.key_failure.lock().clone() {
            return Err(error);
        }
        self.inner.key(account, container)
    }

    fn random_key(&self) -> Result<SecretKey> {
        if let Some(error) = self.random_key_failure.lock().clone() {
            return Err(error);
        }
        self.inner.random_key()
    }
}
