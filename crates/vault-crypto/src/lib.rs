//! Vault Crypto: services behind the blob encryption pipeline
//!
//! The pipeline only ever talks to two traits:
//!
//! - [`CryptoService`]: stateless encrypt/decrypt of byte strings under a key
//! - [`KeyManagementService`]: per-container master keys and fresh per-blob keys
//!
//! Both are `Send + Sync` so a pool of workers can share one instance. The
//! reference implementations here are AES-GCM ([`GcmCryptoService`]) and a
//! configuration-driven key store ([`StaticKeyManagementService`]) or an
//! HKDF-derived key hierarchy ([`DerivedKeyManagementService`]).

#![allow(clippy::result_large_err)]

/// Crypto and key-management configuration
pub mod config;

/// Crypto service trait and the AES-GCM reference implementation
pub mod crypto_service;

/// Key-management trait and reference implementations
pub mod kms;

/// Secret key material
pub mod key;

pub use config::{ContainerKeyConfig, CryptoServiceConfig, KmsConfig, KmsMode};
pub use crypto_service::{CryptoService, GcmCryptoService};
pub use key::{KeySize, SecretKey};
pub use kms::{
    build_kms, DerivedKeyManagementService, KeyManagementService, StaticKeyManagementService,
};

// Error types - unified error system
pub use vault_core::{Result, VaultError};
/// Cryptographic operation error alias
pub type CryptoError = VaultError;
