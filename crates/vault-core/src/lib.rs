//! Vault Core - shared foundation for the blob encryption pipeline
//!
//! This crate holds the small set of types every other vault crate agrees on.
//! It contains no cryptography and no threading; those live in `vault-crypto`
//! and `vault-pipeline` respectively.
//!
//! ## Contents
//! - `VaultError`: the single error type surfaced through job callbacks
//! - `BlobId` and the account/container/partition identifiers it embeds
//! - `VaultConfig`: load/merge/validate contract for configuration structs

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Configuration loading and validation
pub mod config;

/// Blob, account, container and partition identifiers
pub mod types;

pub use config::{ConfigValidation, VaultConfig};
pub use errors::{Result, VaultError};
pub use types::identifiers::{AccountId, BlobId, ContainerId, PartitionId};
