//! Vault Testing Infrastructure
//!
//! Failure-injecting service doubles, blob fixtures, proptest strategies and a
//! thread-safe callback recorder shared by the vault test suites.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! vault-testkit = { path = "../vault-testkit" }
//! ```

pub mod fixtures;
pub mod mocks;
pub mod recorder;
pub mod strategies;

pub use fixtures::*;
pub use mocks::{MockCryptoService, MockKeyManagementService};
pub use recorder::CallbackLog;

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per process
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
