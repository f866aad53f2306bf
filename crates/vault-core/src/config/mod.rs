//! Configuration system for the vault crates
//!
//! Configuration structs are plain serde types. The `VaultConfig` trait layers
//! file loading, environment overrides and validation on top of them.

mod traits;

pub use traits::{env_key_to_path, ConfigValidation, VaultConfig, ENV_PREFIX};
