//! Core configuration traits for the vault configuration system

use crate::{Result, VaultError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Prefix of environment variables that override configuration values
///
/// Sections are separated by a double underscore, so
/// `VAULT_QUEUE__CAPACITY=64` sets `queue.capacity`.
pub const ENV_PREFIX: &str = "VAULT_";

/// Trait for configuration validation
pub trait ConfigValidation {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Core trait for vault configuration types
pub trait VaultConfig:
    ConfigValidation + Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Load configuration from a TOML or JSON file, chosen by extension
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VaultError::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Err(VaultError::config(format!(
                "Unsupported config file format: {}",
                path.display()
            ))),
        }
    }

    /// Set a configuration value addressed by a dotted path (e.g. `queue.capacity`)
    ///
    /// Returns `Ok(false)` when the key is not known to this configuration.
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<bool>;

    /// Apply overrides from `(name, value)` pairs shaped like environment variables
    fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(path) = env_key_to_path(&name) {
                self.set_from_string(&path, &value)?;
            }
        }
        Ok(())
    }

    /// Merge with environment variables
    fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Defaults, then the optional file, then the environment; validated
    fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }
}

/// Map `VAULT_QUEUE__CAPACITY` to `queue.capacity`
///
/// Returns `None` for variables without the vault prefix.
pub fn env_key_to_path(name: &str) -> Option<String> {
    let rest = name.strip_prefix(ENV_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_lowercase().replace("__", "."))
}
