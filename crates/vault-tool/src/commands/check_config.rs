//! `vault check-config`

use anyhow::Context;
use std::path::Path;
use vault_core::VaultConfig;
use vault_pipeline::PipelineConfig;

pub fn run(file: &Path) -> anyhow::Result<()> {
    let config = load(file)?;
    println!(
        "{}: ok ({} workers, kms {:?}, queue capacity {})",
        file.display(),
        config.workers,
        config.kms.mode,
        config
            .queue
            .capacity
            .map_or_else(|| "unbounded".to_string(), |c| c.to_string()),
    );
    Ok(())
}

/// Load a config file, apply `VAULT_*` overrides and validate
pub fn load(file: &Path) -> anyhow::Result<PipelineConfig> {
    PipelineConfig::load(Some(file)).with_context(|| format!("invalid config {}", file.display()))
}
