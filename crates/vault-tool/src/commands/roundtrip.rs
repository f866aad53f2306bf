//! `vault roundtrip`: smoke test a pipeline end to end

use anyhow::{bail, Context};
use rand::{Rng, RngCore};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use vault_core::{BlobId, ConfigValidation};
use vault_crypto::{KeySize, KmsConfig, SecretKey};
use vault_pipeline::{Pipeline, PipelineConfig};

pub async fn run(
    config: Option<&Path>,
    blobs: usize,
    max_size: usize,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = match config {
        Some(path) => super::check_config::load(path)?,
        None => throwaway_config(),
    };
    if let Some(workers) = workers {
        config.workers = workers;
        config.validate()?;
    }

    let pipeline = Arc::new(Pipeline::from_config(&config).context("failed to start pipeline")?);
    let started = Instant::now();

    let mut tasks = Vec::with_capacity(blobs);
    for index in 0..blobs {
        let pipeline = pipeline.clone();
        let data = random_blob(max_size);
        tasks.push(tokio::spawn(async move {
            let blob_id = BlobId::new(1u16, 1u16, index as u64);
            let sealed = pipeline.encrypt(blob_id, data.clone()).await?;
            let opened = pipeline.decrypt(blob_id, sealed).await?;
            Ok::<bool, vault_core::VaultError>(opened == data)
        }));
    }

    let (mut matched, mut failed) = (0usize, 0usize);
    for task in tasks {
        match task.await.context("roundtrip task aborted")? {
            Ok(true) => matched += 1,
            Ok(false) => {
                tracing::warn!("Decrypted blob differs from its plaintext");
                failed += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Roundtrip failed");
                failed += 1;
            }
        }
    }

    pipeline.close();
    let stats = pipeline.stats();
    println!(
        "{matched}/{blobs} blobs round-tripped in {:?} ({} jobs, {} failed, {} workers)",
        started.elapsed(),
        stats.processed,
        stats.failed,
        config.workers,
    );

    if failed > 0 {
        bail!("{failed} of {blobs} blobs failed to round-trip");
    }
    Ok(())
}

fn throwaway_config() -> PipelineConfig {
    PipelineConfig::with_kms(KmsConfig::single_key(&SecretKey::generate(KeySize::Aes256)))
}

fn random_blob(max_size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut data = vec![0u8; rng.gen_range(0..=max_size)];
    rng.fill_bytes(&mut data);
    data
}
