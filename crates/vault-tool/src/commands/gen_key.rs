//! `vault gen-key`

use anyhow::Context;
use vault_crypto::{KeySize, SecretKey};

pub fn run(bits: u32) -> anyhow::Result<()> {
    let size = KeySize::try_from(bits).context("unsupported key size")?;
    let key = SecretKey::generate(size);
    tracing::debug!(bits, fingerprint = %key.fingerprint(), "Generated key");
    println!("{}", key.to_hex());
    Ok(())
}
