// CLI for key generation, config checks and pipeline smoke tests

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands {
    pub mod check_config;
    pub mod gen_key;
    pub mod roundtrip;
}

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Vault - blob envelope encryption pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh random key as hex
    GenKey {
        /// Key size in bits (128 or 256)
        #[arg(short, long, default_value = "256")]
        bits: u32,
    },

    /// Load and validate a pipeline config file
    CheckConfig {
        /// Config file path (.toml or .json)
        file: PathBuf,
    },

    /// Encrypt then decrypt random blobs through a pipeline
    Roundtrip {
        /// Config file path; a throwaway single-key config is used when absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of blobs
        #[arg(short, long, default_value = "10")]
        blobs: usize,

        /// Maximum blob size in bytes
        #[arg(short, long, default_value = "10000")]
        size: usize,

        /// Worker threads, overriding the config
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::GenKey { bits } => commands::gen_key::run(bits),
        Commands::CheckConfig { file } => commands::check_config::run(&file),
        Commands::Roundtrip {
            config,
            blobs,
            size,
            workers,
        } => commands::roundtrip::run(config.as_deref(), blobs, size, workers).await,
    }
}
