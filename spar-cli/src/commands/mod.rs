pub mod deploy;
pub mod init;
pub mod plan;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use spar_core::config::DEFAULT_CONFIG_FILE;
use spar_core::DeployConfig;

/// `--config` shared by every command that reads `spar.yaml`.
#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Path to the deploy configuration.
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

/// File values the command line may replace.
#[derive(Debug, Default)]
pub struct Overrides {
    pub grace_period_secs: Option<u64>,
    pub public_root: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

impl ConfigArg {
    /// Load and validate the config, then apply command-line overrides.
    pub fn load(&self, overrides: Overrides) -> Result<DeployConfig> {
        let mut config = DeployConfig::load_at(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;

        if let Some(secs) = overrides.grace_period_secs {
            config.grace_period_secs = secs;
        }
        if let Some(root) = overrides.public_root {
            config.public_root = root;
        }
        if let Some(n) = overrides.concurrency {
            config.concurrency = n;
        }
        config
            .validate()
            .context("invalid command-line override")?;
        Ok(config)
    }
}

/// Multi-threaded runtime for the async pipeline.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
