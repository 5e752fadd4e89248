//! `spar init [PATH] [--bucket <name>] [--force]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use spar_core::config::{write_template_at, DEFAULT_CONFIG_FILE};

/// Write a commented starter config.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Config file to create, or a directory to create spar.yaml in.
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub path: PathBuf,

    /// Bucket name written into the template.
    #[arg(long, short = 'b', default_value = "my-site")]
    pub bucket: String,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = if self.path.is_dir() {
            self.path.join(DEFAULT_CONFIG_FILE)
        } else {
            self.path
        };

        write_template_at(&path, &self.bucket, self.force)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!("✓ Wrote {}", path.display());
        println!("  Edit bucket and public_root, then run `spar plan`.");
        Ok(())
    }
}
