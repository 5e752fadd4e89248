//! `spar status`: last deploy watermark and remote object count.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use spar_sync::{format::format_age, Deployment, RemoteStatus};

use super::{runtime, ConfigArg, Overrides};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    #[serde(flatten)]
    status: RemoteStatus,
    last_deploy_age: Option<String>,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load(Overrides::default())?;
        let bucket = config.bucket.clone();
        let deployment = Deployment::from_config(config).context("failed to set up backends")?;

        let status = runtime()?
            .block_on(deployment.status())
            .with_context(|| format!("failed to read status of '{bucket}'"))?;
        let age = status.last_deploy.map(|t| format_age(t, Utc::now()));

        if self.json {
            let payload = StatusJson {
                status,
                last_deploy_age: age,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        println!("spar v{} | bucket '{}'", env!("CARGO_PKG_VERSION"), status.bucket);
        match (status.last_deploy, age) {
            (Some(at), Some(age)) => println!(
                "  last deploy: {} ({} ago)",
                at.to_rfc3339().bold(),
                age
            ),
            _ => println!("  last deploy: {}", "never".yellow()),
        }
        println!("  objects under {}: {}", status.prefix, status.object_count);
        Ok(())
    }
}
