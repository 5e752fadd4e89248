//! `spar deploy`: full publish run.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use spar_sync::{CancellationToken, DeployOptions, Deployment, InvalidationOutcome, PublishReport};

use super::{runtime, ConfigArg, Overrides};

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Report what would be written and deleted without touching the bucket.
    #[arg(long)]
    pub dry_run: bool,

    /// Override concurrency (parallel uploads).
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Override grace_period_secs.
    #[arg(long, value_name = "SECS")]
    pub grace_period: Option<u64>,

    /// Override public_root.
    #[arg(long, value_name = "DIR")]
    pub public_root: Option<PathBuf>,
}

impl DeployArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load(Overrides {
            grace_period_secs: self.grace_period,
            public_root: self.public_root,
            concurrency: self.concurrency,
        })?;
        let bucket = config.bucket.clone();
        let deployment = Deployment::from_config(config).context("failed to set up backends")?;

        let cancel = CancellationToken::new();
        let options = DeployOptions {
            dry_run: self.dry_run,
            cancel: cancel.clone(),
        };

        let outcome = runtime()?.block_on(async {
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received; finishing in-flight uploads");
                    cancel.cancel();
                }
            });
            deployment.deploy(options).await
        });
        let outcome = outcome.with_context(|| format!("deploy to '{bucket}' failed"))?;

        print_report(&bucket, &outcome.report);
        if !outcome.report.is_success() {
            bail!("deploy to '{bucket}' did not complete successfully");
        }
        Ok(())
    }
}

fn print_report(bucket: &str, report: &PublishReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let verb = if report.dry_run { "would upload" } else { "uploaded" };
    let delete_verb = if report.dry_run { "would delete" } else { "deleted" };

    for failure in &report.upload_failures {
        println!("{} {}", "✗".red(), failure);
    }
    for failure in &report.delete_failures {
        println!("{} {}", "!".yellow(), failure);
    }
    for skipped in &report.skipped_deletes {
        println!(
            "{} kept {} ({})",
            "!".yellow(),
            skipped.key,
            skipped.reason.as_str()
        );
    }
    if let Some(err) = &report.timestamp_error {
        println!("{} {}", "✗".red(), err);
    }

    match &report.invalidation {
        InvalidationOutcome::Submitted { id, paths } => {
            println!("  invalidation {id} submitted for {} path(s)", paths.len());
        }
        InvalidationOutcome::Failed(err) => println!("{} {}", "!".yellow(), err),
        InvalidationOutcome::Skipped => {}
    }

    let mark = if report.is_success() {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "{prefix}{mark} '{bucket}': {} {verb}, {} {delete_verb}{}{}",
        report.uploaded.len(),
        report.deleted.len(),
        report
            .alias_copied
            .as_ref()
            .map(|alias| format!(", alias {alias}"))
            .unwrap_or_default(),
        if report.cancelled { " (cancelled)" } else { "" },
    );
}
