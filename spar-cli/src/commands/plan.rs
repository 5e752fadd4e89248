//! `spar plan`: scan, list and reconcile without touching the bucket.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use spar_core::ReconciliationPlan;
use spar_sync::{format::format_seconds, Deployment};

use super::{runtime, ConfigArg, Overrides};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Emit the plan as JSON.
    #[arg(long)]
    pub json: bool,

    /// Override grace_period_secs.
    #[arg(long, value_name = "SECS")]
    pub grace_period: Option<u64>,

    /// Override public_root.
    #[arg(long, value_name = "DIR")]
    pub public_root: Option<PathBuf>,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load(Overrides {
            grace_period_secs: self.grace_period,
            public_root: self.public_root,
            concurrency: None,
        })?;
        let bucket = config.bucket.clone();
        let deployment = Deployment::from_config(config).context("failed to set up backends")?;

        let plan = runtime()?
            .block_on(deployment.plan(Utc::now()))
            .with_context(|| format!("failed to plan deploy to '{bucket}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }
        print_plan(&bucket, &plan);
        Ok(())
    }
}

fn print_plan(bucket: &str, plan: &ReconciliationPlan) {
    println!(
        "Plan for '{}' | {} upload(s) | {} delete(s) | {} deferred | {} invalidation(s)",
        bucket,
        plan.to_upload.len(),
        plan.to_delete.len(),
        plan.deferred.len(),
        plan.to_invalidate.len(),
    );

    let mut rows = Vec::new();
    for key in plan.asset_uploads() {
        rows.push(PlanRow {
            action: "upload".green().to_string(),
            key: key.to_string(),
            detail: String::new(),
        });
    }
    if let Some(alias) = &plan.favicon_alias {
        rows.push(PlanRow {
            action: "alias".cyan().to_string(),
            key: alias.target.to_string(),
            detail: format!("copy of {}", alias.source),
        });
    }
    for key in &plan.index_documents {
        rows.push(PlanRow {
            action: "upload".green().to_string(),
            key: key.to_string(),
            detail: "index document".to_string(),
        });
    }
    for key in &plan.to_delete {
        rows.push(PlanRow {
            action: "delete".red().to_string(),
            key: key.to_string(),
            detail: String::new(),
        });
    }
    for deferred in &plan.deferred {
        rows.push(PlanRow {
            action: "keep".yellow().to_string(),
            key: deferred.key.to_string(),
            detail: format!("orphan, age {}", format_seconds(deferred.age_secs)),
        });
    }
    rows.push(PlanRow {
        action: "write".green().to_string(),
        key: plan.timestamp_key.to_string(),
        detail: "deploy watermark".to_string(),
    });

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if !plan.unmanaged.is_empty() {
        println!(
            "{} {} local file(s) outside the asset tree are not published",
            "note:".bright_black(),
            plan.unmanaged.len()
        );
    }
}
