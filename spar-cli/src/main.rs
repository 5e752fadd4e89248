//! spar: publish a static build to object storage behind a CDN.
//!
//! # Usage
//!
//! ```text
//! spar init [PATH] [--bucket <name>] [--force]
//! spar plan [--config spar.yaml] [--json] [--grace-period <secs>] [--public-root <dir>]
//! spar deploy [--config spar.yaml] [--dry-run] [--concurrency <n>] [--grace-period <secs>] [--public-root <dir>]
//! spar status [--config spar.yaml] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{deploy::DeployArgs, init::InitArgs, plan::PlanArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "spar",
    version,
    about = "Publish content-addressed static assets to object storage and purge the CDN",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter spar.yaml.
    Init(InitArgs),

    /// Show what a deploy would upload, delete and invalidate.
    Plan(PlanArgs),

    /// Publish the build output.
    Deploy(DeployArgs),

    /// Show the last deploy watermark and remote object count.
    Status(StatusArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Deploy(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output on stdout stays clean.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
