//! Luna - operations on Azure Machine Learning pipelines
//!
//! Main entry point for the Luna CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, output, status, submit};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Luna - submit and track operations on Azure Machine Learning pipelines
#[derive(Parser)]
#[command(name = "luna")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of the discovered layers
    #[arg(long, global = true, env = "LUNA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch an operation as a pipeline run
    Submit(submit::SubmitArgs),

    /// Show the status of one operation
    Status(status::StatusArgs),

    /// List every operation of a kind
    List(status::ListArgs),

    /// Show the files produced by one operation
    Output(output::OutputArgs),

    /// Show the files produced by every operation of a kind
    Outputs(output::OutputsArgs),

    /// Delete an operation's output (currently a no-op)
    DeleteOutput(output::DeleteOutputArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "luna=debug,luna_aml=debug,luna_auth=debug,luna_config=debug,info"
    } else {
        "luna=info,luna_aml=info,luna_auth=warn,luna_config=warn,warn"
    };

    let log_dir = luna_config::user_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "luna.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "luna=trace,luna_aml=trace,luna_auth=debug,luna_config=debug,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Submit(args) => submit::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::List(args) => status::run_list(args, &ctx).await,
        Commands::Output(args) => output::run(args, &ctx).await,
        Commands::Outputs(args) => output::run_list(args, &ctx).await,
        Commands::DeleteOutput(args) => output::run_delete(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
