//! Ravel CLI entry point.
//!
//! Binary name: `ravel`
//!
//! Parses arguments, installs tracing, then dispatches to a command handler.

mod cli;

use clap::Parser;
use ravel_observe::{LogFormat, TracingOptions};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,ravel_core=debug",
        _ => "trace",
    };
    ravel_observe::init_tracing_with(TracingOptions {
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        enable_otel: cli.otel,
        default_filter: default_filter.to_string(),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = match cli.command {
        Commands::Replay(args) => cli::replay::run(args, cli.quiet).await,
        Commands::Config { config } => cli::config::show(&config).await,
    };

    ravel_observe::shutdown_tracing();
    result
}
