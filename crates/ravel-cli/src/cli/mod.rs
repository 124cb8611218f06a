//! CLI command definitions and dispatch for the `ravel` binary.

pub mod config;
pub mod render;
pub mod replay;
pub mod tools;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Run agents against recorded model scripts.
#[derive(Parser)]
#[command(name = "ravel", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Only print the final outcome and errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log detail (-v for engine debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "RAVEL_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a recorded provider script through the full engine.
    Replay(ReplayArgs),

    /// Print the effective configuration.
    Config {
        /// Path to the configuration file.
        #[arg(long, default_value = ravel_infra::config::CONFIG_FILE_NAME)]
        config: PathBuf,
    },
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Path to the configuration file.
    #[arg(long, default_value = ravel_infra::config::CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// JSON-lines script, one model invocation per line. Repeat to give each
    /// configured provider its own script, in `agent.providers` order.
    #[arg(long, required = true)]
    pub script: Vec<PathBuf>,

    /// The task handed to the agent.
    #[arg(long)]
    pub task: String,

    /// Save the final history to this JSON file.
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Continue from the history file instead of starting fresh.
    #[arg(long, requires = "history")]
    pub resume: bool,

    /// Task identifier attached to every notification.
    #[arg(long)]
    pub task_id: Option<String>,
}
