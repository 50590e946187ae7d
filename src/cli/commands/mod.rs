//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod task;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use attachd::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "attachd")]
#[command(about = "Attachment retrieval for script-driven pages")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Working directory for downloads (overrides config file)
    #[arg(long, global = true, env = "ATTACHD_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task and print its result as JSON
    Run {
        /// Task id, used as the upload name prefix
        #[arg(long)]
        id: String,
        /// Page that carries the attachments
        #[arg(long)]
        url: String,
    },

    /// Run every task of a job submission, one after another
    Batch {
        /// Submission file (reads stdin when omitted or "-")
        file: Option<PathBuf>,
    },

    /// Print the resolved settings as JSON
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        work_dir: cli.work_dir,
    };
    let (settings, _config) = load_settings_with_options(options)
        .await
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Run { id, url } => task::cmd_run(settings, &id, &url).await,
        Commands::Batch { file } => task::cmd_batch(settings, file.as_deref()).await,
        Commands::Config => config_cmd::cmd_config_show(&settings),
    }
}
