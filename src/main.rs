//! confcheck - verify configuration-management behaviour on network devices
//!
//! Runs YAML scenarios that stage manifests on a configuration authority,
//! trigger agent runs on a managed switch, and check exit codes and output.

use clap::Parser;
use confcheck::cli::{self, GlobalOptions};
use confcheck::commands::Commands;
use confcheck::common::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "confcheck", about = "Scenario-driven configuration checks for network devices")]
#[command(version, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, e.g. ~/.config/confcheck/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also log to a file; without a path, the platform log directory is used
    #[arg(long, global = true)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_path = match &cli.log_file {
        Some(Some(path)) => Some(path.clone()),
        Some(None) => logging::default_log_path(),
        None => None,
    };
    let guard = match log_path {
        Some(path) => match logging::init_with_file(cli.verbose, &path) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("Error: cannot open log file '{}': {e}", path.display());
                std::process::exit(1);
            }
        },
        None => {
            logging::init_cli(cli.verbose);
            None
        }
    };

    let options = GlobalOptions {
        config: cli.config,
        verbose: cli.verbose,
    };

    let code = match cli::dispatch(cli.command, &options).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    // Flush the file writer before exiting
    drop(guard);
    std::process::exit(code);
}
