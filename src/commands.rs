//! CLI command definitions
//!
//! Defines the clap commands for the confcheck CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::endpoint::Role;

#[derive(Subcommand)]
pub enum Commands {
    /// Run scenario files against the configured endpoints
    Run {
        /// Paths to YAML scenario files, run in the order given
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,

        /// Stop the suite after the first failing scenario
        #[arg(long)]
        fail_fast: bool,

        /// Write a JSON summary of the suite to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check scenario files without contacting any endpoint
    Validate {
        /// Paths to YAML scenario files
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,

        /// Print the command each action would send
        #[arg(long)]
        print_commands: bool,
    },

    /// Run one command on an endpoint and classify the result
    Exec {
        /// Endpoint role: authority (master) or device (agent)
        #[arg(long)]
        on: Role,

        /// Read the exit code as a detailed agent-run code
        #[arg(long)]
        agent_run: bool,

        /// Acceptable exit code; repeat for several (default: 0)
        #[arg(long = "accept")]
        accept: Vec<i32>,

        /// Output must contain this text; repeat for several
        #[arg(long, conflicts_with = "lacks")]
        contains: Vec<String>,

        /// Output must not contain this text; repeat for several
        #[arg(long)]
        lacks: Vec<String>,

        /// Command to run, passed to the endpoint's shell as one string
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}
