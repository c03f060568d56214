//! CLI command handling
//!
//! Loads configuration, builds the transport, and runs the requested command.
//! Every handler returns the process exit code.

use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use crate::agent::AgentCommands;
use crate::commands::Commands;
use crate::common::config::{Config, TransportKind};
use crate::common::Result;
use crate::dispatch::{verify_result, CommandRequest, Dispatcher};
use crate::endpoint::{LocalTransport, Role, SshTransport, Transport};
use crate::manifest::ManifestBuilder;
use crate::testing::{run_suite, Scenario, SuiteOptions};
use crate::verify::{AcceptableCodes, ExpectationSpec, Matcher, ResultKind};

/// Options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Explicit config file; the platform default is used otherwise
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, options: &GlobalOptions) -> Result<i32> {
    match command {
        Commands::Run {
            scenarios,
            fail_fast,
            report,
        } => {
            let config = load_config(options)?;

            // Every file is parsed and compiled before any endpoint is contacted
            let scenarios = scenarios
                .iter()
                .map(|path| Scenario::load(path))
                .collect::<Result<Vec<_>>>()?;

            let endpoints = config.endpoints()?;
            let transport = build_transport(&config)?;
            let dispatcher = Dispatcher::new(transport.as_ref(), &endpoints)
                .log_truncate(config.output.log_truncate_bytes);

            let suite_options = SuiteOptions {
                fail_fast,
                echo: true,
            };
            let summary = run_suite(&scenarios, &dispatcher, &config.agent, suite_options).await?;

            if let Some(path) = report {
                summary.write_json(&path)?;
                println!("Report written to {}", path.display());
            }

            Ok(summary.exit_code())
        }

        Commands::Validate {
            scenarios,
            print_commands,
        } => {
            let config = load_config(options)?;
            let mut invalid = 0;

            for path in &scenarios {
                match Scenario::load(path) {
                    Ok(scenario) => {
                        println!(
                            "  {} {} ({}, {} steps)",
                            "✓".green(),
                            path.display(),
                            scenario.name,
                            scenario.steps.len()
                        );
                        if print_commands {
                            print_scenario_commands(&scenario, &config)?;
                        }
                    }
                    Err(e) => {
                        invalid += 1;
                        println!("  {} {}: {}", "✗".red(), path.display(), e);
                    }
                }
            }

            Ok(if invalid == 0 { 0 } else { 1 })
        }

        Commands::Exec {
            on,
            agent_run,
            accept,
            contains,
            lacks,
            command,
        } => {
            let config = load_config(options)?;
            let endpoints = config.endpoints()?;
            let transport = build_transport(&config)?;
            let dispatcher = Dispatcher::new(transport.as_ref(), &endpoints)
                .log_truncate(config.output.log_truncate_bytes);

            let kind = if agent_run {
                ResultKind::AgentRun
            } else {
                ResultKind::Shell
            };
            let request = CommandRequest::new(on, command.join(" "))
                .kind(kind)
                .accept(AcceptableCodes::new(accept));
            let expectation = exec_expectation(contains, lacks);

            let result = dispatcher.dispatch(&request).await?;
            if !result.stdout.is_empty() {
                print!("{}", result.stdout);
                if !result.stdout.ends_with('\n') {
                    println!();
                }
            }
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }

            let outcome = verify_result(&request, &result, expectation.as_ref());
            if outcome.passed() {
                println!("{} {}", "✓".green(), outcome.diagnostic);
                Ok(0)
            } else {
                println!("{} {}", "✗".red(), outcome.diagnostic);
                Ok(1)
            }
        }
    }
}

fn load_config(options: &GlobalOptions) -> Result<Config> {
    match &options.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Build the transport named in the config
pub fn build_transport(config: &Config) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.transport.kind {
        TransportKind::Ssh => Box::new(SshTransport::new(&config.transport)?),
        TransportKind::Local => Box::new(LocalTransport::new(Duration::from_secs(
            config.transport.command_timeout_secs,
        ))),
    };
    tracing::debug!("Using {:?} transport", config.transport.kind);
    Ok(transport)
}

fn exec_expectation(contains: Vec<String>, lacks: Vec<String>) -> Option<ExpectationSpec> {
    if !contains.is_empty() {
        Some(ExpectationSpec::must_contain(
            contains.into_iter().map(Matcher::literal).collect(),
        ))
    } else if !lacks.is_empty() {
        Some(ExpectationSpec::must_not_contain(
            lacks.into_iter().map(Matcher::literal).collect(),
        ))
    } else {
        None
    }
}

/// Print what each action would send, without sending it
fn print_scenario_commands(scenario: &Scenario, config: &Config) -> Result<()> {
    let commands = AgentCommands::new(&config.agent);
    let manifest_path = config
        .agent
        .manifest_path
        .clone()
        .unwrap_or_else(|| "<manifest path>".to_string());
    let manifest = ManifestBuilder::new(manifest_path);

    if scenario.stages_manifest() && config.agent.manifest_path.is_none() {
        print_command(Role::Authority, &commands.print_manifest_path());
    }
    for (i, step) in scenario.steps.iter().enumerate() {
        let fatal = if step.fatal { " (fatal)" } else { "" };
        println!("    Step {}: {}{}", i + 1, step.name, fatal.yellow());
        for action in &step.actions {
            let request = action.request(&commands, Some(&manifest))?;
            print_command(request.target, &request.command);
            println!("          accept {}", request.acceptable.to_string().dimmed());
        }
    }
    Ok(())
}

fn print_command(role: Role, command: &str) {
    let mut lines = command.lines();
    if let Some(first) = lines.next() {
        println!("      [{}] $ {}", role, first.dimmed());
    }
    for line in lines {
        println!("          {}", line.dimmed());
    }
}
