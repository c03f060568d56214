//! Scenario runner
//!
//! Runs a compiled scenario's steps in order against the two endpoints and
//! records a verdict per step. A failing step does not stop the scenario
//! unless it is marked fatal; a transport failure always does.

use colored::Colorize;
use serde::Serialize;
use std::fmt;

use crate::agent::AgentCommands;
use crate::common::config::AgentConfig;
use crate::common::{Error, Result};
use crate::dispatch::{CommandRequest, Dispatcher};
use crate::endpoint::Role;
use crate::manifest::ManifestBuilder;
use crate::verify::{StepOutcome, Verdict};

use super::report::{SuiteReporter, SuiteSummary};
use super::scenario::{Scenario, Step};

/// Suite-level switches
#[derive(Debug, Clone, Copy, Default)]
pub struct SuiteOptions {
    /// Stop after the first failing scenario
    pub fail_fast: bool,
    /// Print progress to the terminal
    pub echo: bool,
}

/// Run scenarios in order and summarise the suite
pub async fn run_suite(
    scenarios: &[Scenario],
    dispatcher: &Dispatcher<'_>,
    agent: &AgentConfig,
    options: SuiteOptions,
) -> Result<SuiteSummary> {
    let mut reporter = SuiteReporter::new().echo(options.echo);

    for scenario in scenarios {
        let verdict = ScenarioRunner::new(scenario, agent)
            .echo(options.echo)
            .run(dispatcher)
            .await?;

        if let Err(failure) = reporter.report(&verdict) {
            tracing::debug!("{}", failure);
            if options.fail_fast {
                tracing::info!("Stopping suite after failing scenario '{}'", failure.scenario);
                break;
            }
        }
    }

    Ok(reporter.finish())
}

/// Lifecycle of one scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pending,
    Running,
    Passed,
    Failed,
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioState::Pending => "pending",
            ScenarioState::Running => "running",
            ScenarioState::Passed => "passed",
            ScenarioState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pass,
    Fail,
    /// Not run because the scenario was aborted earlier
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pass => f.write_str("PASS"),
            StepStatus::Fail => f.write_str("FAIL"),
            StepStatus::Skipped => f.write_str("SKIPPED"),
        }
    }
}

/// Record of one step: its status and each action's outcome
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    pub outcomes: Vec<StepOutcome>,
}

impl StepRecord {
    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Skipped,
            outcomes: Vec::new(),
        }
    }

    /// Diagnostics of the failing actions, or of all actions if none failed
    pub fn diagnostic(&self) -> String {
        let failing: Vec<&str> = self
            .outcomes
            .iter()
            .filter(|o| !o.passed())
            .map(|o| o.diagnostic.as_str())
            .collect();
        if failing.is_empty() {
            self.outcomes
                .iter()
                .map(|o| o.diagnostic.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        } else {
            failing.join("; ")
        }
    }
}

/// Everything a scenario run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioVerdict {
    pub scenario: String,
    pub steps: Vec<StepRecord>,
    /// Why the scenario was aborted, if it was
    pub fatal: Option<String>,
}

impl ScenarioVerdict {
    fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            steps: Vec::new(),
            fatal: None,
        }
    }

    /// Passed iff every step passed and nothing was fatal
    pub fn passed(&self) -> bool {
        self.fatal.is_none() && self.steps.iter().all(|s| s.status == StepStatus::Pass)
    }

    pub fn verdict(&self) -> Verdict {
        if self.passed() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.status == StepStatus::Fail)
    }

    pub fn skipped_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Skipped)
            .count()
    }
}

/// Runs one scenario once
pub struct ScenarioRunner<'a> {
    scenario: &'a Scenario,
    commands: AgentCommands,
    manifest_path: Option<String>,
    state: ScenarioState,
    echo: bool,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(scenario: &'a Scenario, agent: &AgentConfig) -> Self {
        Self {
            scenario,
            commands: AgentCommands::new(agent),
            manifest_path: agent.manifest_path.clone(),
            state: ScenarioState::Pending,
            echo: false,
        }
    }

    /// Print step progress to the terminal
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// Run every step and return the verdict
    ///
    /// Step failures and transport failures end up in the verdict. The only
    /// error is calling this on a runner that already ran.
    pub async fn run(&mut self, dispatcher: &Dispatcher<'_>) -> Result<ScenarioVerdict> {
        if self.state != ScenarioState::Pending {
            return Err(Error::invalid_state("run", &self.state.to_string()));
        }
        self.state = ScenarioState::Running;

        let scenario = self.scenario;
        tracing::info!(
            scenario = %scenario.name,
            steps = scenario.steps.len(),
            "scenario started"
        );
        if self.echo {
            println!(
                "\n{} {}",
                "Running Scenario:".blue().bold(),
                scenario.name.white().bold()
            );
            if let Some(desc) = &scenario.description {
                println!("  {}", desc.trim().dimmed());
            }
            println!("\n{}", "Steps:".cyan());
        }

        let mut verdict = ScenarioVerdict::new(&scenario.name);

        let manifest = match self.resolve_manifest(dispatcher).await {
            Ok(manifest) => manifest,
            Err(diagnostic) => {
                self.abort(&mut verdict, 0, diagnostic);
                return Ok(self.finish(verdict));
            }
        };

        for (i, step) in scenario.steps.iter().enumerate() {
            let (record, aborted) = self.run_step(step, manifest.as_ref(), dispatcher).await;
            self.log_step(i + 1, &record);
            let failed = record.status == StepStatus::Fail;
            verdict.steps.push(record);

            if let Some(err) = aborted {
                self.abort(&mut verdict, i + 1, format!("step '{}': {}", step.name, err));
                break;
            }
            if failed && step.fatal {
                self.abort(
                    &mut verdict,
                    i + 1,
                    format!("fatal step '{}' failed", step.name),
                );
                break;
            }
        }

        Ok(self.finish(verdict))
    }

    /// Where staged manifests go, if this scenario stages any
    async fn resolve_manifest(
        &self,
        dispatcher: &Dispatcher<'_>,
    ) -> std::result::Result<Option<ManifestBuilder>, String> {
        if !self.scenario.stages_manifest() {
            return Ok(None);
        }
        if let Some(path) = &self.manifest_path {
            return Ok(Some(ManifestBuilder::new(path.clone())));
        }

        let request = CommandRequest::new(Role::Authority, self.commands.print_manifest_path());
        let result = dispatcher
            .dispatch(&request)
            .await
            .map_err(|e| format!("resolving manifest path: {}", e))?;

        let path = result
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty());
        match path {
            Some(printed) if result.exit_code == 0 => {
                let path = site_manifest(printed);
                tracing::debug!("Manifest path on authority: {}", path);
                Ok(Some(ManifestBuilder::new(path)))
            }
            _ => Err(format!(
                "could not determine manifest path on authority (exit code {})",
                result.exit_code
            )),
        }
    }

    /// Run all actions of a step; returns the record and the error that
    /// aborted it, if any
    async fn run_step(
        &self,
        step: &Step,
        manifest: Option<&ManifestBuilder>,
        dispatcher: &Dispatcher<'_>,
    ) -> (StepRecord, Option<Error>) {
        let mut outcomes = Vec::with_capacity(step.actions.len());
        let mut aborted = None;

        for action in &step.actions {
            let outcome = match action.request(&self.commands, manifest) {
                Ok(request) => {
                    dispatcher
                        .dispatch_and_verify(&request, action.expect.as_ref())
                        .await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(outcome) => {
                    tracing::debug!(
                        "{} -> {}: {}",
                        action.describe(),
                        outcome.verdict,
                        outcome.diagnostic
                    );
                    outcomes.push(outcome);
                }
                Err(e) => {
                    outcomes.push(StepOutcome::fail(format!("{}: {}", action.describe(), e)));
                    aborted = Some(e);
                    break;
                }
            }
        }

        let status = if outcomes.iter().all(StepOutcome::passed) {
            StepStatus::Pass
        } else {
            StepStatus::Fail
        };
        let record = StepRecord {
            name: step.name.clone(),
            status,
            outcomes,
        };
        (record, aborted)
    }

    /// Record the fatal diagnostic and mark steps from `from` on as skipped
    fn abort(&self, verdict: &mut ScenarioVerdict, from: usize, diagnostic: String) {
        tracing::error!(scenario = %self.scenario.name, "scenario aborted: {}", diagnostic);
        if self.echo {
            println!("  {} {}", "✗".red(), diagnostic.red());
        }

        for (i, step) in self.scenario.steps.iter().enumerate().skip(from) {
            let record = StepRecord::skipped(&step.name);
            self.log_step(i + 1, &record);
            verdict.steps.push(record);
        }
        verdict.fatal = Some(diagnostic);
    }

    fn finish(&mut self, verdict: ScenarioVerdict) -> ScenarioVerdict {
        self.state = if verdict.passed() {
            ScenarioState::Passed
        } else {
            ScenarioState::Failed
        };
        tracing::info!(
            scenario = %verdict.scenario,
            verdict = %verdict.verdict(),
            steps = verdict.steps.len(),
            "scenario finished"
        );
        verdict
    }

    /// One structured log line per step, plus the terminal line when echoing
    fn log_step(&self, number: usize, record: &StepRecord) {
        let diagnostic = record.diagnostic();
        match record.status {
            StepStatus::Pass => tracing::info!(
                scenario = %self.scenario.name,
                step = %record.name,
                verdict = %record.status,
                diagnostic = %diagnostic,
                "step finished"
            ),
            _ => tracing::warn!(
                scenario = %self.scenario.name,
                step = %record.name,
                verdict = %record.status,
                diagnostic = %diagnostic,
                "step finished"
            ),
        }

        if !self.echo {
            return;
        }
        match record.status {
            StepStatus::Pass => {
                println!("  {} Step {}: {}", "✓".green(), number, record.name.dimmed())
            }
            StepStatus::Fail => {
                println!("  {} Step {}: {}", "✗".red(), number, record.name);
                for outcome in record.outcomes.iter().filter(|o| !o.passed()) {
                    println!("      {}", outcome.diagnostic.red());
                }
            }
            StepStatus::Skipped => println!(
                "  {} Step {}: {} (skipped)",
                "-".yellow(),
                number,
                record.name.dimmed()
            ),
        }
    }
}

/// Newer agents print the manifests directory rather than a file
fn site_manifest(printed: &str) -> String {
    if printed.ends_with(".pp") {
        printed.to_string()
    } else {
        format!("{}/site.pp", printed.trim_end_matches('/'))
    }
}
