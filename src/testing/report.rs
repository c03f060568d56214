//! Suite verdict reporting
//!
//! Collects scenario verdicts, prints a line per scenario, and turns the whole
//! run into a summary with the process exit code.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::common::{Error, Result};

use super::runner::ScenarioVerdict;

/// A scenario that did not pass
#[derive(Debug, Clone, thiserror::Error)]
#[error("Scenario '{scenario}' failed: {} failing step(s){}", .failed_steps.len(), fatal_suffix(.fatal))]
pub struct ScenarioFailure {
    pub scenario: String,
    /// (step name, diagnostic) for every failing step
    pub failed_steps: Vec<(String, String)>,
    pub fatal: Option<String>,
}

fn fatal_suffix(fatal: &Option<String>) -> String {
    match fatal {
        Some(diagnostic) => format!(", aborted: {}", diagnostic),
        None => String::new(),
    }
}

impl ScenarioFailure {
    fn from_verdict(verdict: &ScenarioVerdict) -> Self {
        Self {
            scenario: verdict.scenario.clone(),
            failed_steps: verdict
                .failed_steps()
                .map(|s| (s.name.clone(), s.diagnostic()))
                .collect(),
            fatal: verdict.fatal.clone(),
        }
    }
}

/// End-of-suite totals
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// The first fatal diagnostic of the suite, if any scenario was aborted
    pub first_fatal: Option<String>,
    pub scenarios: Vec<ScenarioVerdict>,
}

impl SuiteSummary {
    /// 0 iff every scenario passed
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }

    /// One-line suite result
    pub fn headline(&self) -> String {
        format!(
            "Suite: {} scenario(s), {} passed, {} failed",
            self.total, self.passed, self.failed
        )
    }

    /// Write the summary as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| Error::FileWrite {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }
}

/// Accumulates scenario verdicts for one suite run
#[derive(Debug, Default)]
pub struct SuiteReporter {
    verdicts: Vec<ScenarioVerdict>,
    echo: bool,
}

impl SuiteReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print scenario results to the terminal
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Record a verdict; a failed scenario comes back as the error
    pub fn report(
        &mut self,
        verdict: &ScenarioVerdict,
    ) -> std::result::Result<(), ScenarioFailure> {
        self.verdicts.push(verdict.clone());

        if verdict.passed() {
            tracing::info!(
                scenario = %verdict.scenario,
                verdict = "PASSED",
                steps = verdict.steps.len(),
                "scenario verdict"
            );
            if self.echo {
                println!(
                    "\n{} {}\n",
                    "✓".green().bold(),
                    format!("Scenario Passed: {}", verdict.scenario).green().bold()
                );
            }
            return Ok(());
        }

        let failure = ScenarioFailure::from_verdict(verdict);
        tracing::warn!(
            scenario = %verdict.scenario,
            verdict = "FAILED",
            failed_steps = failure.failed_steps.len(),
            skipped_steps = verdict.skipped_steps(),
            fatal = failure.fatal.as_deref().unwrap_or(""),
            "scenario verdict"
        );
        if self.echo {
            println!(
                "\n{} {}",
                "✗".red().bold(),
                format!("Scenario Failed: {}", verdict.scenario).red().bold()
            );
            for (step, diagnostic) in &failure.failed_steps {
                println!("  {}: {}", step, diagnostic.dimmed());
            }
            if let Some(fatal) = &failure.fatal {
                println!("  {} {}", "aborted:".red(), fatal);
            }
            println!();
        }
        Err(failure)
    }

    /// Close the suite and produce the summary
    pub fn finish(self) -> SuiteSummary {
        let echo = self.echo;
        let total = self.verdicts.len();
        let passed = self.verdicts.iter().filter(|v| v.passed()).count();
        let first_fatal = self.verdicts.iter().find_map(|v| v.fatal.clone());

        let summary = SuiteSummary {
            total,
            passed,
            failed: total - passed,
            first_fatal,
            scenarios: self.verdicts,
        };

        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            "suite finished"
        );
        if echo {
            let line = summary.headline();
            if summary.failed == 0 {
                println!("{}", line.green().bold());
            } else {
                println!("{}", line.red().bold());
            }
            if let Some(fatal) = &summary.first_fatal {
                println!("  {} {}", "first abort:".red().bold(), fatal);
            }
        }
        summary
    }
}
