//! Scenario testing
//!
//! Reads YAML scenarios, compiles them, runs them step by step against the
//! configuration authority and the managed device, and reports a verdict
//! per scenario and for the suite.

mod config;
mod report;
mod runner;
mod scenario;

pub use config::{load_scenario, parse_scenario, TestScenario};
pub use report::{ScenarioFailure, SuiteReporter, SuiteSummary};
pub use runner::{
    run_suite, ScenarioRunner, ScenarioState, ScenarioVerdict, StepRecord, StepStatus,
    SuiteOptions,
};
pub use scenario::{Action, ActionKind, Scenario, Step};
