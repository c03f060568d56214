//! confcheck - scenario-driven verification of configuration management
//!
//! A scenario stages manifests on the configuration authority, triggers agent
//! runs on the managed device, and checks each command's exit code and output.
//! Verdicts are collected per step, per scenario, and for the whole suite.

pub mod agent;
pub mod cli;
pub mod commands;
pub mod common;
pub mod dispatch;
pub mod endpoint;
pub mod manifest;
pub mod testing;
pub mod verify;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use endpoint::{RawOutput, Role, ScriptedTransport};
