//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};
use crate::endpoint::Role;
use crate::verify::ResultKind;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Resource bodies that `stage_manifest` actions refer to by name
    #[serde(default)]
    pub manifests: BTreeMap<String, String>,
    /// The sequence of test steps to execute
    pub steps: Vec<TestStep>,
}

/// A named step: one or more actions judged together
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TestStep {
    pub name: String,
    /// Abort the scenario if this step fails
    #[serde(default)]
    pub fatal: bool,
    pub actions: Vec<TestAction>,
}

/// A single action in a step
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum TestAction {
    /// Run an arbitrary command on either endpoint
    Shell {
        on: Role,
        command: String,
        /// How to read the exit code (default: shell)
        #[serde(default)]
        result: ResultKind,
        #[serde(default)]
        accept: Vec<i32>,
        expect: Option<OutputExpectation>,
    },
    /// Run a switch CLI command on the device through vsh
    Cli {
        cli: String,
        #[serde(default)]
        accept: Vec<i32>,
        expect: Option<OutputExpectation>,
    },
    /// Write a named manifest to the authority
    StageManifest { manifest: String },
    /// Trigger an agent run on the device
    AgentRun {
        /// Detailed exit codes to accept, e.g. [2] for an enforced change
        accept: Vec<i32>,
        expect: Option<OutputExpectation>,
    },
    /// Show a resource on the device with `puppet resource`
    ResourceQuery {
        #[serde(rename = "type")]
        resource_type: String,
        title: String,
        #[serde(default)]
        accept: Vec<i32>,
        expect: Option<OutputExpectation>,
    },
    /// Remove a resource on the device with `puppet resource ... ensure=absent`
    RemoveResource {
        #[serde(rename = "type")]
        resource_type: String,
        title: String,
        #[serde(default)]
        accept: Vec<i32>,
    },
}

/// Expected output content; exactly one polarity must be given
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct OutputExpectation {
    /// Every matcher must hit
    pub must_contain: Option<Vec<MatcherSpec>>,
    /// No matcher may hit
    pub must_not_contain: Option<Vec<MatcherSpec>>,
}

/// One matcher; exactly one of `literal`, `regex`, or `key` + `value`
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct MatcherSpec {
    /// Substring that should appear
    pub literal: Option<String>,
    /// Regular expression that should match
    pub regex: Option<String>,
    /// Attribute name, matched as `key => value`
    pub key: Option<String>,
    /// Attribute value as the resource command displays it
    pub value: Option<String>,
}

/// Load and parse a scenario file
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    parse_scenario(&content).map_err(|message| Error::ScenarioParse {
        path: path.display().to_string(),
        message,
    })
}

/// Parse scenario YAML text
pub fn parse_scenario(content: &str) -> std::result::Result<TestScenario, String> {
    serde_yaml::from_str(content).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_action_kinds() {
        let yaml = r#"
name: kitchen sink
manifests:
  present: |
    cisco_provider { 'test':
      ensure => present,
    }
steps:
  - name: everything
    fatal: true
    actions:
      - action: shell
        on: master
        command: "ls /etc/puppetlabs"
      - action: cli
        cli: "show running-config section provider"
        expect:
          must_not_contain:
            - regex: "feature provider"
      - action: stage_manifest
        manifest: present
      - action: agent_run
        accept: [2]
      - action: resource_query
        type: cisco_provider
        title: test
        expect:
          must_contain:
            - key: ensure
              value: present
      - action: remove_resource
        type: cisco_provider
        title: test
"#;
        let scenario = parse_scenario(yaml).unwrap();
        assert_eq!(scenario.steps.len(), 1);
        assert!(scenario.steps[0].fatal);
        assert_eq!(scenario.steps[0].actions.len(), 6);
        assert!(scenario.manifests.contains_key("present"));

        match &scenario.steps[0].actions[0] {
            TestAction::Shell { on, result, .. } => {
                assert_eq!(*on, Role::Authority);
                assert_eq!(*result, ResultKind::Shell);
            }
            other => panic!("Expected Shell action, got {:?}", other),
        }
        match &scenario.steps[0].actions[3] {
            TestAction::AgentRun { accept, .. } => assert_eq!(accept, &[2]),
            other => panic!("Expected AgentRun action, got {:?}", other),
        }
    }

    #[test]
    fn test_unquoted_numeric_value_reads_as_string() {
        let yaml = r#"
name: numeric
steps:
  - name: check
    actions:
      - action: resource_query
        type: cisco_interface_ospf
        title: ethernet1/4 test
        expect:
          must_not_contain:
            - key: cost
              value: -1
"#;
        let scenario = parse_scenario(yaml).unwrap();
        match &scenario.steps[0].actions[0] {
            TestAction::ResourceQuery { expect, .. } => {
                let matchers = expect.as_ref().unwrap().must_not_contain.as_ref().unwrap();
                assert_eq!(matchers[0].value.as_deref(), Some("-1"));
            }
            other => panic!("Expected ResourceQuery action, got {:?}", other),
        }
    }

    #[test]
    fn test_agent_run_requires_accept() {
        let yaml = "name: x\nsteps:\n  - name: s\n    actions:\n      - action: agent_run\n";
        assert!(parse_scenario(yaml).is_err());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = "name: x\nsteps:\n  - name: s\n    actions:\n      - action: reboot\n";
        assert!(parse_scenario(yaml).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_scenario(Path::new("/nonexistent/scenario.yaml")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
