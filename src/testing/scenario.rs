//! Compiled scenarios
//!
//! The YAML types in `config` are checked and turned into these: patterns are
//! compiled, manifest references resolved, and exit-code sets fixed. A compiled
//! scenario never touches an endpoint; the runner turns each action into a
//! [`CommandRequest`] when it gets there.

use std::path::Path;

use crate::agent::AgentCommands;
use crate::common::{Error, Result};
use crate::dispatch::CommandRequest;
use crate::endpoint::Role;
use crate::manifest::ManifestBuilder;
use crate::verify::{AcceptableCodes, ExpectationSpec, Matcher, ResultKind};

use super::config::{load_scenario, MatcherSpec, OutputExpectation, TestAction, TestScenario};

/// A validated scenario ready to run
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

/// One step; its actions are judged together
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub fatal: bool,
    pub actions: Vec<Action>,
}

/// What an action does, before it is bound to the agent settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Shell {
        target: Role,
        command: String,
        result: ResultKind,
    },
    Cli {
        cli: String,
    },
    StageManifest {
        name: String,
        body: String,
    },
    AgentRun,
    ResourceQuery {
        resource_type: String,
        title: String,
    },
    RemoveResource {
        resource_type: String,
        title: String,
    },
}

/// One dispatch with its exit-code and output checks
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub acceptable: AcceptableCodes,
    pub expect: Option<ExpectationSpec>,
}

impl Scenario {
    /// Load, parse and compile a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        Self::compile(load_scenario(path)?)
    }

    /// Check a parsed scenario and compile its expectations
    pub fn compile(def: TestScenario) -> Result<Self> {
        let name = def.name;
        if def.steps.is_empty() {
            return Err(Error::scenario_invalid(&name, "scenario has no steps"));
        }

        let mut steps = Vec::with_capacity(def.steps.len());
        for step in def.steps {
            if step.actions.is_empty() {
                return Err(Error::scenario_invalid(
                    &name,
                    format!("step '{}' has no actions", step.name),
                ));
            }
            let mut actions = Vec::with_capacity(step.actions.len());
            for action in step.actions {
                let action = compile_action(action, &def.manifests).map_err(|message| {
                    Error::scenario_invalid(&name, format!("step '{}': {}", step.name, message))
                })?;
                actions.push(action);
            }
            steps.push(Step {
                name: step.name,
                fatal: step.fatal,
                actions,
            });
        }

        Ok(Self {
            name,
            description: def.description,
            steps,
        })
    }

    /// Whether any action writes a manifest to the authority
    pub fn stages_manifest(&self) -> bool {
        self.steps
            .iter()
            .flat_map(|s| &s.actions)
            .any(|a| matches!(a.kind, ActionKind::StageManifest { .. }))
    }
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fatal: false,
            actions: Vec::new(),
        }
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

impl Action {
    /// An action accepting exit code 0 with no output check
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            acceptable: AcceptableCodes::default(),
            expect: None,
        }
    }

    pub fn accept(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.acceptable = AcceptableCodes::new(codes);
        self
    }

    pub fn expect(mut self, expectation: ExpectationSpec) -> Self {
        self.expect = Some(expectation);
        self
    }

    /// Bind the action to concrete command strings
    ///
    /// `manifest` must be set when the action stages a manifest.
    pub fn request(
        &self,
        commands: &AgentCommands,
        manifest: Option<&ManifestBuilder>,
    ) -> Result<CommandRequest> {
        let request = match &self.kind {
            ActionKind::Shell {
                target,
                command,
                result,
            } => CommandRequest::new(*target, command.clone()).kind(*result),
            ActionKind::Cli { cli } => CommandRequest::new(Role::Device, commands.vshell(cli)),
            ActionKind::StageManifest { name, body } => {
                let builder = manifest.ok_or_else(|| {
                    Error::Internal(format!(
                        "manifest '{}' staged before the manifest path was resolved",
                        name
                    ))
                })?;
                CommandRequest::new(Role::Authority, builder.stage(body))
            }
            ActionKind::AgentRun => {
                CommandRequest::new(Role::Device, commands.agent_run()).kind(ResultKind::AgentRun)
            }
            ActionKind::ResourceQuery {
                resource_type,
                title,
            } => CommandRequest::new(Role::Device, commands.resource_query(resource_type, title)),
            ActionKind::RemoveResource {
                resource_type,
                title,
            } => CommandRequest::new(Role::Device, commands.resource_remove(resource_type, title)),
        };
        Ok(request.accept(self.acceptable.clone()))
    }

    /// Short human label for step output
    pub fn describe(&self) -> String {
        match &self.kind {
            ActionKind::Shell {
                target, command, ..
            } => format!("shell on {}: {}", target, command),
            ActionKind::Cli { cli } => format!("cli: {}", cli),
            ActionKind::StageManifest { name, .. } => format!("stage manifest '{}'", name),
            ActionKind::AgentRun => format!("agent run (accept {})", self.acceptable),
            ActionKind::ResourceQuery {
                resource_type,
                title,
            } => format!("query {} '{}'", resource_type, title),
            ActionKind::RemoveResource {
                resource_type,
                title,
            } => format!("remove {} '{}'", resource_type, title),
        }
    }
}

fn compile_action(
    action: TestAction,
    manifests: &std::collections::BTreeMap<String, String>,
) -> std::result::Result<Action, String> {
    let (kind, accept, expect) = match action {
        TestAction::Shell {
            on,
            command,
            result,
            accept,
            expect,
        } => (
            ActionKind::Shell {
                target: on,
                command,
                result,
            },
            accept,
            expect,
        ),
        TestAction::Cli {
            cli,
            accept,
            expect,
        } => (ActionKind::Cli { cli }, accept, expect),
        TestAction::StageManifest { manifest } => {
            let body = manifests
                .get(&manifest)
                .ok_or_else(|| format!("unknown manifest '{}'", manifest))?
                .clone();
            (
                ActionKind::StageManifest {
                    name: manifest,
                    body,
                },
                Vec::new(),
                None,
            )
        }
        TestAction::AgentRun { accept, expect } => {
            if accept.is_empty() {
                return Err("agent_run needs at least one acceptable exit code".to_string());
            }
            (ActionKind::AgentRun, accept, expect)
        }
        TestAction::ResourceQuery {
            resource_type,
            title,
            accept,
            expect,
        } => (
            ActionKind::ResourceQuery {
                resource_type,
                title,
            },
            accept,
            expect,
        ),
        TestAction::RemoveResource {
            resource_type,
            title,
            accept,
        } => (
            ActionKind::RemoveResource {
                resource_type,
                title,
            },
            accept,
            None,
        ),
    };

    let mut compiled = Action::new(kind).accept(accept);
    if let Some(expect) = expect {
        compiled = compiled.expect(compile_expectation(expect)?);
    }
    Ok(compiled)
}

fn compile_expectation(expect: OutputExpectation) -> std::result::Result<ExpectationSpec, String> {
    match (expect.must_contain, expect.must_not_contain) {
        (Some(matchers), None) => Ok(ExpectationSpec::must_contain(compile_matchers(matchers)?)),
        (None, Some(matchers)) => Ok(ExpectationSpec::must_not_contain(compile_matchers(
            matchers,
        )?)),
        (Some(_), Some(_)) => {
            Err("expect takes either must_contain or must_not_contain, not both".to_string())
        }
        (None, None) => Err("expect needs must_contain or must_not_contain".to_string()),
    }
}

fn compile_matchers(specs: Vec<MatcherSpec>) -> std::result::Result<Vec<Matcher>, String> {
    specs.into_iter().map(compile_matcher).collect()
}

fn compile_matcher(spec: MatcherSpec) -> std::result::Result<Matcher, String> {
    match (spec.literal, spec.regex, spec.key, spec.value) {
        (Some(text), None, None, None) => Ok(Matcher::literal(text)),
        (None, Some(pattern), None, None) => Matcher::regex(&pattern).map_err(|e| e.to_string()),
        (None, None, Some(key), Some(value)) => Ok(Matcher::key_value(key, value)),
        (None, None, Some(key), None) => Err(format!("matcher for key '{}' has no value", key)),
        _ => Err("a matcher takes exactly one of literal, regex, or key with value".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::AgentConfig;
    use crate::testing::config::parse_scenario;

    fn compile(yaml: &str) -> Result<Scenario> {
        Scenario::compile(parse_scenario(yaml).unwrap())
    }

    const STAGE_AND_RUN: &str = r#"
name: provider present
manifests:
  present: |
    cisco_provider { 'test':
      ensure => present,
    }
steps:
  - name: apply
    actions:
      - action: stage_manifest
        manifest: present
      - action: agent_run
        accept: [2]
  - name: check
    actions:
      - action: resource_query
        type: cisco_provider
        title: test
        expect:
          must_contain:
            - key: ensure
              value: present
"#;

    #[test]
    fn test_compile_binds_manifest_body() {
        let scenario = compile(STAGE_AND_RUN).unwrap();
        assert!(scenario.stages_manifest());
        match &scenario.steps[0].actions[0].kind {
            ActionKind::StageManifest { name, body } => {
                assert_eq!(name, "present");
                assert!(body.contains("ensure => present"));
            }
            other => panic!("Expected StageManifest, got {:?}", other),
        }
        assert!(scenario.steps[1].actions[0].expect.is_some());
    }

    #[test]
    fn test_unknown_manifest_rejected() {
        let yaml = r#"
name: broken
steps:
  - name: apply
    actions:
      - action: stage_manifest
        manifest: missing
"#;
        let err = compile(yaml).unwrap_err();
        assert!(matches!(err, Error::ScenarioInvalid { .. }));
        assert!(err.to_string().contains("unknown manifest 'missing'"));
    }

    #[test]
    fn test_bad_regex_rejected_at_compile_time() {
        let yaml = r#"
name: bad regex
steps:
  - name: check
    actions:
      - action: cli
        cli: show running-config
        expect:
          must_contain:
            - regex: "feature ("
"#;
        let err = compile(yaml).unwrap_err();
        assert!(err.to_string().contains("step 'check'"));
    }

    #[test]
    fn test_both_polarities_rejected() {
        let yaml = r#"
name: both
steps:
  - name: check
    actions:
      - action: cli
        cli: show running-config
        expect:
          must_contain:
            - literal: a
          must_not_contain:
            - literal: b
"#;
        assert!(compile(yaml).is_err());
    }

    #[test]
    fn test_matcher_needs_exactly_one_form() {
        let yaml = r#"
name: two forms
steps:
  - name: check
    actions:
      - action: cli
        cli: show running-config
        expect:
          must_contain:
            - literal: a
              regex: b
"#;
        assert!(compile(yaml).is_err());
    }

    #[test]
    fn test_empty_agent_run_accept_rejected() {
        let yaml = r#"
name: no codes
steps:
  - name: apply
    actions:
      - action: agent_run
        accept: []
"#;
        assert!(compile(yaml).is_err());
    }

    #[test]
    fn test_request_binding() {
        let scenario = compile(STAGE_AND_RUN).unwrap();
        let commands = AgentCommands::new(&AgentConfig::default());
        let builder = ManifestBuilder::new("/etc/puppetlabs/site.pp");

        let stage = scenario.steps[0].actions[0]
            .request(&commands, Some(&builder))
            .unwrap();
        assert_eq!(stage.target, Role::Authority);
        assert!(stage.command.contains("'/etc/puppetlabs/site.pp'"));

        let run = scenario.steps[0].actions[1]
            .request(&commands, Some(&builder))
            .unwrap();
        assert_eq!(run.target, Role::Device);
        assert_eq!(run.kind, ResultKind::AgentRun);
        assert!(run.acceptable.contains(2));
        assert!(!run.acceptable.contains(0));
    }

    #[test]
    fn test_stage_without_manifest_path_is_internal_error() {
        let scenario = compile(STAGE_AND_RUN).unwrap();
        let commands = AgentCommands::new(&AgentConfig::default());
        let err = scenario.steps[0].actions[0]
            .request(&commands, None)
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
