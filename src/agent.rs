//! Command strings for the managed device and the authority
//!
//! The device exposes two shells: bash inside a network namespace (where the
//! puppet agent runs) and the switch CLI through `vsh`. These builders only
//! produce strings; dispatch happens elsewhere.

use crate::common::config::AgentConfig;

/// Builds device and authority command strings from the agent settings
#[derive(Debug, Clone)]
pub struct AgentCommands {
    puppet_bin: String,
    namespace: String,
    vsh: String,
}

impl AgentCommands {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            puppet_bin: config.puppet_bin.clone(),
            namespace: config.namespace.clone(),
            vsh: config.vsh.clone(),
        }
    }

    /// Run a switch CLI command through vsh
    pub fn vshell(&self, cli: &str) -> String {
        format!("{} -c \"{}\"", self.vsh, cli.replace('"', "\\\""))
    }

    /// Run a command inside the agent's network namespace
    pub fn in_namespace(&self, command: &str) -> String {
        format!("sudo ip netns exec {} {}", self.namespace, command)
    }

    /// One agent run with detailed exit codes
    pub fn agent_run(&self) -> String {
        self.in_namespace(&format!("{} agent -t", self.puppet_bin))
    }

    /// Show a resource as the agent sees it
    pub fn resource_query(&self, resource_type: &str, title: &str) -> String {
        self.in_namespace(&format!(
            "{} resource {} {}",
            self.puppet_bin,
            resource_type,
            shell_quote(title)
        ))
    }

    /// Remove a resource directly on the device
    pub fn resource_remove(&self, resource_type: &str, title: &str) -> String {
        self.in_namespace(&format!(
            "{} resource {} {} ensure=absent",
            self.puppet_bin,
            resource_type,
            shell_quote(title)
        ))
    }

    /// Ask the authority where its main manifest lives
    pub fn print_manifest_path(&self) -> String {
        format!("{} config print manifest", self.puppet_bin)
    }
}

/// Single-quote `s` for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
