//! Configuration file handling
//!
//! The config file doubles as the host inventory: it names the authority and
//! the managed device and says how to reach them.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};
use crate::endpoint::{Endpoints, RemoteEndpoint, Role};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Endpoint inventory, keyed by role name ("authority", "device")
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,

    /// Configuration-agent command settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which transport carries commands to the endpoints
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// The system `ssh` client
    #[default]
    Ssh,
    /// `sh -c` on this host (lab setups where both roles are local)
    Local,
}

/// Transport settings
#[derive(Debug, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    /// SSH connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound on a single remote command, agent runs included
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Extra `-o` options passed to ssh
    #[serde(default)]
    pub ssh_options: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            ssh_options: Vec::new(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_command_timeout() -> u64 {
    600
}

/// Address of one endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    pub host: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

fn default_port() -> u16 {
    22
}

/// Command layout on the managed device and the authority
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    /// Path to the puppet binary
    #[serde(default = "default_puppet_bin")]
    pub puppet_bin: String,

    /// Network namespace the agent runs in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Path to the device's vsh shell
    #[serde(default = "default_vsh")]
    pub vsh: String,

    /// Manifest path on the authority; discovered with
    /// `puppet config print manifest` when unset
    #[serde(default)]
    pub manifest_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            puppet_bin: default_puppet_bin(),
            namespace: default_namespace(),
            vsh: default_vsh(),
            manifest_path: None,
        }
    }
}

fn default_puppet_bin() -> String {
    "/opt/puppetlabs/bin/puppet".to_string()
}
fn default_namespace() -> String {
    "management".to_string()
}
fn default_vsh() -> String {
    "/isan/bin/vsh".to_string()
}

/// Output settings
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Captured output is cut to this many bytes in log lines
    #[serde(default = "default_log_truncate")]
    pub log_truncate_bytes: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_truncate_bytes: default_log_truncate(),
        }
    }
}

fn default_log_truncate() -> usize {
    2048
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;

        for name in config.endpoints.keys() {
            if name.parse::<Role>().is_err() {
                return Err(Error::ConfigParse(format!(
                    "Unknown endpoint role '{}'. Supported roles: 'authority', 'device'",
                    name
                )));
            }
        }

        Ok(config)
    }

    /// Build the endpoint set from the inventory
    ///
    /// Both roles must be present unless the transport is local.
    pub fn endpoints(&self) -> Result<Endpoints> {
        let authority = self.endpoint(Role::Authority)?;
        let device = self.endpoint(Role::Device)?;
        Ok(Endpoints::new(authority, device))
    }

    fn endpoint(&self, role: Role) -> Result<RemoteEndpoint> {
        let entry = match self.endpoints.get(role.as_str()) {
            Some(entry) => entry,
            None if self.transport.kind == TransportKind::Local => {
                return Ok(RemoteEndpoint::local(role))
            }
            None => return Err(Error::EndpointMissing(role)),
        };

        Ok(RemoteEndpoint {
            role,
            host: entry.host.clone(),
            user: entry.user.clone(),
            port: entry.port,
            identity_file: entry.identity_file.clone(),
        })
    }
}
