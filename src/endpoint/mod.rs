//! Remote endpoints and the transports that reach them
//!
//! A suite talks to exactly two endpoints: the configuration authority that
//! holds the manifest, and the managed device whose state is asserted. The
//! [`Transport`] trait is the seam between the engine and whatever carries the
//! command there.

mod local;
mod process;
mod scripted;
mod ssh;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::Result;

pub use local::LocalTransport;
pub use scripted::ScriptedTransport;
pub use ssh::SshTransport;

/// Role of an endpoint within a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Configuration authority (the puppet master)
    #[serde(alias = "master")]
    Authority,
    /// Managed device (the switch running the agent)
    #[serde(alias = "agent")]
    Device,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Authority => "authority",
            Role::Device => "device",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "authority" | "master" => Ok(Role::Authority),
            "device" | "agent" => Ok(Role::Device),
            other => Err(format!(
                "unknown role '{}' (expected 'authority' or 'device')",
                other
            )),
        }
    }
}

/// An addressable target for command dispatch
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    pub role: Role,
    pub host: String,
    pub user: Option<String>,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
}

impl RemoteEndpoint {
    /// Endpoint on this host, used by the local transport
    pub fn local(role: Role) -> Self {
        Self {
            role,
            host: "localhost".to_string(),
            user: None,
            port: 22,
            identity_file: None,
        }
    }

    /// `user@host` or `host`
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.role, self.destination(), self.port)
    }
}

/// The two endpoints of a suite run
#[derive(Debug, Clone)]
pub struct Endpoints {
    authority: RemoteEndpoint,
    device: RemoteEndpoint,
}

impl Endpoints {
    pub fn new(authority: RemoteEndpoint, device: RemoteEndpoint) -> Self {
        Self { authority, device }
    }

    /// Both roles on this host
    pub fn local() -> Self {
        Self::new(
            RemoteEndpoint::local(Role::Authority),
            RemoteEndpoint::local(Role::Device),
        )
    }

    pub fn get(&self, role: Role) -> &RemoteEndpoint {
        match role {
            Role::Authority => &self.authority,
            Role::Device => &self.device,
        }
    }
}

/// Exit code and captured streams of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RawOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

/// Carries a command string to an endpoint and returns what it produced
///
/// Implementations must report the remote exit code as-is. A transport that
/// cannot complete the command (connectivity, authentication, timeout) returns
/// an error instead of inventing an exit code.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<RawOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_accepts_aliases() {
        assert_eq!("master".parse::<Role>().unwrap(), Role::Authority);
        assert_eq!("agent".parse::<Role>().unwrap(), Role::Device);
        assert_eq!("device".parse::<Role>().unwrap(), Role::Device);
        assert!("switch".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_deserializes_from_yaml() {
        let role: Role = serde_yaml::from_str("master").unwrap();
        assert_eq!(role, Role::Authority);
        let role: Role = serde_yaml::from_str("device").unwrap();
        assert_eq!(role, Role::Device);
    }

    #[test]
    fn test_destination_with_and_without_user() {
        let mut endpoint = RemoteEndpoint::local(Role::Device);
        assert_eq!(endpoint.destination(), "localhost");
        endpoint.user = Some("admin".to_string());
        assert_eq!(endpoint.destination(), "admin@localhost");
        assert_eq!(endpoint.to_string(), "device (admin@localhost:22)");
    }
}
