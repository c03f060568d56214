//! Transport over the system `ssh` client

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command as TokioCommand;

use super::process::run_captured;
use super::{RawOutput, RemoteEndpoint, Transport};
use crate::common::config::TransportConfig;
use crate::common::{Error, Result};

/// ssh reserves this exit status for its own failures
const SSH_ERROR_EXIT: i32 = 255;

/// Runs each command in a fresh non-interactive ssh session
#[derive(Debug, Clone)]
pub struct SshTransport {
    ssh_path: PathBuf,
    connect_timeout_secs: u64,
    command_timeout: Duration,
    extra_options: Vec<String>,
}

impl SshTransport {
    /// Create a transport from config, locating `ssh` on PATH
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let ssh_path = which::which("ssh")
            .map_err(|e| Error::Config(format!("ssh client not found on PATH: {}", e)))?;

        Ok(Self::with_binary(ssh_path, config))
    }

    /// Create a transport using an explicit ssh binary
    pub fn with_binary(ssh_path: PathBuf, config: &TransportConfig) -> Self {
        Self {
            ssh_path,
            connect_timeout_secs: config.connect_timeout_secs,
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            extra_options: config.ssh_options.clone(),
        }
    }

    /// Arguments passed to ssh for one command
    fn args(&self, endpoint: &RemoteEndpoint, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];

        for option in &self.extra_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }

        args.push("-p".to_string());
        args.push(endpoint.port.to_string());

        if let Some(identity) = &endpoint.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }

        args.push(endpoint.destination());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn send(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<RawOutput> {
        tracing::debug!("ssh {} -- {}", endpoint, command);

        let mut cmd = TokioCommand::new(&self.ssh_path);
        cmd.args(self.args(endpoint, command));

        let output = run_captured(cmd, endpoint.role, self.command_timeout).await?;
        reject_ssh_failure(endpoint, output)
    }
}

/// A remote command exiting 255 is indistinguishable from an ssh failure;
/// treat it as the latter.
fn reject_ssh_failure(endpoint: &RemoteEndpoint, output: RawOutput) -> Result<RawOutput> {
    if output.exit_code == SSH_ERROR_EXIT {
        return Err(Error::transport(
            endpoint.role,
            format!("ssh to {} failed: {}", endpoint, output.stderr.trim()),
        ));
    }
    Ok(output)
}
