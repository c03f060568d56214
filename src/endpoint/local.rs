//! Transport that runs commands with the local shell

use async_trait::async_trait;
use std::time::Duration;

use tokio::process::Command as TokioCommand;

use super::process::run_captured;
use super::{RawOutput, RemoteEndpoint, Transport};
use crate::common::Result;

/// Runs every command with `sh -c` on this host, whatever the endpoint role
#[derive(Debug, Clone)]
pub struct LocalTransport {
    command_timeout: Duration,
}

impl LocalTransport {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<RawOutput> {
        tracing::debug!("sh -c ({}) {}", endpoint.role, command);

        let cmd = if cfg!(target_family = "unix") {
            let mut c = TokioCommand::new("sh");
            c.arg("-c").arg(command);
            c
        } else {
            let mut c = TokioCommand::new("cmd");
            c.arg("/C").arg(command);
            c
        };

        run_captured(cmd, endpoint.role, self.command_timeout).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::endpoint::Role;

    #[tokio::test]
    async fn test_nonzero_exit_code_is_returned_not_swallowed() {
        let transport = LocalTransport::new(Duration::from_secs(10));
        let endpoint = RemoteEndpoint::local(Role::Device);

        let output = transport
            .send(&endpoint, "printf 'ip ospf cost 200'; exit 2")
            .await
            .unwrap();

        assert_eq!(output.exit_code, 2);
        assert_eq!(output.stdout, "ip ospf cost 200");
    }
}
