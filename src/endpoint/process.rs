//! Child-process execution shared by the ssh and local transports

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command as TokioCommand;

use super::{RawOutput, Role};
use crate::common::{Error, Result};

/// Run `cmd` to completion, capturing both streams
///
/// The child is killed if `timeout` elapses. A process that ends without an
/// exit code (killed by a signal) is a transport failure.
pub(super) async fn run_captured(
    mut cmd: TokioCommand,
    role: Role,
    timeout: Duration,
) -> Result<RawOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| Error::transport(role, format!("failed to spawn command: {}", e)))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| Error::transport(role, e.to_string()))?,
        Err(_) => {
            return Err(Error::TransportTimeout {
                role,
                secs: timeout.as_secs(),
            })
        }
    };

    let exit_code = output
        .status
        .code()
        .ok_or_else(|| Error::transport(role, "command was terminated by a signal"))?;

    Ok(RawOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> TokioCommand {
        let mut cmd = TokioCommand::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let out = run_captured(
            sh("echo out; echo err >&2; exit 6"),
            Role::Device,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(out.exit_code, 6);
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let err = run_captured(sh("sleep 5"), Role::Authority, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::TransportTimeout {
                role: Role::Authority,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_signal_is_transport_failure() {
        let err = run_captured(sh("kill -9 $$"), Role::Device, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
