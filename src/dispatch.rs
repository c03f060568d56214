//! Command dispatch and verification
//!
//! A request names a command, the endpoint role it runs on, how to read its
//! exit code, and which codes are acceptable. The dispatcher sends it through
//! the transport, checks the exit code first, and only then looks at output.

use std::time::{Duration, Instant};

use crate::common::{truncate_output, Result};
use crate::endpoint::{Endpoints, Role, Transport};
use crate::verify::{
    match_output, AcceptableCodes, Classification, ExpectationSpec, ResultKind, StepOutcome,
};

/// One command to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    pub target: Role,
    pub kind: ResultKind,
    pub acceptable: AcceptableCodes,
}

impl CommandRequest {
    /// Shell command accepting only exit code 0
    pub fn new(target: Role, command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            target,
            kind: ResultKind::Shell,
            acceptable: AcceptableCodes::default(),
        }
    }

    pub fn kind(mut self, kind: ResultKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn accept(mut self, acceptable: AcceptableCodes) -> Self {
        self.acceptable = acceptable;
        self
    }
}

/// What a dispatched command produced
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandResult {
    /// Text the matcher runs on: stdout, or stderr when stdout is empty
    pub fn output(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Sends requests to endpoints and classifies the results
pub struct Dispatcher<'a> {
    transport: &'a dyn Transport,
    endpoints: &'a Endpoints,
    log_truncate_bytes: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a dyn Transport, endpoints: &'a Endpoints) -> Self {
        Self {
            transport,
            endpoints,
            log_truncate_bytes: 2048,
        }
    }

    /// Cut captured output in log lines to `bytes`
    pub fn log_truncate(mut self, bytes: usize) -> Self {
        self.log_truncate_bytes = bytes;
        self
    }

    /// Send the request and capture what it produced
    ///
    /// Errors are transport failures only; any exit code is returned as-is.
    pub async fn dispatch(&self, request: &CommandRequest) -> Result<CommandResult> {
        let endpoint = self.endpoints.get(request.target);
        let start = Instant::now();

        let raw = match self.transport.send(endpoint, &request.command).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(
                    target_role = %request.target,
                    command = %request.command,
                    "dispatch failed: {}",
                    e
                );
                return Err(e);
            }
        };
        let duration = start.elapsed();

        tracing::info!(
            target_role = %request.target,
            command = %request.command,
            exit_code = raw.exit_code,
            duration_ms = duration.as_millis() as u64,
            output = %truncate_output(&raw.stdout, self.log_truncate_bytes),
            "dispatched"
        );
        if !raw.stderr.is_empty() {
            tracing::debug!(
                "stderr from {}: {}",
                request.target,
                truncate_output(&raw.stderr, self.log_truncate_bytes)
            );
        }

        Ok(CommandResult {
            exit_code: raw.exit_code,
            stdout: raw.stdout,
            stderr: raw.stderr,
            duration,
        })
    }

    /// Dispatch, then check the exit code and (if given) the output
    ///
    /// The exit code is checked first; when it is not acceptable the step
    /// fails without looking at the output.
    pub async fn dispatch_and_verify(
        &self,
        request: &CommandRequest,
        expectation: Option<&ExpectationSpec>,
    ) -> Result<StepOutcome> {
        let result = self.dispatch(request).await?;
        Ok(verify_result(request, &result, expectation))
    }
}

/// Judge a captured result against a request and optional expectation
pub fn verify_result(
    request: &CommandRequest,
    result: &CommandResult,
    expectation: Option<&ExpectationSpec>,
) -> StepOutcome {
    let classification = request.acceptable.classify(request.kind, result.exit_code);
    if let Classification::Rejected { .. } = classification {
        let mut diagnostic = format!(
            "{} on {}: {}",
            short_command(&request.command),
            request.target,
            classification.diagnostic()
        );
        let tail = result.stderr.trim();
        if !tail.is_empty() {
            diagnostic.push_str(&format!(" (stderr: {})", truncate_output(tail, 200)));
        }
        return StepOutcome::fail(diagnostic);
    }

    let Some(expectation) = expectation else {
        return StepOutcome::pass(format!(
            "{} on {}: {}",
            short_command(&request.command),
            request.target,
            classification.diagnostic()
        ));
    };

    let report = match_output(result.output(), expectation);
    let diagnostic = format!(
        "{} on {}: {}",
        short_command(&request.command),
        request.target,
        report.diagnostic
    );
    if report.matched {
        StepOutcome::pass(diagnostic)
    } else {
        StepOutcome::fail(diagnostic)
    }
}

/// First line of a command, shortened for diagnostics
fn short_command(command: &str) -> String {
    let first = command.lines().next().unwrap_or_default();
    let mut short = truncate_output(first, 120);
    if command.lines().nth(1).is_some() {
        short.push_str(" ...");
    }
    format!("'{}'", short)
}
