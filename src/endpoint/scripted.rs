//! Canned-response transport
//!
//! Answers commands from a script of rules instead of contacting anything.
//! Rules are checked in the order they were added; the first rule whose role
//! matches and whose fragment occurs in the command answers it. A rule with
//! several responses hands them out in order and keeps repeating the last.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{RawOutput, RemoteEndpoint, Role, Transport};
use crate::common::{Error, Result};

#[derive(Debug, Clone)]
enum Reply {
    Output(RawOutput),
    TransportFailure(String),
}

#[derive(Debug)]
struct Rule {
    role: Role,
    fragment: String,
    replies: VecDeque<Reply>,
}

impl Rule {
    fn next_reply(&mut self) -> Reply {
        let reply = if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        };
        reply.unwrap_or_else(|| Reply::TransportFailure("scripted rule has no replies".to_string()))
    }
}

/// Transport that answers from a fixed script and records what it was sent
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    sent: Mutex<Vec<(Role, String)>>,
    fallback: Option<RawOutput>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands on `role` containing `fragment` with `output`
    pub fn on(self, role: Role, fragment: &str, output: RawOutput) -> Self {
        self.on_sequence(role, fragment, vec![output])
    }

    /// Answer successive matching commands with `outputs` in order
    pub fn on_sequence(self, role: Role, fragment: &str, outputs: Vec<RawOutput>) -> Self {
        self.push_rule(role, fragment, outputs.into_iter().map(Reply::Output).collect())
    }

    /// Fail matching commands at the transport level
    pub fn fail_on(self, role: Role, fragment: &str, message: &str) -> Self {
        self.push_rule(
            role,
            fragment,
            VecDeque::from([Reply::TransportFailure(message.to_string())]),
        )
    }

    /// Answer unmatched commands with `output` instead of failing
    pub fn with_fallback(mut self, output: RawOutput) -> Self {
        self.fallback = Some(output);
        self
    }

    /// Commands received so far, in order
    pub fn sent(&self) -> Vec<(Role, String)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Number of received commands on `role` containing `fragment`
    pub fn count(&self, role: Role, fragment: &str) -> usize {
        self.sent()
            .iter()
            .filter(|(r, cmd)| *r == role && cmd.contains(fragment))
            .count()
    }

    fn push_rule(self, role: Role, fragment: &str, replies: VecDeque<Reply>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                role,
                fragment: fragment.to_string(),
                replies,
            });
        }
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<RawOutput> {
        let role = endpoint.role;

        self.sent
            .lock()
            .map_err(|_| Error::Internal("scripted transport log poisoned".to_string()))?
            .push((role, command.to_string()));

        let reply = {
            let mut rules = self
                .rules
                .lock()
                .map_err(|_| Error::Internal("scripted transport rules poisoned".to_string()))?;
            rules
                .iter_mut()
                .find(|rule| rule.role == role && command.contains(&rule.fragment))
                .map(Rule::next_reply)
        };

        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::TransportFailure(message)) => Err(Error::transport(role, message)),
            None => self.fallback.clone().ok_or_else(|| {
                Error::transport(role, format!("no scripted response for '{}'", command))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_repeats_last_reply() {
        let transport = ScriptedTransport::new().on_sequence(
            Role::Device,
            "show running-config",
            vec![RawOutput::new(0, "first"), RawOutput::new(0, "second")],
        );
        let device = RemoteEndpoint::local(Role::Device);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let out = transport.send(&device, "show running-config ospf").await.unwrap();
            seen.push(out.stdout);
        }
        assert_eq!(seen, ["first", "second", "second"]);
        assert_eq!(transport.count(Role::Device, "show"), 3);
    }

    #[tokio::test]
    async fn test_role_must_match() {
        let transport =
            ScriptedTransport::new().on(Role::Authority, "cat <<", RawOutput::new(0, ""));
        let device = RemoteEndpoint::local(Role::Device);

        let err = transport.send(&device, "cat << EOF").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_fallback_and_failure_rules() {
        let transport = ScriptedTransport::new()
            .fail_on(Role::Device, "agent -t", "connection reset")
            .with_fallback(RawOutput::new(0, ""));
        let device = RemoteEndpoint::local(Role::Device);

        assert!(transport.send(&device, "puppet agent -t").await.is_err());
        assert_eq!(transport.send(&device, "true").await.unwrap().exit_code, 0);
        assert_eq!(transport.sent().len(), 2);
    }
}
