//! Exit-code taxonomy and classification
//!
//! Shell commands follow the usual convention: 0 is success, anything else is
//! failure. A configuration-agent run (`puppet agent -t` with detailed exit
//! codes) reports what it did:
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | no changes |
//! | 1 | errors occurred |
//! | 2 | changes occurred |
//! | 4 | failures occurred |
//! | 6 | changes and failures occurred |
//!
//! Whether a code is acceptable is always decided by the caller's declared set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How a command's exit code should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Shell, vsh, or `puppet resource` command
    #[default]
    Shell,
    /// Configuration-agent run with detailed exit codes
    AgentRun,
}

/// Semantic reading of an exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMeaning {
    Success,
    ShellFailure(i32),
    NoChanges,
    Errors,
    Changes,
    Failures,
    ChangesAndFailures,
    Unrecognized(i32),
}

impl ExitMeaning {
    /// Look up the meaning of `code` for a result kind
    pub fn of(kind: ResultKind, code: i32) -> Self {
        match kind {
            ResultKind::Shell => match code {
                0 => ExitMeaning::Success,
                other => ExitMeaning::ShellFailure(other),
            },
            ResultKind::AgentRun => match code {
                0 => ExitMeaning::NoChanges,
                1 => ExitMeaning::Errors,
                2 => ExitMeaning::Changes,
                4 => ExitMeaning::Failures,
                6 => ExitMeaning::ChangesAndFailures,
                other => ExitMeaning::Unrecognized(other),
            },
        }
    }
}

impl fmt::Display for ExitMeaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitMeaning::Success => f.write_str("success"),
            ExitMeaning::ShellFailure(_) => f.write_str("command failed"),
            ExitMeaning::NoChanges => f.write_str("no changes"),
            ExitMeaning::Errors => f.write_str("errors occurred"),
            ExitMeaning::Changes => f.write_str("changes occurred"),
            ExitMeaning::Failures => f.write_str("failures occurred"),
            ExitMeaning::ChangesAndFailures => f.write_str("changes and failures occurred"),
            ExitMeaning::Unrecognized(_) => f.write_str("unrecognized agent exit code"),
        }
    }
}

/// Exit codes a step accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcceptableCodes(BTreeSet<i32>);

impl Default for AcceptableCodes {
    fn default() -> Self {
        Self(BTreeSet::from([0]))
    }
}

impl AcceptableCodes {
    /// Build a set from explicit codes; an empty list means the default `{0}`
    pub fn new(codes: impl IntoIterator<Item = i32>) -> Self {
        let set: BTreeSet<i32> = codes.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }

    pub fn contains(&self, code: i32) -> bool {
        self.0.contains(&code)
    }

    /// Classify an observed exit code against this set
    pub fn classify(&self, kind: ResultKind, code: i32) -> Classification {
        let meaning = ExitMeaning::of(kind, code);
        if self.contains(code) {
            Classification::Accepted(meaning)
        } else {
            Classification::Rejected {
                observed: code,
                meaning,
                acceptable: self.clone(),
            }
        }
    }
}

impl fmt::Display for AcceptableCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", codes.join(", "))
    }
}

/// Outcome of checking an exit code against an acceptable set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Accepted(ExitMeaning),
    Rejected {
        observed: i32,
        meaning: ExitMeaning,
        acceptable: AcceptableCodes,
    },
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accepted(_))
    }

    pub fn diagnostic(&self) -> String {
        match self {
            Classification::Accepted(meaning) => format!("exit code accepted ({})", meaning),
            Classification::Rejected {
                observed,
                meaning,
                acceptable,
            } => format!(
                "exit code {} ({}) not in acceptable set {}",
                observed, meaning, acceptable
            ),
        }
    }
}
