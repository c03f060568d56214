//! Verification primitives
//!
//! Exit-code classification, output matching, and the per-step outcome they
//! feed into.

pub mod codes;
pub mod matcher;

use serde::Serialize;
use std::fmt;

pub use codes::{AcceptableCodes, Classification, ExitMeaning, ResultKind};
pub use matcher::{match_output, ExpectationSpec, MatchReport, Matcher, Polarity};

/// Pass/fail of a step or scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// Outcome of one verification, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub verdict: Verdict,
    pub diagnostic: String,
}

impl StepOutcome {
    pub fn pass(diagnostic: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}
