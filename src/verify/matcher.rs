//! Output pattern matching
//!
//! A step's expectation is a polarity plus a list of matchers. Each matcher
//! is evaluated on its own against the captured text; the polarity decides
//! how the individual hits combine.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::{Error, Result};

/// Whether the matchers assert presence or absence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    MustContain,
    MustNotContain,
}

/// One expected fragment of output
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Plain substring
    Literal(String),
    /// Attribute as the agent's `resource` command prints it: `key => 'value',`
    KeyValue { key: String, value: String },
    /// Regular expression, hit on the first match anywhere in the text
    Regex(Regex),
}

impl Matcher {
    pub fn literal(text: impl Into<String>) -> Self {
        Matcher::Literal(text.into())
    }

    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Matcher::KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Compile a regex matcher
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Matcher::Regex)
            .map_err(|e| Error::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    /// Whether this matcher finds a hit in `text`
    pub fn hits(&self, text: &str) -> bool {
        match self {
            Matcher::Literal(needle) => text.contains(needle.as_str()),
            Matcher::Regex(re) => re.is_match(text),
            Matcher::KeyValue { key, value } => text
                .lines()
                .any(|line| key_value_hits(line, key, value)),
        }
    }
}

/// `key`, then `=>`, then `value` (optionally quoted), then at most a comma
fn key_value_hits(line: &str, key: &str, value: &str) -> bool {
    let Some(start) = find_word(line, key) else {
        return false;
    };
    let rest = line[start + key.len()..].trim_start();
    let Some(rest) = rest.strip_prefix("=>") else {
        return false;
    };
    let rest = rest.trim_start();

    let (quote, rest) = match rest.chars().next() {
        Some(q @ ('\'' | '"')) => (Some(q), &rest[1..]),
        _ => (None, rest),
    };
    let Some(rest) = rest.strip_prefix(value) else {
        return false;
    };
    let rest = match quote {
        Some(q) => match rest.strip_prefix(q) {
            Some(r) => r,
            None => return false,
        },
        None => rest,
    };

    let rest = rest.trim_start();
    let rest = rest.strip_prefix(',').unwrap_or(rest);
    rest.trim().is_empty()
}

/// Byte offset of `word` in `line` where it is not part of a longer identifier
fn find_word(line: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    line.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = line[..i].chars().next_back();
        let after = line[i + word.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(text) => write!(f, "literal '{}'", text),
            Matcher::KeyValue { key, value } => write!(f, "{} => {}", key, value),
            Matcher::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Polarity plus matchers, supplied per step
#[derive(Debug, Clone)]
pub struct ExpectationSpec {
    pub polarity: Polarity,
    pub matchers: Vec<Matcher>,
}

impl ExpectationSpec {
    pub fn must_contain(matchers: Vec<Matcher>) -> Self {
        Self {
            polarity: Polarity::MustContain,
            matchers,
        }
    }

    pub fn must_not_contain(matchers: Vec<Matcher>) -> Self {
        Self {
            polarity: Polarity::MustNotContain,
            matchers,
        }
    }
}

/// Result of evaluating an expectation against captured text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub matched: bool,
    pub diagnostic: String,
}

/// Evaluate `expectation` against `text`
pub fn match_output(text: &str, expectation: &ExpectationSpec) -> MatchReport {
    let hits: Vec<(&Matcher, bool)> = expectation
        .matchers
        .iter()
        .map(|m| (m, m.hits(text)))
        .collect();

    match expectation.polarity {
        Polarity::MustContain => {
            if text.is_empty() {
                return MatchReport {
                    matched: false,
                    diagnostic: "output is empty; expected content cannot be present".to_string(),
                };
            }
            let missing = names(hits.iter().filter(|(_, hit)| !hit));
            if missing.is_empty() {
                let found = names(hits.iter());
                let diagnostic = if found.is_empty() {
                    "no matchers to check".to_string()
                } else {
                    format!("found {}", found)
                };
                MatchReport {
                    matched: true,
                    diagnostic,
                }
            } else {
                MatchReport {
                    matched: false,
                    diagnostic: format!("missing {}", missing),
                }
            }
        }
        Polarity::MustNotContain => {
            if text.is_empty() {
                return MatchReport {
                    matched: true,
                    diagnostic: "output is empty; nothing can be present".to_string(),
                };
            }
            let present = names(hits.iter().filter(|(_, hit)| *hit));
            if present.is_empty() {
                let absent = names(hits.iter());
                let diagnostic = if absent.is_empty() {
                    "no matchers to check".to_string()
                } else {
                    format!("absent as expected: {}", absent)
                };
                MatchReport {
                    matched: true,
                    diagnostic,
                }
            } else {
                MatchReport {
                    matched: false,
                    diagnostic: format!("unexpectedly present {}", present),
                }
            }
        }
    }
}

fn names<'a, 'm: 'a>(hits: impl Iterator<Item = &'a (&'m Matcher, bool)>) -> String {
    hits.map(|(m, _)| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOURCE_PRESENT: &str = "cisco_provider { 'test':\n  ensure => 'present',\n}\n";
    const RESOURCE_ABSENT: &str = "cisco_provider { 'test':\n  ensure => 'absent',\n}\n";
    const RUNNING_CONFIG: &str =
        "!Command: show running-config section provider\nfeature provider\nprovider test\n";

    fn re(p: &str) -> Matcher {
        Matcher::regex(p).unwrap()
    }

    #[test]
    fn test_key_value_matches_resource_rendering() {
        let m = Matcher::key_value("ensure", "present");
        assert!(m.hits(RESOURCE_PRESENT));
        assert!(!m.hits(RESOURCE_ABSENT));
        assert!(m.hits("ensure => present"));
        assert!(m.hits("  ensure  =>  \"present\""));
    }

    #[test]
    fn test_key_value_requires_whole_key_and_value() {
        let m = Matcher::key_value("cost", "-1");
        assert!(m.hits("  cost => '-1',"));
        assert!(!m.hits("  cost => '-10',"));
        assert!(!m.hits("  area_cost => '-1',"));
        assert!(!m.hits("  cost => '-1"));
    }

    #[test]
    fn test_key_value_does_not_span_lines() {
        let m = Matcher::key_value("ensure", "present");
        assert!(!m.hits("ensure =>\n'present'"));
    }

    #[test]
    fn test_literal_and_regex() {
        assert!(Matcher::literal("provider test").hits(RUNNING_CONFIG));
        assert!(re("ip ospf cost \\d+").hits("interface ethernet1/4\n  ip ospf cost 200\n"));
        assert!(!re("^feature ospf$").hits(RUNNING_CONFIG));
    }

    #[test]
    fn test_invalid_regex_is_error() {
        let err = Matcher::regex("feature (provider").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_must_contain_requires_every_matcher() {
        let spec = ExpectationSpec::must_contain(vec![
            re("feature provider"),
            Matcher::literal("provider test"),
        ]);
        let report = match_output(RUNNING_CONFIG, &spec);
        assert!(report.matched);
        assert!(report.diagnostic.contains("/feature provider/"));
    }

    #[test]
    fn test_must_contain_is_monotonic() {
        let mut spec = ExpectationSpec::must_contain(vec![re("provider test")]);
        assert!(match_output(RUNNING_CONFIG, &spec).matched);

        spec.matchers.push(re("ip ospf cost 200"));
        let report = match_output(RUNNING_CONFIG, &spec);
        assert!(!report.matched);
        assert_eq!(report.diagnostic, "missing /ip ospf cost 200/");
    }

    #[test]
    fn test_must_not_contain_names_offender() {
        let spec = ExpectationSpec::must_not_contain(vec![
            re("ip ospf cost -1"),
            re("feature provider"),
        ]);
        let report = match_output(RUNNING_CONFIG, &spec);
        assert!(!report.matched);
        assert_eq!(report.diagnostic, "unexpectedly present /feature provider/");
    }

    #[test]
    fn test_polarity_duality() {
        let texts = [RESOURCE_PRESENT, RESOURCE_ABSENT, RUNNING_CONFIG];
        let matchers = [
            Matcher::key_value("ensure", "present"),
            Matcher::literal("provider test"),
            re("feature \\w+"),
            re("hello-interval"),
        ];
        for text in texts {
            for m in &matchers {
                let contain = match_output(text, &ExpectationSpec::must_contain(vec![m.clone()]));
                let absent =
                    match_output(text, &ExpectationSpec::must_not_contain(vec![m.clone()]));
                assert_ne!(contain.matched, absent.matched, "{} on {:?}", m, text);
            }
        }
    }

    #[test]
    fn test_empty_text() {
        let m = vec![re("feature provider")];
        assert!(!match_output("", &ExpectationSpec::must_contain(m.clone())).matched);
        assert!(match_output("", &ExpectationSpec::must_not_contain(m)).matched);
        assert!(!match_output("", &ExpectationSpec::must_contain(Vec::new())).matched);
    }

    #[test]
    fn test_empty_text_absent_even_for_empty_matching_patterns() {
        let matchers = [Matcher::literal(""), re("(feature ospf)?")];
        for m in &matchers {
            let absent = match_output("", &ExpectationSpec::must_not_contain(vec![m.clone()]));
            assert!(absent.matched, "{}: {}", m, absent.diagnostic);

            let contain = match_output("", &ExpectationSpec::must_contain(vec![m.clone()]));
            assert_ne!(contain.matched, absent.matched, "{}", m);
        }
    }

    #[test]
    fn test_zero_matchers_is_vacuously_true() {
        let report = match_output(RUNNING_CONFIG, &ExpectationSpec::must_contain(Vec::new()));
        assert!(report.matched);
        assert_eq!(report.diagnostic, "no matchers to check");

        let report = match_output(RUNNING_CONFIG, &ExpectationSpec::must_not_contain(Vec::new()));
        assert!(report.matched);
    }
}
