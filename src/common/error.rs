//! Error types for confcheck
//!
//! Step-level failures (unexpected exit codes, missing output) are not errors:
//! they are recorded as step outcomes. This type covers everything that stops
//! a command from being dispatched or a scenario from being loaded.

use thiserror::Error;

use crate::endpoint::Role;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for confcheck
#[derive(Error, Debug)]
pub enum Error {
    // === Transport Errors ===
    #[error("Transport to {role} failed: {message}")]
    Transport { role: Role, message: String },

    #[error("Command on {role} timed out after {secs} seconds")]
    TransportTimeout { role: Role, secs: u64 },

    #[error("No endpoint configured for role '{0}'. Add an [endpoints.{0}] section to the config file")]
    EndpointMissing(Role),

    // === Scenario Errors ===
    #[error("Failed to parse scenario '{path}': {message}")]
    ScenarioParse { path: String, message: String },

    #[error("Invalid scenario '{scenario}': {message}")]
    ScenarioInvalid { scenario: String, message: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Cannot {action} while scenario is {state}")]
    InvalidState { action: String, state: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Failed to write file '{path}': {error}")]
    FileWrite { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a transport failure for an endpoint role
    pub fn transport(role: Role, message: impl Into<String>) -> Self {
        Self::Transport {
            role,
            message: message.into(),
        }
    }

    /// Create an invalid scenario error
    pub fn scenario_invalid(scenario: &str, message: impl Into<String>) -> Self {
        Self::ScenarioInvalid {
            scenario: scenario.to_string(),
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: &str) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Whether this error came from the transport layer
    ///
    /// Transport failures abort the current scenario; everything else is
    /// reported before a scenario starts.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::TransportTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_classified() {
        assert!(Error::transport(Role::Device, "connection refused").is_transport());
        assert!(Error::TransportTimeout {
            role: Role::Authority,
            secs: 5
        }
        .is_transport());
        assert!(!Error::Config("bad".to_string()).is_transport());
    }

    #[test]
    fn test_transport_error_names_role() {
        let msg = Error::transport(Role::Authority, "auth failed").to_string();
        assert_eq!(msg, "Transport to authority failed: auth failed");
    }
}
