use std::time::Duration;

use thiserror::Error;

/// Authentication and session errors.
///
/// Every variant carries owned strings so a single renewal failure can be
/// cloned out to each caller waiting on that renewal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("No refresh credential available")]
    MissingRefreshCredential,
    #[error("Renewal rejected (status {status}): {body}")]
    RenewalRejected { status: u16, body: String },
    #[error("Renewal timed out after {0:?}")]
    RenewalTimeout(Duration),
    /// The session was logged out or replaced while a renewal was in flight.
    #[error("Session ended during credential renewal")]
    SessionEnded,
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Account has no assigned roles")]
    NoRoles,
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
