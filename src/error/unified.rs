//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad login credentials, missing roles, unknown role.
    Authentication,
    /// The session is gone: renewal failed or a retried request was rejected again.
    Session,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Send the user back to the login screen.
    Reauthenticate,
    CheckCredentials,
    RetryWithBackoff,
    CheckConfiguration,
    ContactSupport,
}
