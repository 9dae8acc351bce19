//! Error types for the portal client.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for all client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any non-2xx status other than a handled 401, passed through as received.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The request was already replayed once after a renewal and was rejected again.
    #[error("Still unauthorized after credential renewal: {0}")]
    StillUnauthorized(String),

    /// Credential renewal failed; the session has been torn down.
    #[error("Session renewal failed: {0}")]
    RenewalFailed(AuthError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ClientError {
    /// Create an API error from a status code and response body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::StillUnauthorized(_) => Some(401),
            Self::RenewalFailed(AuthError::RenewalRejected { status, .. }) => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RenewalFailed(_) | Self::StillUnauthorized(_) => ErrorCategory::Session,
            Self::Auth(AuthError::Network(_)) => ErrorCategory::Network,
            Self::Auth(AuthError::Io(_)) => ErrorCategory::Unknown,
            Self::Auth(AuthError::Serialization(_)) => ErrorCategory::Serialization,
            Self::Auth(_) => ErrorCategory::Authentication,
            Self::Network(e) if e.is_timeout() => ErrorCategory::Timeout,
            Self::Network(_) => ErrorCategory::Network,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether the host should treat the session as ended.
    pub fn is_session_fatal(&self) -> bool {
        self.category() == ErrorCategory::Session
    }

    /// Whether this error is potentially retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Session => RecoverySuggestion::Reauthenticate,
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;
