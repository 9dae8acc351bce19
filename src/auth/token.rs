use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh credential pair issued by the authentication service.
///
/// Both values are opaque. They are always persisted and cleared together.
///
/// # Example
/// ```
/// use portal_client::auth::Credential;
///
/// let credential = Credential::new("access-token", "refresh-token");
/// assert_eq!(credential.access, "access-token");
/// assert!(!format!("{credential:?}").contains("access-token"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access: String,
    pub refresh: String,
}

impl Credential {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access", &redact(&self.access))
            .field("refresh", &redact(&self.refresh))
            .finish()
    }
}

fn redact(value: &str) -> String {
    format!("<{} chars>", value.chars().count())
}

/// Body of a successful renewal response.
///
/// `refresh` is present only when the service rotates refresh credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct RenewedCredential {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
