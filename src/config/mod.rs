//! Client configuration (layered: defaults < TOML file < environment).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for [`ApiClient`](crate::client::ApiClient).
///
/// # Example
/// ```
/// use std::time::Duration;
/// use portal_client::config::ClientConfig;
///
/// let config = ClientConfig::new("https://portal.example.edu/api")
///     .with_renewal_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.endpoint_url("/refresh/"), "https://portal.example.edu/api/refresh/");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    /// Per-request transport timeout.
    pub request_timeout: Duration,
    /// Upper bound on a renewal call. `None` waits forever.
    pub renewal_timeout: Option<Duration>,
    /// Where the file-backed session store lives.
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login_path: "/login/".to_string(),
            refresh_path: "/refresh/".to_string(),
            logout_path: "/logout/".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            renewal_timeout: Some(DEFAULT_RENEWAL_TIMEOUT),
            session_file: crate::auth::store::default_session_path(),
        }
    }
}

/// On-disk shape of a config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    login_path: Option<String>,
    refresh_path: Option<String>,
    logout_path: Option<String>,
    request_timeout_secs: Option<u64>,
    /// `0` disables the renewal timeout.
    renewal_timeout_secs: Option<u64>,
    session_file: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_renewal_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.renewal_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Join the base URL and an endpoint path with exactly one slash.
    pub fn endpoint_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Load overrides from a TOML file on top of the defaults.
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(ClientError::Io(err)),
        };
        let file: ConfigFile = toml::from_str(&raw).map_err(|e| {
            ClientError::Configuration(format!("invalid config file {}: {e}", path.display()))
        })?;
        Ok(Self::default().merge_file(file))
    }

    /// Defaults overridden by environment variables (reads `.env` if present).
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenvy::dotenv();
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    fn merge_file(mut self, file: ConfigFile) -> Self {
        if let Some(v) = file.base_url {
            self.base_url = v;
        }
        if let Some(v) = file.login_path {
            self.login_path = v;
        }
        if let Some(v) = file.refresh_path {
            self.refresh_path = v;
        }
        if let Some(v) = file.logout_path {
            self.logout_path = v;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.renewal_timeout_secs {
            self.renewal_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = file.session_file {
            self.session_file = v;
        }
        self
    }

    /// Apply `PORTAL_*` overrides using the given lookup.
    pub fn apply_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        if let Some(url) = lookup("PORTAL_API_BASE_URL") {
            self.base_url = url;
        }
        if let Some(path) = lookup("PORTAL_SESSION_FILE") {
            self.session_file = PathBuf::from(path);
        }
        if let Some(raw) = lookup("PORTAL_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(parse_secs("PORTAL_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("PORTAL_RENEWAL_TIMEOUT_SECS") {
            let secs = parse_secs("PORTAL_RENEWAL_TIMEOUT_SECS", &raw)?;
            self.renewal_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(self)
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<u64, ClientError> {
    raw.trim()
        .parse()
        .map_err(|_| ClientError::Configuration(format!("{name} must be a whole number of seconds, got {raw:?}")))
}
