//! Tests for configuration loading from the process environment.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use portal_client::config::{ClientConfig, DEFAULT_BASE_URL};
use portal_client::error::ClientError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 4] = [
    "PORTAL_API_BASE_URL",
    "PORTAL_SESSION_FILE",
    "PORTAL_REQUEST_TIMEOUT_SECS",
    "PORTAL_RENEWAL_TIMEOUT_SECS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_config_env() {
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
}

#[test]
fn from_env_without_overrides_uses_defaults() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    let config = ClientConfig::from_env().unwrap();

    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.renewal_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.request_timeout, Duration::from_secs(60));
}

#[test]
fn from_env_reads_portal_variables() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("PORTAL_API_BASE_URL", "https://portal.example.edu/api");
    std::env::set_var("PORTAL_RENEWAL_TIMEOUT_SECS", "0");

    let config = ClientConfig::from_env().unwrap();

    assert_eq!(config.base_url, "https://portal.example.edu/api");
    assert_eq!(config.renewal_timeout, None);
    assert_eq!(config.endpoint_url(&config.refresh_path), "https://portal.example.edu/api/refresh/");
}

#[test]
fn from_env_rejects_non_numeric_timeouts() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("PORTAL_REQUEST_TIMEOUT_SECS", "a minute");

    let err = ClientConfig::from_env().unwrap_err();

    assert!(matches!(err, ClientError::Configuration(_)));
}
