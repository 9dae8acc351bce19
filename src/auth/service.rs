use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;

use super::error::AuthError;
use super::identity::Identity;
use super::token::{Credential, RenewedCredential};
use crate::config::ClientConfig;

/// Successful login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: Identity,
}

impl LoginResponse {
    pub fn credential(&self) -> Credential {
        Credential::new(self.access.clone(), self.refresh.clone())
    }
}

/// The remote authentication service: login, renewal and revocation.
///
/// Implementations only translate wire calls into typed results; session
/// state is owned by the caller.
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    async fn login(&self, faculty_id: &str, password: &str) -> Result<LoginResponse, AuthError>;

    /// Exchange a refresh credential for a new access credential.
    async fn renew(&self, refresh: &str) -> Result<RenewedCredential, AuthError>;

    /// Ask the service to invalidate a refresh credential.
    async fn revoke(&self, refresh: &str, access: Option<&str>) -> Result<(), AuthError>;
}

/// `AuthEndpoint` over the portal's REST API.
///
/// # Example
/// ```no_run
/// use portal_client::auth::HttpAuthEndpoint;
/// use portal_client::config::ClientConfig;
///
/// let endpoint = HttpAuthEndpoint::new(reqwest::Client::new(), &ClientConfig::default());
/// ```
#[derive(Debug, Clone)]
pub struct HttpAuthEndpoint {
    client: reqwest::Client,
    login_url: String,
    refresh_url: String,
    logout_url: String,
}

impl HttpAuthEndpoint {
    pub fn new(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            login_url: config.endpoint_url(&config.login_path),
            refresh_url: config.endpoint_url(&config.refresh_path),
            logout_url: config.endpoint_url(&config.logout_path),
        }
    }
}

#[async_trait]
impl AuthEndpoint for HttpAuthEndpoint {
    async fn login(&self, faculty_id: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let resp = self
            .client
            .post(&self.login_url)
            .json(&json!({ "faculty_id": faculty_id, "password": password }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::InvalidCredentials(extract_detail(&body)));
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidResponse(format!("login response: {e}")))
    }

    async fn renew(&self, refresh: &str) -> Result<RenewedCredential, AuthError> {
        let resp = self
            .client
            .post(&self.refresh_url)
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::RenewalRejected {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        let renewed: RenewedCredential = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidResponse(format!("renewal response: {e}")))?;
        if renewed.access.is_empty() {
            return Err(AuthError::InvalidResponse(
                "renewal response carried an empty access credential".to_string(),
            ));
        }
        Ok(renewed)
    }

    async fn revoke(&self, refresh: &str, access: Option<&str>) -> Result<(), AuthError> {
        let mut request = self
            .client
            .post(&self.logout_url)
            .json(&json!({ "refresh": refresh }));
        if let Some(access) = access {
            request = request.header(AUTHORIZATION, format!("Bearer {access}"));
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "logout failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks at `detail`, then the first `non_field_errors` entry, then falls back
/// to the raw body.
pub(crate) fn extract_detail(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.get("detail")
            .and_then(|d| d.as_str())
            .or_else(|| {
                v.get("non_field_errors")
                    .and_then(|e| e.get(0))
                    .and_then(|e| e.as_str())
            })
            .map(str::to_string)
    });
    from_json.unwrap_or_else(|| body.trim().to_string())
}
