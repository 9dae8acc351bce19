//! Authenticated API client.

pub mod coordinator;
pub mod decorator;
pub mod request;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use coordinator::{RefreshCoordinator, RefreshState};
pub use decorator::{DecoratedHeaders, RequestDecorator};
pub use request::{ApiRequest, ApiResponse, Attempt};
pub use transport::{HttpTransport, Transport};

use crate::auth::{
    AuthEndpoint, AuthError, CredentialStore, FileKeyValueStore, HttpAuthEndpoint, Identity,
    KeyValueStore, NoopSessionSignal, SessionSignal, SessionTeardown, TeardownReason,
};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Where a successful login leaves the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Exactly one role; it is now active.
    Ready { role: String, identity: Identity },
    /// Several roles; call [`ApiClient::choose_role`] with one of them.
    ChooseRole { roles: Vec<String> },
}

/// Client for the portal API.
///
/// Every call made through [`send`](Self::send) carries the current access
/// credential and survives its expiry: the first 401 renews the credential
/// once for all concurrent callers and replays them.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use portal_client::auth::MemoryKeyValueStore;
/// use portal_client::client::{ApiClient, LoginOutcome};
/// use portal_client::config::ClientConfig;
///
/// # async fn run() -> portal_client::error::Result<()> {
/// let client = ApiClient::builder()
///     .config(ClientConfig::new("http://127.0.0.1:8000/api"))
///     .kv(Arc::new(MemoryKeyValueStore::new()))
///     .build()?;
///
/// if let LoginOutcome::ChooseRole { roles } = client.login("2020-0001", "secret").await? {
///     client.choose_role(&roles[0])?;
/// }
/// let colleges: serde_json::Value = client.get_json("/colleges/").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    store: CredentialStore,
    auth: Arc<dyn AuthEndpoint>,
    coordinator: RefreshCoordinator,
    teardown: SessionTeardown,
}

#[bon::bon]
impl ApiClient {
    /// Anything left unset falls back to the HTTP implementations and the
    /// file-backed session store named by `config`.
    #[builder]
    pub fn new(
        #[builder(default)] config: ClientConfig,
        kv: Option<Arc<dyn KeyValueStore>>,
        signal: Option<Arc<dyn SessionSignal>>,
        transport: Option<Arc<dyn Transport>>,
        auth: Option<Arc<dyn AuthEndpoint>>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let kv = kv.unwrap_or_else(|| Arc::new(FileKeyValueStore::new(config.session_file.clone())));
        let signal = signal.unwrap_or_else(|| Arc::new(NoopSessionSignal));
        let transport = transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(http.clone(), config.base_url.clone())));
        let auth = auth.unwrap_or_else(|| Arc::new(HttpAuthEndpoint::new(http, &config)));

        let store = CredentialStore::new(kv);
        let teardown = SessionTeardown::new(store.clone(), auth.clone(), signal);
        let coordinator = RefreshCoordinator::new(
            transport,
            store.clone(),
            auth.clone(),
            teardown.clone(),
            config.renewal_timeout,
        );

        Ok(Self {
            config,
            store,
            auth,
            coordinator,
            teardown,
        })
    }
}

impl ApiClient {
    /// Client with every collaborator at its default.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    /// Send a request through the renewal pipeline.
    ///
    /// Non-success statuses other than a recoverable 401 come back as
    /// [`ClientError::Api`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.coordinator.execute(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).json_body(body)?;
        self.send(request).await?.json()
    }

    /// Sign in and persist the new session.
    ///
    /// Goes straight to the login endpoint; a rejection here is bad
    /// credentials, never a renewal trigger.
    pub async fn login(&self, faculty_id: &str, password: &str) -> Result<LoginOutcome, ClientError> {
        if faculty_id.trim().is_empty() || password.is_empty() {
            return Err(ClientError::InvalidArgument(
                "faculty ID and password are required".to_string(),
            ));
        }
        let response = self.auth.login(faculty_id, password).await?;
        self.store.set_credential(&response.credential())?;
        self.store.set_identity(&response.user)?;

        let mut roles = response.user.role_names();
        tracing::info!(user_id = response.user.id, roles = roles.len(), "signed in");
        match roles.len() {
            0 => {
                self.store.clear_credential()?;
                self.store.clear_identity()?;
                Err(AuthError::NoRoles.into())
            }
            1 => {
                let role = roles.remove(0);
                self.store.set_active_role(&role)?;
                Ok(LoginOutcome::Ready {
                    role,
                    identity: response.user,
                })
            }
            _ => {
                self.store.clear_active_role()?;
                Ok(LoginOutcome::ChooseRole { roles })
            }
        }
    }

    /// Make one of the signed-in user's roles active.
    pub fn choose_role(&self, role: &str) -> Result<String, ClientError> {
        let identity = self.store.identity()?.ok_or(AuthError::NotLoggedIn)?;
        if !identity.has_role(role) {
            return Err(AuthError::UnknownRole(role.to_string()).into());
        }
        let role = role.trim().to_ascii_lowercase();
        self.store.set_active_role(&role)?;
        tracing::debug!(%role, "active role selected");
        Ok(role)
    }

    /// Pick up a persisted session, wiping it if it fails validation.
    pub fn restore_session(&self) -> Result<Option<Identity>, ClientError> {
        Ok(self.store.restore()?)
    }

    /// End the session deliberately. Returns `false` when there was none.
    pub async fn logout(&self) -> Result<bool, ClientError> {
        Ok(self.teardown.teardown(TeardownReason::Logout).await?)
    }

    pub fn identity(&self) -> Result<Option<Identity>, ClientError> {
        Ok(self.store.identity()?)
    }

    pub fn active_role(&self) -> Result<Option<String>, ClientError> {
        Ok(self.store.active_role()?)
    }

    pub fn is_authenticated(&self) -> Result<bool, ClientError> {
        Ok(self.store.credential()?.is_some())
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.coordinator.state()
    }

    /// Callers parked behind the in-flight renewal.
    pub fn pending_callers(&self) -> usize {
        self.coordinator.pending_len()
    }
}
