use std::sync::{Arc, Mutex};

use strum::{Display, EnumString};

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::service::AuthEndpoint;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TeardownReason {
    /// The user asked to log out.
    Logout,
    /// Credential renewal failed; the user must sign in again.
    RenewalFailed,
}

/// Host hook invoked once per ended session.
///
/// A UI host navigates to its login screen here; a CLI prints a notice.
pub trait SessionSignal: Send + Sync {
    fn session_ended(&self, reason: TeardownReason);
}

impl<F> SessionSignal for F
where
    F: Fn(TeardownReason) + Send + Sync,
{
    fn session_ended(&self, reason: TeardownReason) {
        self(reason)
    }
}

/// Signal that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionSignal;

impl SessionSignal for NoopSessionSignal {
    fn session_ended(&self, _reason: TeardownReason) {}
}

/// Clears all session state and tells the host.
///
/// Idempotent: when nothing is persisted there is nothing to tear down, so
/// no revocation is sent and the signal does not fire.
#[derive(Clone)]
pub struct SessionTeardown {
    store: CredentialStore,
    auth: Arc<dyn AuthEndpoint>,
    signal: Arc<dyn SessionSignal>,
    clearing: Arc<Mutex<()>>,
}

impl SessionTeardown {
    pub fn new(
        store: CredentialStore,
        auth: Arc<dyn AuthEndpoint>,
        signal: Arc<dyn SessionSignal>,
    ) -> Self {
        Self {
            store,
            auth,
            signal,
            clearing: Arc::new(Mutex::new(())),
        }
    }

    /// End the session. Returns `true` if state was cleared by this call.
    ///
    /// A deliberate logout first asks the service to revoke the refresh
    /// credential. Revocation is best-effort; its failure is logged and never
    /// blocks the teardown. A failed renewal skips it, since the refresh
    /// credential was just rejected.
    pub async fn teardown(&self, reason: TeardownReason) -> Result<bool, AuthError> {
        self.end_session(reason, None).await
    }

    /// Like [`teardown`](Self::teardown), but only ends the session identified
    /// by `epoch`. A session started since then is left alone.
    pub async fn teardown_epoch(&self, reason: TeardownReason, epoch: u64) -> Result<bool, AuthError> {
        self.end_session(reason, Some(epoch)).await
    }

    async fn end_session(&self, reason: TeardownReason, epoch: Option<u64>) -> Result<bool, AuthError> {
        if !self.store.has_session_state()? {
            tracing::debug!(%reason, "teardown requested with no session state");
            return Ok(false);
        }

        if reason == TeardownReason::Logout {
            if let Some(refresh) = self.store.refresh()? {
                let access = self.store.access()?;
                if let Err(e) = self.auth.revoke(&refresh, access.as_deref()).await {
                    tracing::warn!(error = %e, "refresh credential revocation failed, ignoring");
                }
            }
        }

        let cleared = {
            let _guard = self
                .clearing
                .lock()
                .map_err(|_| AuthError::Io("teardown lock poisoned".to_string()))?;
            self.store.has_session_state()? && self.store.clear_session(epoch)?
        };

        if cleared {
            tracing::info!(%reason, "session torn down");
            self.signal.session_ended(reason);
        }
        Ok(cleared)
    }
}
