//! Single-flight credential renewal with queued replay.
//!
//! Every response passes through [`RefreshCoordinator::execute`]. A 401 on a
//! first attempt either starts the one renewal (when idle) or parks the caller
//! behind the renewal already in flight. When the renewal settles, the
//! triggering request and every parked request are replayed in arrival order
//! with the new credential, or all of them are rejected and the session is
//! torn down.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use strum::Display;
use tokio::sync::oneshot;

use super::decorator::RequestDecorator;
use super::request::{ApiRequest, ApiResponse, Attempt};
use super::transport::Transport;
use crate::auth::{AuthEndpoint, AuthError, CredentialStore, SessionTeardown, TeardownReason};
use crate::error::ClientError;

/// Whether a renewal is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// A caller parked while a renewal is in flight.
struct PendingCaller {
    request: ApiRequest,
    completion: oneshot::Sender<Result<ApiResponse, ClientError>>,
}

/// `refresh` and `pending` change together under one lock. `pending` is
/// non-empty only while `refresh == Refreshing`.
struct CoordinatorState {
    refresh: RefreshState,
    pending: VecDeque<PendingCaller>,
}

enum UnauthorizedAction {
    /// Parked behind the in-flight renewal.
    Wait,
    /// This caller started the renewal.
    Renew(PendingCaller),
    /// A renewal already landed after this request went out.
    Replay(ApiRequest),
}

struct Inner {
    state: Mutex<CoordinatorState>,
    decorator: RequestDecorator,
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    auth: Arc<dyn AuthEndpoint>,
    teardown: SessionTeardown,
    renewal_timeout: Option<Duration>,
}

/// Owns the refresh state machine for one client.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        auth: Arc<dyn AuthEndpoint>,
        teardown: SessionTeardown,
        renewal_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CoordinatorState {
                    refresh: RefreshState::Idle,
                    pending: VecDeque::new(),
                }),
                decorator: RequestDecorator::new(store.clone()),
                transport,
                store,
                auth,
                teardown,
                renewal_timeout,
            }),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.inner.lock_state().refresh
    }

    /// Number of callers parked behind the in-flight renewal.
    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// Send `request`, renewing the credential and replaying once on 401.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let (response, sent_with) = self.inner.dispatch(&request).await?;
        if response.is_unauthorized() {
            return self.on_unauthorized(request, sent_with).await;
        }
        finish(&request, response, Attempt::Initial)
    }

    async fn on_unauthorized(
        &self,
        request: ApiRequest,
        sent_with: Option<String>,
    ) -> Result<ApiResponse, ClientError> {
        let (completion, settled) = oneshot::channel();
        let action = {
            let mut state = self.inner.lock_state();
            match state.refresh {
                RefreshState::Refreshing => {
                    state.pending.push_back(PendingCaller {
                        request,
                        completion,
                    });
                    tracing::debug!(queued = state.pending.len(), "renewal in flight, parking request");
                    UnauthorizedAction::Wait
                }
                RefreshState::Idle => {
                    let current = self.inner.store.access()?;
                    if current.is_some() && current != sent_with {
                        UnauthorizedAction::Replay(request)
                    } else {
                        state.refresh = RefreshState::Refreshing;
                        UnauthorizedAction::Renew(PendingCaller {
                            request,
                            completion,
                        })
                    }
                }
            }
        };

        match action {
            UnauthorizedAction::Replay(request) => {
                tracing::debug!(request_id = %request.id, "credential already renewed, replaying");
                return self.inner.replay(&request).await;
            }
            UnauthorizedAction::Renew(trigger) => {
                tracing::info!(request_id = %trigger.request.id, "access credential rejected, starting renewal");
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.renew_and_settle(trigger).await });
            }
            UnauthorizedAction::Wait => {}
        }

        settled.await.unwrap_or_else(|_| {
            Err(ClientError::InvalidState(
                "renewal ended without settling this request".to_string(),
            ))
        })
    }
}

/// Resolve a response that will not trigger a renewal.
///
/// A 401 on a retried request is final.
fn finish(request: &ApiRequest, response: ApiResponse, attempt: Attempt) -> Result<ApiResponse, ClientError> {
    if response.is_unauthorized() && attempt == Attempt::Retried {
        tracing::warn!(request_id = %request.id, path = %request.path, "request rejected again after renewal");
        return Err(ClientError::StillUnauthorized(response.text()));
    }
    response.into_result()
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<(ApiResponse, Option<String>), ClientError> {
        let decorated = self.decorator.decorate(request)?;
        let response = self.transport.send(request, decorated.headers).await?;
        Ok((response, decorated.access))
    }

    /// Second and final send of a request.
    async fn replay(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let (response, _) = self.dispatch(request).await?;
        finish(request, response, Attempt::Retried)
    }

    /// Renew against the session identified by `epoch`.
    ///
    /// The new credential is committed only if that session is still current;
    /// a logout or login during the call yields [`AuthError::SessionEnded`].
    async fn renew(&self, epoch: u64) -> Result<(), AuthError> {
        let refresh = self
            .store
            .refresh()?
            .ok_or(AuthError::MissingRefreshCredential)?;
        let call = self.auth.renew(&refresh);
        let renewed = match self.renewal_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AuthError::RenewalTimeout(limit))??,
            None => call.await?,
        };
        if self
            .store
            .commit_renewal(epoch, &renewed.access, renewed.refresh.as_deref())?
        {
            Ok(())
        } else {
            Err(AuthError::SessionEnded)
        }
    }

    /// Settle the renewal started by `trigger`.
    ///
    /// On failure the session is torn down while still `Refreshing`, so late
    /// 401s keep parking instead of starting a second renewal.
    async fn renew_and_settle(self: Arc<Self>, trigger: PendingCaller) {
        let (outcome, epoch) = match self.store.session_epoch() {
            Ok(epoch) => (self.renew(epoch).await, Some(epoch)),
            Err(e) => (Err(e), None),
        };

        match &outcome {
            Err(AuthError::SessionEnded) => {
                tracing::info!("session ended during renewal, discarding renewed credential");
            }
            Err(e) => {
                tracing::warn!(error = %e, "credential renewal failed, ending session");
                let ended = match epoch {
                    Some(epoch) => {
                        self.teardown
                            .teardown_epoch(TeardownReason::RenewalFailed, epoch)
                            .await
                    }
                    None => self.teardown.teardown(TeardownReason::RenewalFailed).await,
                };
                if let Err(te) = ended {
                    tracing::warn!(error = %te, "session teardown failed");
                }
            }
            Ok(()) => {}
        }

        let pending = {
            let mut state = self.lock_state();
            state.refresh = RefreshState::Idle;
            std::mem::take(&mut state.pending)
        };
        let callers = std::iter::once(trigger).chain(pending);

        match outcome {
            Ok(()) => {
                let replays = callers.map(|caller| {
                    let inner = &self;
                    async move {
                        let result = inner.replay(&caller.request).await;
                        let _ = caller.completion.send(result);
                    }
                });
                let settled = join_all(replays).await;
                tracing::info!(replayed = settled.len(), "credential renewed");
            }
            Err(e) => {
                for caller in callers {
                    let _ = caller
                        .completion
                        .send(Err(ClientError::RenewalFailed(e.clone())));
                }
            }
        }
    }
}
