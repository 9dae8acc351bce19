//! Attaches the current bearer credential to outbound requests.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use super::request::ApiRequest;
use crate::auth::{AuthError, CredentialStore};

/// Headers for one send, plus the access credential they carry.
#[derive(Debug, Clone)]
pub struct DecoratedHeaders {
    pub headers: HeaderMap,
    /// The access credential attached, if any. Lets the coordinator tell a
    /// stale 401 from a fresh one.
    pub access: Option<String>,
}

/// Reads the store at call time; never caches the header value.
#[derive(Debug, Clone)]
pub struct RequestDecorator {
    store: CredentialStore,
}

impl RequestDecorator {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    pub fn decorate(&self, request: &ApiRequest) -> Result<DecoratedHeaders, AuthError> {
        let mut headers = request.headers.clone();
        let Some(access) = self.store.access()? else {
            return Ok(DecoratedHeaders {
                headers,
                access: None,
            });
        };

        match HeaderValue::from_str(&format!("Bearer {access}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                Ok(DecoratedHeaders {
                    headers,
                    access: Some(access),
                })
            }
            Err(_) => {
                tracing::warn!(path = %request.path, "stored access credential is not a valid header value, sending without it");
                Ok(DecoratedHeaders {
                    headers,
                    access: None,
                })
            }
        }
    }
}
