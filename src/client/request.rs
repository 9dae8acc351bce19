//! Replayable request descriptors and buffered responses.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ClientError;

/// Immutable description of one API call.
///
/// Holds everything needed to send the call again after a credential
/// renewal. The `Authorization` header is never stored here; it is attached
/// fresh on every send.
///
/// # Example
/// ```
/// use portal_client::client::ApiRequest;
///
/// let request = ApiRequest::get("/syllabi/")
///     .query("status", "pending")
///     .query("page", "2");
/// assert_eq!(request.path, "/syllabi/");
/// assert_eq!(request.query.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Correlates log lines for the original send and any replay.
    pub id: Uuid,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` and attach it as JSON.
    pub fn json_body<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)?;
        Ok(self.json(value))
    }
}

/// How many times a request has been sent because of a renewal.
///
/// Carried alongside the request; a request is sent at most twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Retried,
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Success responses pass through; every other status becomes
    /// [`ClientError::Api`] with the body as received.
    pub fn into_result(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::api(self.status.as_u16(), self.text()))
        }
    }
}
