//! Wire transport for API calls.

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use super::request::{ApiRequest, ApiResponse};
use crate::error::ClientError;

/// Sends one request with the given headers and buffers the response.
///
/// Any HTTP status is a successful send; only failures to get a response at
/// all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest, headers: HeaderMap) -> Result<ApiResponse, ClientError>;
}

/// `Transport` over a shared reqwest client and a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest, headers: HeaderMap) -> Result<ApiResponse, ClientError> {
        let url = self.url_for(&request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(request_id = %request.id, method = %request.method, %url, "sending request");
        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_joins_relative_paths() {
        let transport = HttpTransport::new(reqwest::Client::new(), "http://localhost:8000/api/");
        assert_eq!(transport.url_for("/tos/3/"), "http://localhost:8000/api/tos/3/");
        assert_eq!(transport.url_for("tos/3/"), "http://localhost:8000/api/tos/3/");
    }

    #[test]
    fn url_for_keeps_absolute_urls() {
        let transport = HttpTransport::new(reqwest::Client::new(), "http://localhost:8000/api");
        assert_eq!(
            transport.url_for("https://files.example.edu/sig.png"),
            "https://files.example.edu/sig.png"
        );
    }
}
