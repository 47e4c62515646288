//! HTTP transport abstraction
//!
//! The request pipeline talks to the network through [`HttpTransport`] so it
//! can be exercised without a real server. [`ReqwestTransport`] is the
//! default; [`MockHttpTransport`] replays scripted responses in tests.
//!
//! Transports do not enforce deadlines. The pipeline wraps each call in a
//! timeout and drops the in-flight future when it expires.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::{instrument, trace};

/// Transport layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not reach the server (DNS, refused, TLS)
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be sent or the connection dropped mid-flight
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The transport could not be initialized
    #[error("transport setup failed: {0}")]
    Setup(String),
}

/// Outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL including the query string
    pub url: String,
    pub headers: HeaderMap,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Response as read off the wire; the body is read exactly once
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase (`Not Found`), empty if unknown
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Response with the canonical reason phrase for `status`
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// `200 OK` with a JSON body
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Replace the reason phrase
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Capability the request pipeline uses to perform one HTTP exchange
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the request and read the full response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with a fresh connection pool
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { client })
    }

    /// Reuse an existing `reqwest` client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        trace!(status = status.as_u16(), len = body.len(), "Response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Mock transport for testing
///
/// Replays queued responses in order and captures every request. When the
/// queue is empty, requests fail with a connection error.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MockHttpTransport {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<HttpResponse, TransportError>>>,
    requests: parking_lot::Mutex<Vec<HttpRequest>>,
    latency: Option<std::time::Duration>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockHttpTransport {
    /// Create a mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, e.g. to trip the pipeline timeout
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a response
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queue a JSON response with the given status
    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push_response(HttpResponse::new(status, body.to_string()));
    }

    /// Queue a transport failure
    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Requests captured so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no scripted response".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_builder() {
        let resp = HttpResponse::new(404, "")
            .with_header("X-RateLimit-Limit", "100")
            .with_header("bad header", "ignored");
        assert_eq!(resp.status_text, "Not Found");
        assert!(!resp.is_success());
        // Lookups are case-insensitive
        assert_eq!(resp.header("x-ratelimit-limit"), Some("100"));
        assert_eq!(resp.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_replays_in_order() {
        let mock = MockHttpTransport::new();
        mock.push_json(200, serde_json::json!({"ok": true}));
        mock.push_error(TransportError::Request("reset".into()));

        let first = mock.send(HttpRequest::get("https://mock.test/a")).await.unwrap();
        assert_eq!(first.status, 200);
        assert!(first.body.contains("ok"));

        let second = mock.send(HttpRequest::get("https://mock.test/b")).await;
        assert_eq!(second.unwrap_err(), TransportError::Request("reset".into()));

        // Queue drained
        assert!(matches!(
            mock.send(HttpRequest::get("https://mock.test/c")).await,
            Err(TransportError::Connect(_))
        ));

        assert_eq!(mock.request_count(), 3);
        assert_eq!(mock.last_request().unwrap().url, "https://mock.test/c");
    }
}
