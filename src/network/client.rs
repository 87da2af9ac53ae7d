//! HTTP transport backed by reqwest

use super::transport::{Transport, TransportError, TransportRequest};
use crate::config::CallMethod;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// HTTP transport with optional base URL for relative endpoints
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Option<Url>,
    default_timeout: Duration,
    user_agent: String,
}

impl HttpTransport {
    /// Create a new transport with default settings
    pub fn new() -> Result<Self> {
        let default_timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        let client = Client::builder()
            .timeout(default_timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url: None,
            default_timeout,
            user_agent: format!("limbo-search/{}", crate::VERSION),
        })
    }

    /// Resolve relative endpoints (`/api/search`) against a base URL
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Some(Url::parse(base_url)?);
        Ok(self)
    }

    /// Set default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set custom user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Get current user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Absolute URL for a request target
    fn resolve_url(&self, target: &str) -> std::result::Result<Url, TransportError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(target),
            None => Url::parse(target),
        };
        parsed.map_err(|e| TransportError::Network(format!("Invalid URL '{}': {}", target, e)))
    }

    /// Turn a response into a JSON body or a status error
    async fn parse_response(response: Response) -> std::result::Result<Value, TransportError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            let payload = serde_json::from_str::<Value>(&text).ok();
            return Err(TransportError::Status {
                status: status.as_u16(),
                payload,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| TransportError::Network(format!("Failed to parse JSON: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: TransportRequest) -> std::result::Result<Value, TransportError> {
        if request.signal.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let url = self.resolve_url(&request.url)?;
        debug!("{:?} {}", request.method, url);

        let mut req_builder = match request.method {
            CallMethod::Get => self.client.get(url),
            CallMethod::Post => self.client.post(url),
        };

        let timeout = request
            .options
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);
        req_builder = req_builder
            .timeout(timeout)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json");

        for (key, value) in &request.options.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = &request.body {
            req_builder = req_builder.json(body);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if request.signal.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchOptions;
    use crate::network::CancelSignal;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: String, method: CallMethod, body: Option<Value>) -> TransportRequest {
        TransportRequest {
            url,
            method,
            body,
            signal: CancelSignal::never(),
            options: FetchOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_transport_creation() {
        let transport = tokio_test::assert_ok!(HttpTransport::new());
        assert!(transport.user_agent().starts_with("limbo-search/"));
        let transport = transport.with_user_agent("test-agent");
        assert_eq!(transport.user_agent(), "test-agent");
    }

    #[tokio::test]
    async fn test_get_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "shoes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2]})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap().with_base_url(&server.uri()).unwrap();
        let body = transport
            .call(request("/api/search?q=shoes".to_string(), CallMethod::Get, None))
            .await
            .unwrap();

        assert_eq!(body, json!({"data": [1, 2]}));
    }

    #[tokio::test]
    async fn test_post_sends_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .and(header("x-site", "7"))
            .and(body_json(json!({"q": "shoes"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let mut req = request(
            format!("{}/api/search", server.uri()),
            CallMethod::Post,
            Some(json!({"q": "shoes"})),
        );
        req.options
            .headers
            .insert("x-site".to_string(), "7".to_string());

        assert!(transport.call(req).await.is_ok());
    }

    #[tokio::test]
    async fn test_error_status_keeps_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "bad"})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let error = transport
            .call(request(format!("{}/api/search", server.uri()), CallMethod::Get, None))
            .await
            .unwrap_err();

        assert_eq!(
            error,
            TransportError::Status {
                status: 422,
                payload: Some(json!({"message": "bad"}))
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let (handle, _registration) = futures::future::AbortHandle::new_pair();
        handle.abort();

        let transport = HttpTransport::new().unwrap();
        let mut req = request("http://127.0.0.1:9/never".to_string(), CallMethod::Get, None);
        req.signal = CancelSignal::new(handle);

        assert_eq!(transport.call(req).await, Err(TransportError::Cancelled));
    }

    #[tokio::test]
    async fn test_relative_url_without_base() {
        let transport = HttpTransport::new().unwrap();
        let error = transport
            .call(request("/api/search".to_string(), CallMethod::Get, None))
            .await
            .unwrap_err();
        assert!(matches!(error, TransportError::Network(_)));
    }
}
