//! Gemini reputation lookup client.
//!
//! ### Protocol
//!
//! - **Endpoint**: `{base}/models/{model}:generateContent`
//! - **Authentication**: `x-goog-api-key` header.
//! - **Rate Limiting**: minimum interval between requests (token bucket of one).
//! - **Grounding**: Google Search tool; `groundingMetadata` is passed through untouched.
//! - **Errors**: 503 maps to [`UpstreamError::Overloaded`] (retryable); any other
//!   non-success status, transport failure or malformed body is terminal.

pub mod request;
pub mod response;

pub use request::GenerateContentRequest;
pub use response::GenerateContentResponse;

use async_trait::async_trait;
use repute_core::AppConfig;
use reqwest::header;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::{LookupRequest, LookupResponse, ReputationLookup, UpstreamError};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = concat!("repute/", env!("CARGO_PKG_VERSION"));

/// Minimum interval between requests.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Base URL (default: https://generativelanguage.googleapis.com/v1beta).
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub min_interval: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self {
            api_key: String::new(),
            base_url: app.api_base_url,
            model: app.model,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_interval: MIN_REQUEST_INTERVAL,
        }
    }
}

impl GeminiConfig {
    /// Build from application config.
    ///
    /// Returns `MissingApiKey` when no key is configured.
    pub fn from_app(config: &AppConfig) -> Result<Self, UpstreamError> {
        let api_key = config.require_api_key().map_err(|_| UpstreamError::MissingApiKey)?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout(),
            ..Default::default()
        })
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl GeminiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self, UpstreamError> {
        if config.api_key.is_empty() {
            return Err(UpstreamError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| UpstreamError::Network(Arc::new(e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.min_interval));
        Ok(Self { http, config, rate_limiter })
    }

    /// Create a client from application config.
    pub fn from_app(config: &AppConfig) -> Result<Self, UpstreamError> {
        Self::new(GeminiConfig::from_app(config)?)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.config.base_url, self.config.model)
    }
}

#[async_trait]
impl ReputationLookup for GeminiClient {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, UpstreamError> {
        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let body = GenerateContentRequest::for_lookup(request);

        tracing::debug!(
            hostname = %request.hostname,
            sources = request.source_domains.len(),
            model = %self.config.model,
            "querying reputation service"
        );

        let http_response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = http_response.status();
        let bytes = http_response.bytes().await?;

        tracing::debug!(status = status.as_u16(), elapsed = ?start.elapsed(), "reputation service responded");

        if !status.is_success() {
            return Err(UpstreamError::from_status(status.as_u16(), response::error_message(&bytes)));
        }

        let raw: GenerateContentResponse =
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Parse(e.to_string()))?;

        LookupResponse::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new_missing_key() {
        let result = GeminiClient::new(GeminiConfig::default());
        assert!(matches!(result, Err(UpstreamError::MissingApiKey)));
    }

    #[test]
    fn test_config_from_app() {
        let app = AppConfig {
            api_key: Some("k".into()),
            api_base_url: "https://example.test/v1/".into(),
            model: "gemini-test".into(),
            timeout_ms: 5_000,
            ..Default::default()
        };
        let config = GeminiConfig::from_app(&app).unwrap();
        assert_eq!(config.base_url, "https://example.test/v1");
        assert_eq!(config.model, "gemini-test");
        assert_eq!(config.timeout, Duration::from_secs(5));

        assert!(matches!(GeminiConfig::from_app(&AppConfig::default()), Err(UpstreamError::MissingApiKey)));
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(GeminiConfig {
            api_key: "k".into(),
            base_url: "https://example.test/v1beta".into(),
            model: "gemini-x".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint(), "https://example.test/v1beta/models/gemini-x:generateContent");
    }

    /// Serve one canned HTTP response on a local port; resolves to the raw request.
    async fn serve_once(status: u16, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (base_url, handle)
    }

    fn local_client(base_url: String) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "test-key".into(),
            base_url,
            model: "gemini-x".into(),
            min_interval: Duration::ZERO,
            ..Default::default()
        })
        .unwrap()
    }

    fn lookup_request() -> LookupRequest {
        LookupRequest {
            hostname: "example.com".into(),
            source_domains: vec!["trustpilot.com".into()],
            max_bullets: 2,
            max_words: 8,
        }
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "{\"isSource\": false, \"reviews\": [{\"source\": \"trustpilot.com\", \"url\": \"https://trustpilot.com/review/example.com\", \"rating\": 4.5, \"summary\": [\"Fast shipping\"]}]}"}]}, "groundingMetadata": {"webSearchQueries": ["example.com"]}}]}"#;
        let (base_url, server) = serve_once(200, body).await;

        let response = local_client(base_url).lookup(&lookup_request()).await.unwrap();
        assert_eq!(response.reviews.len(), 1);
        assert_eq!(response.reviews[0].rating, 4.5);
        assert!(response.grounding_metadata.is_some());

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /models/gemini-x:generateContent"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
        assert!(request.contains("example.com"));
    }

    #[tokio::test]
    async fn test_lookup_overloaded_is_retryable() {
        let body = r#"{"error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}}"#;
        let (base_url, _server) = serve_once(503, body).await;

        let err = local_client(base_url).lookup(&lookup_request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("The model is overloaded."));
    }

    #[tokio::test]
    async fn test_lookup_rejected_status() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        let (base_url, _server) = serve_once(400, body).await;

        let err = local_client(base_url).lookup(&lookup_request()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, UpstreamError::Http { status: 400, ref message } if message == "API key not valid."));
    }

    #[tokio::test]
    async fn test_lookup_malformed_body() {
        let (base_url, _server) = serve_once(200, "not json").await;

        let err = local_client(base_url).lookup(&lookup_request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }

    #[tokio::test]
    async fn test_rate_limiter_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
