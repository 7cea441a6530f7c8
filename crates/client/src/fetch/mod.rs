//! Network fetch capability.
//!
//! ### Fetch contract
//! - A response with any HTTP status is a successful fetch; only transport
//!   failures, timeouts and oversized bodies are errors.
//! - Response type is `basic` when the final URL (after redirects) is
//!   same-origin with the application, `cors` otherwise.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use async_trait::async_trait;
use reqwest::Client;
use shield_core::{Request, Response, ResponseType};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, resolve, same_origin};

/// Errors from a network fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// The request did not complete within the configured timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Connection could not be established or was reset.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Response body exceeded the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    /// Request could not be built or sent, or the body could not be read.
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout(err.to_string())
        } else if err.is_connect() {
            NetworkError::Connect(err.to_string())
        } else {
            NetworkError::Request(err.to_string())
        }
    }
}

impl From<NetworkError> for shield_core::Error {
    fn from(err: NetworkError) -> Self {
        shield_core::Error::Network(err.to_string())
    }
}

/// Network capability consumed by the worker.
///
/// Implementations must not retry; one call is one network attempt.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch a request over the network.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "driver-shield-sw/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Application origin used to type responses. When unset, the request's
    /// own origin is used.
    pub origin: Option<::url::Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "driver-shield-sw/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    /// Build a fetch config from the worker configuration.
    pub fn from_worker(config: &shield_core::WorkerConfig) -> Result<Self, shield_core::ConfigError> {
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            origin: Some(config.origin_url()?),
        })
    }
}

/// reqwest-backed network client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, NetworkError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| NetworkError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn response_type(&self, request: &Request, final_url: &::url::Url) -> ResponseType {
        let origin = self.config.origin.as_ref().unwrap_or(&request.url);
        if same_origin(origin, final_url) { ResponseType::Basic } else { ResponseType::Cors }
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone())
            .send()
            .await?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(NetworkError::TooLarge { size: len, limit: self.config.max_bytes });
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response.bytes().await?;

        if body.len() > self.config.max_bytes {
            return Err(NetworkError::TooLarge { size: body.len() as u64, limit: self.config.max_bytes });
        }

        let response_type = self.response_type(request, &final_url);

        tracing::debug!(
            "fetched {} {} -> {} ({}) in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response { status, headers, body, response_type, url: Some(final_url) })
    }
}
