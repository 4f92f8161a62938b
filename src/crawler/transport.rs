//! HTTP transport abstraction
//!
//! The crawler talks to the network only through [`HttpTransport`], so tests
//! can swap in scripted transports and the session never sees `reqwest` types.

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;

/// Sentinel status recorded when every attempt timed out
pub const STATUS_TIMEOUT: u16 = 408;

/// Sentinel status recorded when the server could not be reached
pub const STATUS_UNAVAILABLE: u16 = 503;

/// A completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code; redirects are not followed
    pub status: u16,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Location header of a 3xx response
    pub location: Option<String>,

    /// Response body, read only for 2xx responses
    pub body: Option<String>,
}

impl TransportResponse {
    /// Returns true for 2xx responses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for a 3xx response that names its target
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    /// Returns true if the Content-Type looks like HTML
    ///
    /// A missing Content-Type is treated as HTML, since many small servers
    /// omit it.
    pub fn is_html(&self) -> bool {
        is_html_content_type(self.content_type.as_deref())
    }
}

/// Returns true if a Content-Type value (or its absence) may carry HTML
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type.map_or(true, |ct| {
        let ct = ct.to_ascii_lowercase();
        ct.contains("text/html") || ct.contains("application/xhtml")
    })
}

/// Transport-level failure of one request
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read body (HTTP {status}): {message}")]
    Body { status: u16, message: String },
}

impl TransportError {
    /// Returns true if retrying the request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_))
    }

    /// Status code to record once retries are exhausted
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Timeout => STATUS_TIMEOUT,
            Self::Body { status, .. } => *status,
            Self::Connect(_) | Self::Request(_) => STATUS_UNAVAILABLE,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Performs HTTP GET requests for the crawler
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Fetches `url`, sending `user_agent` and giving up after `timeout`
    async fn get(
        &self,
        url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a transport with the crawler's client settings
    ///
    /// Redirects are returned to the caller rather than followed, so every
    /// hop passes the same-host and robots.txt checks.
    ///
    /// # Returns
    ///
    /// * `Ok(ReqwestTransport)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - Failed to build client (TLS backend init)
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::none())
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// Wraps an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !response.status().is_success() {
            let location = response
                .status()
                .is_redirection()
                .then(|| response.headers().get(reqwest::header::LOCATION))
                .flatten()
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            return Ok(TransportResponse {
                status,
                content_type,
                location,
                body: None,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body {
                    status,
                    message: e.to_string(),
                }
            }
        })?;

        Ok(TransportResponse {
            status,
            content_type,
            location: None,
            body: Some(body),
        })
    }
}
