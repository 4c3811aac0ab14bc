//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with user agent and timeouts
//! - One GET per call, with redirects followed by the client
//! - Mapping status codes and transport failures onto [`FetchError`]
//!
//! Retries are deliberately absent here; the coordinator owns the retry
//! policy so attempt counts stay visible in the run result.

use crate::config::FetchConfig;
use crate::FetchError;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, StatusCode};
use url::Url;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchedResource {
    /// Returns true if the response declares (or, lacking a header, looks like) HTML
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => self.body.iter().take(1024).any(|b| *b == b'<'),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use miles::config::FetchConfig;
/// use miles::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs single GET requests on behalf of the workers
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an existing client (shares its connection pool)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetches a URL once
    ///
    /// # Status Mapping
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx | `Ok(FetchedResource)` |
    /// | 4xx | `FetchError::NotFound` |
    /// | 5xx, other non-success | `FetchError::ServerError` |
    /// | Request or body timeout | `FetchError::Timeout` |
    /// | Connection, TLS, redirect, body errors | `FetchError::NetworkError` |
    pub async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(classify_transport_error)?
            .to_vec();

        Ok(FetchedResource {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Maps a non-success status onto a fetch error by status class
fn classify_status(status: StatusCode) -> FetchError {
    let code = status.as_u16();
    if status.is_client_error() {
        FetchError::NotFound { status: code }
    } else {
        FetchError::ServerError { status: code }
    }
}

fn classify_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::NetworkError(format!("connection failed: {}", e))
    } else {
        FetchError::NetworkError(e.to_string())
    }
}
