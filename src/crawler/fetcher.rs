//! HTTP fetcher implementation
//!
//! This module handles every page request made by the crawler and prescan:
//! - Building HTTP clients with the site's user agent and relaxed TLS
//! - A politeness delay paid before each request
//! - Content-Type gating (only `text/html` bodies are returned)
//! - Retry with capped linear backoff for transient failures

use crate::config::{SiteProfile, DEFAULT_USER_AGENT};
use crate::ConfigError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Backoff used between attempts when no other value is configured
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1500);

/// Upper bound for a single backoff pause
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(5000);

/// Status codes worth retrying
const TRANSIENT_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// Final URL after redirects; relative links resolve against it
        final_url: Url,
        /// Page body
        body: String,
    },

    /// The server answered 200 with a non-HTML Content-Type
    NotHtml {
        /// The Content-Type received (empty when missing)
        content_type: String,
    },

    /// The server answered with a status other than 200
    HttpError {
        /// The HTTP status code of the last attempt
        status_code: u16,
        /// Number of requests made
        attempts: u32,
    },

    /// Connection, timeout or body-read failure
    NetworkError {
        /// Error description from the last attempt
        error: String,
        /// Number of requests made
        attempts: u32,
    },
}

impl FetchResult {
    /// Returns the HTML body, discarding failure details
    pub fn into_html(self) -> Option<String> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short description of a failed fetch, `None` on success
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::NotHtml { content_type } => Some(format!(
                "Not HTML (content-type: {})",
                if content_type.is_empty() {
                    "none"
                } else {
                    content_type
                }
            )),
            Self::HttpError {
                status_code,
                attempts,
            } => Some(format!(
                "HTTP {} after {} attempt(s)",
                status_code, attempts
            )),
            Self::NetworkError { error, attempts } => {
                Some(format!("{} after {} attempt(s)", error, attempts))
            }
        }
    }
}

/// Capped linear backoff: `min(cap, (attempt + 1) * base)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

impl Backoff {
    /// Pause after the failed attempt with zero-based index `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base
            .checked_mul(attempt.saturating_add(1))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Pauses taken when every one of `retries + 1` attempts fails
    pub fn schedule(&self, retries: u32) -> Vec<Duration> {
        (0..retries).map(|attempt| self.delay_for(attempt)).collect()
    }
}

/// Tunables for a [`Fetcher`]
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub timeout: Duration,
    /// Politeness delay paid before every fetch
    pub delay: Duration,
    /// Additional attempts after the first transient failure
    pub retries: u32,
    pub backoff: Backoff,
}

impl FetchOptions {
    /// Options derived from a site profile
    pub fn for_site(site: &SiteProfile) -> Result<Self, ConfigError> {
        Ok(Self {
            user_agent: site.user_agent.trim().to_string(),
            timeout: site.request_timeout(),
            delay: site.request_delay()?,
            retries: site.retries,
            backoff: Backoff::default(),
        })
    }

    /// Quick one-off fetches used while guessing a site's configuration
    pub fn prescan() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(20),
            delay: Duration::from_millis(200),
            retries: 1,
            backoff: Backoff::default(),
        }
    }
}

/// Builds an HTTP client for crawling
///
/// Certificate validation is disabled: the crawler only reads public pages
/// and many small recipe sites run with broken certificate chains.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .danger_accept_invalid_certs(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches HTML pages with politeness delay and retry
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(options: FetchOptions) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&options.user_agent, options.timeout)?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetches a URL, returning the body only for HTML pages
    pub async fn fetch_html(&self, url: &str) -> Option<String> {
        self.fetch(url).await.into_html()
    }

    /// Fetches a URL with full outcome reporting
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 200 + `text/html` | Success |
    /// | HTTP 200, other type | Immediate → NotHtml |
    /// | HTTP 429, 500, 502, 503, 504 | Retry with backoff |
    /// | Other HTTP status | Immediate → HttpError |
    /// | Network failure | Retry with backoff |
    ///
    /// No pause follows the final attempt. This never returns an error; every
    /// failure is described by the returned `FetchResult`.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        if !self.options.delay.is_zero() {
            tokio::time::sleep(self.options.delay).await;
        }

        let mut attempt: u32 = 0;
        loop {
            let result = self.attempt(url, attempt + 1).await;

            if !is_retryable(&result) || attempt >= self.options.retries {
                return result;
            }

            let pause = self.options.backoff.delay_for(attempt);
            tracing::debug!(
                "Transient failure for {} ({}), retrying in {:?}",
                url,
                result.failure_reason().unwrap_or_default(),
                pause
            );
            tokio::time::sleep(pause).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &str, attempts: u32) -> FetchResult {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchResult::NetworkError {
                    error: describe_error(&e),
                    attempts,
                }
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return FetchResult::HttpError {
                status_code: status.as_u16(),
                attempts,
            };
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_html_content_type(&content_type) {
            return FetchResult::NotHtml { content_type };
        }

        let final_url = response.url().clone();
        match response.text().await {
            Ok(body) => FetchResult::Success { final_url, body },
            Err(e) => FetchResult::NetworkError {
                error: describe_error(&e),
                attempts,
            },
        }
    }
}

/// Returns true if the status code signals a transient server condition
pub fn is_transient_status(status: u16) -> bool {
    TRANSIENT_STATUSES.contains(&status)
}

fn is_retryable(result: &FetchResult) -> bool {
    match result {
        FetchResult::HttpError { status_code, .. } => is_transient_status(*status_code),
        FetchResult::NetworkError { .. } => true,
        _ => false,
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection failed".to_string()
    } else {
        e.to_string()
    }
}
