//! Upstream clients
//!
//! This module contains the two read-only adapters the crawl depends on:
//! - `ContentSource`: the category hierarchy and canonical-id resolution
//! - `MetricsSource`: aggregate pageviews for a canonical id over a date range
//!
//! Both share one HTTP client and one error classification, so the
//! orchestrator's retry policy treats them the same way.

mod category;
mod pageviews;

pub use category::{
    slug_from_full_url, Category, CategoryMember, ContentSource, MediaWikiClient, MemberKind,
    Resolution, CATEGORY_NAMESPACE,
};
pub use pageviews::{Metric, MetricsSource, PageviewsClient};

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Failures talking to an upstream API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Rate limited by {url}")]
    RateLimited { url: String },

    #[error("Server error {status} from {url}")]
    Server { url: String, status: u16 },

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    /// Error reported in the body of a successful MediaWiki response
    #[error("API error {code} from {url}: {info}")]
    Api {
        url: String,
        code: String,
        info: String,
    },
}

/// MediaWiki error codes that clear up on their own
const TRANSIENT_API_ERRORS: &[&str] = &["maxlag", "ratelimited", "readonly"];

impl ClientError {
    /// Returns true if the same request may succeed when repeated
    ///
    /// Timeouts, connection failures, rate limiting, 5xx responses and the
    /// MediaWiki lag/throttle/read-only errors are transient. An unexpected
    /// non-error status or an undecodable body will not change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { code, .. } => TRANSIENT_API_ERRORS.contains(&code.as_str()),
            other => matches!(
                other,
                Self::Timeout { .. }
                    | Self::Connect { .. }
                    | Self::RateLimited { .. }
                    | Self::Server { .. }
                    | Self::Http { .. }
            ),
        }
    }

    /// Classifies a transport-level reqwest error
    pub(crate) fn from_transport(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            Self::Connect {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else if error.is_decode() {
            Self::Decode {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Classifies a non-success status that is not handled by the caller
    pub(crate) fn from_status(url: &str, status: StatusCode) -> Self {
        let url = url.to_string();
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited { url }
        } else if status.is_server_error() {
            Self::Server {
                url,
                status: status.as_u16(),
            }
        } else {
            Self::UnexpectedStatus {
                url,
                status: status.as_u16(),
            }
        }
    }
}

/// Result type for upstream operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Builds the HTTP client shared by both upstream adapters
///
/// Every request carries the identifying User-Agent the Wikimedia APIs
/// require, and is bounded by the configured request and connect timeouts.
///
/// # Example
///
/// ```no_run
/// use obit_crawl::client::build_http_client;
/// use obit_crawl::config::{CrawlerConfig, UserAgentConfig};
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "ObitCrawl".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}
