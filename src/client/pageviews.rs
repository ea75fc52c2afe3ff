//! Pageviews metrics client
//!
//! # Status classification
//!
//! | Response | Result |
//! |----------|--------|
//! | 2xx | `Metric::Views(sum of items[].views)` |
//! | 429 | `ClientError::RateLimited` (retryable) |
//! | other 4xx | `Metric::NotFound` (recorded as zero views) |
//! | 5xx | `ClientError::Server` (retryable) |
//! | timeout / connect | `ClientError::Timeout` / `Connect` (retryable) |

use crate::client::{ClientError, ClientResult};
use crate::config::SourceConfig;
use crate::state::MetricRange;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// A definitive answer from the metrics API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Views summed across every sub-period returned
    Views(u64),
    /// The API has no data for this identifier (client-error class status)
    NotFound { status: u16 },
}

impl Metric {
    /// Value to record: absence of data counts as zero views
    pub fn value(&self) -> u64 {
        match self {
            Self::Views(views) => *views,
            Self::NotFound { .. } => 0,
        }
    }
}

/// Source of per-entry aggregate metrics
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetches the aggregate metric for `slug` over `range`
    ///
    /// Not-found and client-error responses are `Ok(Metric::NotFound)`;
    /// only transient or unexpected failures are `Err`.
    async fn fetch_metric(&self, slug: &str, range: &MetricRange) -> ClientResult<Metric>;
}

#[derive(Debug, Deserialize)]
struct PageviewsResponse {
    #[serde(default)]
    items: Vec<PageviewsItem>,
}

#[derive(Debug, Deserialize)]
struct PageviewsItem {
    views: u64,
}

/// `MetricsSource` backed by the Wikimedia per-article pageviews endpoint
#[derive(Debug, Clone)]
pub struct PageviewsClient {
    client: Client,
    base_url: String,
    project: String,
    access: String,
    agent: String,
    granularity: String,
}

impl PageviewsClient {
    pub fn new(client: Client, source: &SourceConfig) -> Self {
        Self {
            client,
            base_url: source.metrics_api_url.trim_end_matches('/').to_string(),
            project: source.project.clone(),
            access: source.access.clone(),
            agent: source.agent.clone(),
            granularity: source.granularity.clone(),
        }
    }

    /// Builds the per-article endpoint URL
    ///
    /// Article URLs are already percent-encoded except for `/`, which the
    /// endpoint needs as `%2F` to keep the slug a single path segment.
    pub fn endpoint(&self, slug: &str, range: &MetricRange) -> String {
        format!(
            "{}/metrics/pageviews/per-article/{}/{}/{}/{}/{}/{}/{}",
            self.base_url,
            self.project,
            self.access,
            self.agent,
            slug.replace('/', "%2F"),
            self.granularity,
            range.start_compact(),
            range.end_compact()
        )
    }
}

#[async_trait]
impl MetricsSource for PageviewsClient {
    async fn fetch_metric(&self, slug: &str, range: &MetricRange) -> ClientResult<Metric> {
        let url = self.endpoint(slug, range);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&url, e))?;

        let status = response.status();
        if status.is_success() {
            let body: PageviewsResponse =
                response.json().await.map_err(|e| ClientError::Decode {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            let views = body
                .items
                .iter()
                .fold(0u64, |total, item| total.saturating_add(item.views));
            return Ok(Metric::Views(views));
        }

        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            tracing::debug!("No pageviews for {} (HTTP {})", slug, status.as_u16());
            return Ok(Metric::NotFound {
                status: status.as_u16(),
            });
        }

        Err(ClientError::from_status(&url, status))
    }
}
