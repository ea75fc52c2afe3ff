use serde::Deserialize;

/// Main configuration structure for Obit-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Parameters that identify a run
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// First year to crawl
    #[serde(rename = "start-year")]
    pub start_year: i32,

    /// Last year to crawl (inclusive)
    #[serde(rename = "stop-year")]
    pub stop_year: i32,

    /// Start of the metric date range, `YYYYMMDD`
    #[serde(rename = "metric-range-start")]
    pub metric_range_start: String,

    /// End of the metric date range, `YYYYMMDD`
    #[serde(rename = "metric-range-end")]
    pub metric_range_end: String,
}

/// What to do with an entry whose fetch still fails after every retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustedPolicy {
    /// Log and leave the entry unrecorded so the next run retries it
    Skip,
    /// Record zero views (requires a resolved slug)
    Zero,
    /// End the run
    Abort,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Title of the category whose members are the yearly categories
    #[serde(rename = "root-category", default = "default_root_category")]
    pub root_category: String,

    /// Title of a yearly category, `{year}` is substituted
    #[serde(
        rename = "year-category-template",
        default = "default_year_category_template"
    )]
    pub year_category_template: String,

    /// Entry names starting with any of these are structural, not people
    #[serde(rename = "excluded-prefixes", default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,

    /// Persist state after this many newly recorded entries
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Maximum number of entries resolved and fetched at once
    #[serde(
        rename = "max-concurrent-fetches",
        default = "default_max_concurrent_fetches"
    )]
    pub max_concurrent_fetches: usize,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for retryable upstream failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(rename = "retry-max-delay-ms", default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    #[serde(rename = "on-retries-exhausted", default = "default_exhausted_policy")]
    pub on_retries_exhausted: ExhaustedPolicy,

    /// Upper bound on the final checkpoint write after an interrupt
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl CrawlerConfig {
    /// Title of the category listing the members of `year`
    pub fn year_category(&self, year: i32) -> String {
        self.year_category_template
            .replace("{year}", &year.to_string())
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            root_category: default_root_category(),
            year_category_template: default_year_category_template(),
            excluded_prefixes: default_excluded_prefixes(),
            checkpoint_interval: default_checkpoint_interval(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            on_retries_exhausted: default_exhausted_policy(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Upstream endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// MediaWiki action API endpoint
    #[serde(rename = "wiki-api-url", default = "default_wiki_api_url")]
    pub wiki_api_url: String,

    /// Prefix removed from a page's full URL to obtain its slug
    #[serde(rename = "article-url-prefix", default = "default_article_url_prefix")]
    pub article_url_prefix: String,

    /// Wikimedia REST API base
    #[serde(rename = "metrics-api-url", default = "default_metrics_api_url")]
    pub metrics_api_url: String,

    #[serde(default = "default_project")]
    pub project: String,

    #[serde(default = "default_access")]
    pub access: String,

    #[serde(default = "default_agent")]
    pub agent: String,

    #[serde(default = "default_granularity")]
    pub granularity: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            wiki_api_url: default_wiki_api_url(),
            article_url_prefix: default_article_url_prefix(),
            metrics_api_url: default_metrics_api_url(),
            project: default_project(),
            access: default_access(),
            agent: default_agent(),
            granularity: default_granularity(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one checkpoint database per run identifier
    #[serde(rename = "checkpoint-dir", default = "default_dir")]
    pub checkpoint_dir: String,

    /// Directory for the per-run log file
    #[serde(rename = "log-dir", default = "default_dir")]
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: default_dir(),
            log_dir: default_dir(),
        }
    }
}

fn default_root_category() -> String {
    "Category:Deaths by year".to_string()
}

fn default_year_category_template() -> String {
    "Category:{year} deaths".to_string()
}

fn default_excluded_prefixes() -> Vec<String> {
    vec![
        "Category:".to_string(),
        "Deaths in".to_string(),
        "List of".to_string(),
    ]
}

fn default_checkpoint_interval() -> usize {
    100
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    10_000
}

fn default_exhausted_policy() -> ExhaustedPolicy {
    ExhaustedPolicy::Skip
}

fn default_shutdown_grace() -> u64 {
    10
}

fn default_wiki_api_url() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}

fn default_article_url_prefix() -> String {
    "https://en.wikipedia.org/wiki/".to_string()
}

fn default_metrics_api_url() -> String {
    "https://wikimedia.org/api/rest_v1".to_string()
}

fn default_project() -> String {
    "en.wikipedia.org".to_string()
}

fn default_access() -> String {
    "all-access".to_string()
}

fn default_agent() -> String {
    "all-agents".to_string()
}

fn default_granularity() -> String {
    "monthly".to_string()
}

fn default_dir() -> String {
    ".".to_string()
}
