use crate::config::types::{Config, CrawlerConfig, OutputConfig, RunConfig, SourceConfig, UserAgentConfig};
use crate::state::MetricRange;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_config(&config.run)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_source_config(&config.source)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates run parameters
pub(crate) fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.start_year > config.stop_year {
        return Err(ConfigError::Validation(format!(
            "start-year ({}) must not be after stop-year ({})",
            config.start_year, config.stop_year
        )));
    }

    let range = MetricRange::parse(&config.metric_range_start, &config.metric_range_end)
        .map_err(|e| {
            ConfigError::InvalidDate(format!(
                "metric range '{}'..'{}' must be YYYYMMDD: {}",
                config.metric_range_start, config.metric_range_end, e
            ))
        })?;

    if range.start > range.end {
        return Err(ConfigError::Validation(format!(
            "metric-range-start ({}) must not be after metric-range-end ({})",
            config.metric_range_start, config.metric_range_end
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.root_category.trim().is_empty() {
        return Err(ConfigError::Validation(
            "root-category cannot be empty".to_string(),
        ));
    }

    if !config.year_category_template.contains("{year}") {
        return Err(ConfigError::Validation(format!(
            "year-category-template must contain '{{year}}', got '{}'",
            config.year_category_template
        )));
    }

    if config.excluded_prefixes.iter().any(|p| p.is_empty()) {
        // An empty prefix would exclude every entry
        return Err(ConfigError::Validation(
            "excluded-prefixes cannot contain an empty string".to_string(),
        ));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.request_timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got request={}s connect={}s",
            config.request_timeout_secs, config.connect_timeout_secs
        )));
    }

    if config.retry_base_delay_ms > config.retry_max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry-base-delay-ms ({}) must not exceed retry-max-delay-ms ({})",
            config.retry_base_delay_ms, config.retry_max_delay_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates upstream endpoints
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("wiki-api-url", &config.wiki_api_url),
        ("article-url-prefix", &config.article_url_prefix),
        ("metrics-api-url", &config.metrics_api_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} '{}' must use http or https",
                key, value
            )));
        }
    }

    for (key, value) in [
        ("project", &config.project),
        ("access", &config.access),
        ("agent", &config.agent),
        ("granularity", &config.granularity),
    ] {
        if value.is_empty() || value.contains('/') {
            return Err(ConfigError::Validation(format!(
                "{} must be a single non-empty path segment, got '{}'",
                key, value
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.checkpoint_dir.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-dir cannot be empty".to_string(),
        ));
    }

    if config.log_dir.is_empty() {
        return Err(ConfigError::Validation("log-dir cannot be empty".to_string()));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
