//! Obit-Crawl: a resumable pageview harvester for yearly death categories
//!
//! This crate walks a two-level category hierarchy (a root category of yearly
//! sub-categories, each listing member pages), resolves every member to its
//! canonical article slug, fetches its aggregate pageviews over a fixed date
//! range, and checkpoints progress so an interrupted run resumes where it
//! stopped.

pub mod client;
pub mod config;
pub mod crawler;
pub mod logging;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Obit-Crawl operations
#[derive(Debug, Error)]
pub enum ObitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] storage::CheckpointError),

    #[error("Upstream error: {0}")]
    Client(#[from] client::ClientError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Root category not found: {title}")]
    RootCategoryNotFound { title: String },

    #[error("Category for year {year} not found: {title}")]
    YearNotFound { year: i32, title: String },

    #[error("Giving up on {entry} ({year}) after retries: {source}")]
    RetriesExhausted {
        entry: String,
        year: i32,
        source: client::ClientError,
    },

    #[error("Fetch worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid date in config: {0}")]
    InvalidDate(String),
}

/// Result type alias for Obit-Crawl operations
pub type Result<T> = std::result::Result<T, ObitError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlOutcome, CrawlReport};
pub use state::{CrawlPhase, CrawlState, EntryResult, MetricRange, RunId, RunParams};
