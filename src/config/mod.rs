//! Configuration module for Obit-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use obit_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Checkpoint every {} entries", config.crawler.checkpoint_interval);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExhaustedPolicy, OutputConfig, RunConfig, SourceConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    apply_year_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
};
