use crate::config::types::Config;
use crate::config::validation::{validate, validate_run_config};
use crate::state::{MetricRange, RunParams};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use obit_crawl::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("First year: {}", config.run.start_year);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at start-up so two runs can be told apart even when they share a
/// run identifier.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Overrides the configured year range (from the command line)
///
/// The result is re-validated so an inverted range is rejected.
pub fn apply_year_overrides(
    config: &mut Config,
    start_year: Option<i32>,
    stop_year: Option<i32>,
) -> Result<(), ConfigError> {
    if let Some(start) = start_year {
        config.run.start_year = start;
    }
    if let Some(stop) = stop_year {
        config.run.stop_year = stop;
    }
    validate_run_config(&config.run)
}

impl Config {
    /// Builds the immutable run parameters from the `[run]` section
    pub fn run_params(&self) -> Result<RunParams, ConfigError> {
        let range = MetricRange::parse(&self.run.metric_range_start, &self.run.metric_range_end)
            .map_err(|e| ConfigError::InvalidDate(e.to_string()))?;
        Ok(RunParams::new(self.run.start_year, self.run.stop_year, range))
    }
}
