//! Crawler module for category walking and metric harvesting
//!
//! This module contains the core crawling logic, including:
//! - Per-entry skip decisions (already recorded, excluded prefixes)
//! - Retry with exponential backoff for upstream calls
//! - A bounded pool of resolve-and-fetch workers
//! - Overall crawl coordination and checkpointing
//! - Graceful shutdown on Ctrl+C

mod coordinator;
mod policy;
mod retry;
mod scheduler;
mod shutdown;

pub use coordinator::{run_crawl, Coordinator, CrawlOutcome, CrawlReport};
pub use policy::{EntryDecision, ExclusionPolicy};
pub use retry::{with_retries, ExponentialBackoff, RetryPolicy};
pub use scheduler::{EntryOutcome, FetchJob, FetchScheduler, FetchWorker, JobResult};
pub use shutdown::{
    is_shutdown_requested, setup_shutdown_handler, shutdown_channel, wait_for_shutdown,
    INTERRUPTED_EXIT_CODE,
};

use crate::config::Config;
use crate::ObitError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the checkpoint for the configured run (unless `fresh`)
/// 2. Fetch the root category if the checkpoint lacks it
/// 3. Walk every year in range, recording one metric per entry
/// 4. Checkpoint periodically and once more at the end
///
/// A Ctrl+C handler is installed; the first press stops the crawl cleanly.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `fresh` - Ignore any existing checkpoint for this run
pub async fn crawl(config: Config, fresh: bool) -> Result<CrawlReport, ObitError> {
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    setup_shutdown_handler(shutdown_tx);
    run_crawl(config, fresh, shutdown_rx).await
}
