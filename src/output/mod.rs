//! Output module for reporting on checkpointed crawl results
//!
//! This module handles:
//! - Per-year statistics computed from a checkpoint
//! - Exporting recorded entries as CSV

mod export;
pub mod stats;

pub use export::{export_csv, write_csv, CSV_HEADER};
pub use stats::{compute_statistics, print_statistics, CrawlStatistics, YearStatistics};
