//! Statistics generation from a crawl checkpoint
//!
//! This module provides functionality for extracting and displaying
//! per-year statistics from a loaded [`CrawlState`].

use crate::state::CrawlState;
use std::collections::BTreeMap;

/// Counts for a single year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearStatistics {
    pub year: i32,

    /// Number of recorded entries
    pub entries: usize,

    /// Entries recorded with zero views
    pub zero_views: usize,

    /// Sum of all recorded views
    pub total_views: u64,
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Whether the root category snapshot has been fetched
    pub has_root_category: bool,

    /// Per-year counts, ascending by year
    pub years: Vec<YearStatistics>,

    pub total_entries: usize,
    pub zero_views: usize,
    pub total_views: u64,

    /// Names recorded under more than one year
    pub duplicates: BTreeMap<String, Vec<i32>>,
}

/// Computes statistics from a crawl state
pub fn compute_statistics(state: &CrawlState) -> CrawlStatistics {
    let years: Vec<YearStatistics> = state
        .years()
        .map(|(year, record)| {
            let mut stats = YearStatistics {
                year,
                entries: record.len(),
                zero_views: 0,
                total_views: 0,
            };
            for (_, result) in record.iter() {
                if result.views == 0 {
                    stats.zero_views += 1;
                }
                stats.total_views = stats.total_views.saturating_add(result.views);
            }
            stats
        })
        .collect();

    CrawlStatistics {
        has_root_category: state.root_category.is_some(),
        total_entries: years.iter().map(|y| y.entries).sum(),
        zero_views: years.iter().map(|y| y.zero_views).sum(),
        total_views: years
            .iter()
            .fold(0u64, |acc, y| acc.saturating_add(y.total_views)),
        duplicates: state.duplicate_names(),
        years,
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!(
        "  Root category fetched: {}",
        if stats.has_root_category { "yes" } else { "no" }
    );
    println!("  Years with entries: {}", stats.years.len());
    println!("  Total entries: {}", stats.total_entries);
    println!("  Total page views: {}", stats.total_views);
    let percentage = if stats.total_entries > 0 {
        (stats.zero_views as f64 / stats.total_entries as f64) * 100.0
    } else {
        0.0
    };
    println!("  Zero-view entries: {} ({:.1}%)", stats.zero_views, percentage);
    println!();

    if !stats.years.is_empty() {
        println!("Entries by Year:");
        for year in &stats.years {
            println!(
                "  {}: {} entries, {} with zero views, {} views",
                year.year, year.entries, year.zero_views, year.total_views
            );
        }
        println!();
    }

    if !stats.duplicates.is_empty() {
        println!("Names in More Than One Year ({}):", stats.duplicates.len());
        for (name, years) in &stats.duplicates {
            let years: Vec<String> = years.iter().map(|y| y.to_string()).collect();
            println!("  {}: {}", name, years.join(", "));
        }
        println!();
    }
}
