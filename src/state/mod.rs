//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the persisted aggregate of completed entries per year
//! - `CrawlPhase`: the orchestrator's state machine
//! - `RunParams` / `RunId`: the immutable parameters that namespace a run

mod crawl_phase;
mod crawl_state;
mod run_params;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use crawl_state::{CrawlState, EntryResult, EntryRow, YearRecord};
pub use run_params::{MetricRange, RunId, RunParams, COMPACT_DATE_FORMAT};
