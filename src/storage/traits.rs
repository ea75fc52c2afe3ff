//! Checkpoint store trait and error types

use crate::state::{CrawlState, RunId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint exists but cannot be trusted. Never recovered from.
    #[error("Corrupt checkpoint {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Checkpoint {path} belongs to run {found}, expected {expected}")]
    RunMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl CheckpointError {
    /// Returns true if the stored data itself is unusable
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::RunMismatch { .. })
    }
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Durable persistence of the whole crawl state, one checkpoint per run
///
/// Implementations must make `save` atomic: after a crash, `load` returns
/// either the previous checkpoint or the new one, never a mix.
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint for `run_id`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(state))` - A valid checkpoint was found
    /// * `Ok(None)` - No checkpoint exists yet for this run
    /// * `Err(CheckpointError)` - The checkpoint exists but is unreadable
    fn load(&self, run_id: &RunId) -> CheckpointResult<Option<CrawlState>>;

    /// Replaces the checkpoint for `run_id` with `state`
    fn save(&self, run_id: &RunId, state: &CrawlState) -> CheckpointResult<()>;

    /// Where the checkpoint for `run_id` lives
    fn path_for(&self, run_id: &RunId) -> PathBuf;
}
