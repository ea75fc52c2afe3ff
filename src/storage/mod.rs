//! Storage module for persisting crawl checkpoints
//!
//! This module handles durable persistence of the crawl state:
//! - One self-describing SQLite checkpoint per run identifier
//! - Atomic replacement on every save
//! - Corruption detection on load (integrity check, format tag, digest)

mod schema;
mod sqlite;
mod traits;

pub use schema::{FORMAT_TAG, SCHEMA_VERSION};
pub use sqlite::SqliteCheckpointStore;
pub use traits::{CheckpointError, CheckpointResult, CheckpointStore};

use std::path::Path;

/// Opens the checkpoint store for a directory
///
/// # Example
///
/// ```no_run
/// use obit_crawl::storage::{open_store, CheckpointStore};
/// use obit_crawl::RunId;
/// use std::path::Path;
///
/// let store = open_store(Path::new("./state"));
/// let state = store.load(&RunId::from("1950-1950-20200101-20210101")).unwrap();
/// ```
pub fn open_store(dir: &Path) -> SqliteCheckpointStore {
    SqliteCheckpointStore::new(dir)
}
