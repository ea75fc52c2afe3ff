//! Per-entry decision policy
//!
//! Applied in order, before any network call:
//! 1. already recorded for this year -> skip
//! 2. name starts with an excluded prefix -> skip
//! 3. otherwise resolve and fetch

use crate::state::CrawlState;

/// What to do with one member of a yearly category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDecision {
    AlreadyDone,
    Excluded { prefix: String },
    Fetch,
}

/// Prefix filter removing structural members (sub-categories, lists)
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    prefixes: Vec<String>,
}

impl ExclusionPolicy {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// The first configured prefix `name` starts with
    pub fn matching_prefix(&self, name: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|prefix| name.starts_with(prefix.as_str()))
            .map(String::as_str)
    }

    pub fn decide(&self, state: &CrawlState, year: i32, name: &str) -> EntryDecision {
        if state.is_complete(year, name) {
            return EntryDecision::AlreadyDone;
        }
        if let Some(prefix) = self.matching_prefix(name) {
            return EntryDecision::Excluded {
                prefix: prefix.to_string(),
            };
        }
        EntryDecision::Fetch
    }
}
