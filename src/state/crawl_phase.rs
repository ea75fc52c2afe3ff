/// Crawl phase definitions for tracking orchestrator progress
///
/// This module defines every phase a single crawl invocation moves through.
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Setup Phases =====
    /// Coordinator constructed, nothing loaded yet
    Init,

    /// Reading the checkpoint for this run identifier
    LoadCheckpoint,

    /// Fetching (or reusing) the root category snapshot
    EnsureRootCategory,

    // ===== Working Phases =====
    /// Walking the members of one yearly category
    Crawling { year: i32 },

    /// Writing the final checkpoint
    Finalize,

    // ===== Terminal Phases =====
    /// Every year in range was processed
    Completed,

    /// Operator requested a stop; progress was checkpointed
    Interrupted,

    /// An unrecoverable error ended the run
    Aborted,
}

impl CrawlPhase {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Interrupted | Self::Aborted)
    }

    /// Returns true while entries may still be recorded
    pub fn is_active(&self) -> bool {
        matches!(self, Self::EnsureRootCategory | Self::Crawling { .. })
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Any non-terminal phase may abort or be interrupted. Years only move
    /// forward.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        match (*self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Aborted) => true,
            (_, Interrupted) => true,
            (Init, LoadCheckpoint) => true,
            (LoadCheckpoint, EnsureRootCategory) => true,
            (EnsureRootCategory, Crawling { .. }) => true,
            (EnsureRootCategory, Finalize) => true,
            (Crawling { year: a }, Crawling { year: b }) => b > a,
            (Crawling { .. }, Finalize) => true,
            (Finalize, Completed) => true,
            _ => false,
        }
    }

    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::LoadCheckpoint => "load_checkpoint",
            Self::EnsureRootCategory => "ensure_root_category",
            Self::Crawling { .. } => "crawling",
            Self::Finalize => "finalize",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crawling { year } => write!(f, "crawling({})", year),
            other => write!(f, "{}", other.label()),
        }
    }
}
