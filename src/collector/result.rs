//! Per-feed collection report and failure classification

use crate::collector::window::Coverage;
use crate::FeedlineError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Whether a failure is worth retrying later without intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Timeouts, network errors, 429 and 5xx responses
    Transient,

    /// Everything else: malformed documents, other 4xx, storage faults
    Terminal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Terminal => "terminal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of collecting one feed
#[derive(Debug, Clone)]
pub struct CollectionResult {
    /// Configured feed name
    pub feed_name: String,

    /// Source row id, once resolved
    pub source_id: Option<i64>,

    /// Entries considered (bounded by the per-feed cap)
    pub items_fetched: usize,

    /// New items persisted
    pub items_stored: usize,

    /// Entries without link or content, duplicates and insert conflicts
    pub items_skipped: usize,

    /// Feed-level and per-entry error messages
    pub errors: Vec<String>,

    pub transient_errors: usize,
    pub terminal_errors: usize,

    /// Set when the feed run as a whole failed
    pub failure: Option<FailureKind>,

    pub expected_start: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub gap_seconds: i64,
    pub overlap_seconds: i64,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl CollectionResult {
    pub fn new(feed_name: impl Into<String>) -> Self {
        Self {
            feed_name: feed_name.into(),
            source_id: None,
            items_fetched: 0,
            items_stored: 0,
            items_skipped: 0,
            errors: Vec::new(),
            transient_errors: 0,
            terminal_errors: 0,
            failure: None,
            expected_start: None,
            actual_start: None,
            window_end: None,
            gap_seconds: 0,
            overlap_seconds: 0,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the feed run completed without a feed-level failure
    ///
    /// Per-entry errors do not make a run unsuccessful.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Records a feed-level failure with its classification tag
    pub fn record_failure(&mut self, error: &FeedlineError) -> FailureKind {
        let kind = error.failure_kind();
        match kind {
            FailureKind::Transient => self.transient_errors += 1,
            FailureKind::Terminal => self.terminal_errors += 1,
        }
        self.errors.push(format!("[{}] {}", kind, error));
        self.failure = Some(kind);
        kind
    }

    /// Records an error confined to one entry
    pub fn record_entry_error(&mut self, entry_url: &str, error: &FeedlineError) {
        self.errors.push(format!("{}: {}", entry_url, error));
    }

    /// Copies window bounds and coverage metrics into the report
    pub fn apply_coverage(&mut self, coverage: &Coverage) {
        self.expected_start = Some(coverage.expected_start);
        self.actual_start = Some(coverage.actual_start);
        self.window_end = Some(coverage.window_end);
        self.gap_seconds = coverage.gap_seconds;
        self.overlap_seconds = coverage.overlap_seconds;
    }
}
