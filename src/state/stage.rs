//! Per-feed collection stages
//!
//! A feed run moves through these stages in order. Any stage before the
//! outcome may divert to `RecordingFailure`; both outcomes end in `Done`.

use crate::FeedlineError;
use std::fmt;

/// Stage of a single feed collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionStage {
    LoadingConfig,
    ResolvingSource,
    Windowing,
    FetchingFeed,
    ProcessingEntries,
    Success,
    RecordingFailure,
    Done,
}

impl CollectionStage {
    /// Returns true if the run may move from `self` to `next`
    pub fn can_transition_to(&self, next: CollectionStage) -> bool {
        use CollectionStage::*;

        match (self, next) {
            (LoadingConfig, ResolvingSource)
            | (ResolvingSource, Windowing)
            | (Windowing, FetchingFeed)
            | (FetchingFeed, ProcessingEntries)
            | (ProcessingEntries, Success)
            | (Success, Done)
            | (RecordingFailure, Done) => true,
            (
                LoadingConfig | ResolvingSource | Windowing | FetchingFeed | ProcessingEntries,
                RecordingFailure,
            ) => true,
            _ => false,
        }
    }

    /// Returns true once the run has finished
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadingConfig => "loading-config",
            Self::ResolvingSource => "resolving-source",
            Self::Windowing => "windowing",
            Self::FetchingFeed => "fetching-feed",
            Self::ProcessingEntries => "processing-entries",
            Self::Success => "success",
            Self::RecordingFailure => "recording-failure",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CollectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current stage of one feed run
#[derive(Debug)]
pub struct StageTracker {
    feed: String,
    current: CollectionStage,
}

impl StageTracker {
    pub fn new(feed: impl Into<String>) -> Self {
        Self {
            feed: feed.into(),
            current: CollectionStage::LoadingConfig,
        }
    }

    pub fn current(&self) -> CollectionStage {
        self.current
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow
    pub fn advance(&mut self, next: CollectionStage) -> Result<(), FeedlineError> {
        if !self.current.can_transition_to(next) {
            return Err(FeedlineError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::trace!(feed = %self.feed, from = %self.current, to = %next, "stage transition");
        self.current = next;
        Ok(())
    }
}
