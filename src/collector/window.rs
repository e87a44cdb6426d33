//! Watermark-based collection windows
//!
//! A source's watermark (`ingestion_window_end_at`) marks the end of the last
//! successfully covered interval. Each run derives the interval it should
//! cover from it, and after the run reports how the interval it actually
//! covered compares:
//!
//! - **gap**: the observed window started after the expected boundary, so
//!   some time went uncollected
//! - **overlap**: the observed window started before the expected boundary,
//!   so some time was collected twice (harmless)

use chrono::{DateTime, Duration, Utc};

/// Window a run intends to cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    /// Where coverage should resume: the watermark, or the lookback start on
    /// a source's first run
    pub expected_start: DateTime<Utc>,

    /// Where this run starts, including the overlap margin
    pub actual_start: DateTime<Utc>,
}

/// Published-timestamp range seen among a run's entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedRange {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl ObservedRange {
    pub fn record(&mut self, timestamp: DateTime<Utc>) {
        self.earliest = Some(self.earliest.map_or(timestamp, |t| t.min(timestamp)));
        self.latest = Some(self.latest.map_or(timestamp, |t| t.max(timestamp)));
    }

    pub fn is_empty(&self) -> bool {
        self.earliest.is_none()
    }
}

/// Coverage achieved by a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub expected_start: DateTime<Utc>,
    pub actual_start: DateTime<Utc>,

    /// Latest published timestamp seen, or the run time when none was
    pub observed_end: DateTime<Utc>,

    /// End of the covered window; the watermark advances to this
    pub window_end: DateTime<Utc>,

    pub gap_seconds: i64,
    pub overlap_seconds: i64,
}

impl WindowPlan {
    /// Computes the window for a run starting at `now`
    ///
    /// # Arguments
    ///
    /// * `watermark` - The source's persisted window end, `None` if it was
    ///   never collected successfully
    /// * `now` - The run's start time
    /// * `lookback_hours` - First-run reach, clamped to at least one hour
    /// * `overlap_seconds` - Safety margin before the watermark, clamped to
    ///   be non-negative
    pub fn compute(
        watermark: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        lookback_hours: i64,
        overlap_seconds: i64,
    ) -> Self {
        match watermark {
            None => {
                let start = reach_back(now, Duration::try_hours(lookback_hours.max(1)));
                Self {
                    expected_start: start,
                    actual_start: start,
                }
            }
            Some(expected_start) => Self {
                expected_start,
                actual_start: reach_back(
                    expected_start,
                    Duration::try_seconds(overlap_seconds.max(0)),
                ),
            },
        }
    }

    /// Derives coverage from the timestamps a run actually observed
    ///
    /// The covered window starts at the earliest observed timestamp (or the
    /// planned start when nothing carried a timestamp) and ends at `now`.
    pub fn observe(&self, observed: &ObservedRange, now: DateTime<Utc>) -> Coverage {
        let actual_start = observed.earliest.unwrap_or(self.actual_start);
        let delta = (actual_start - self.expected_start).num_seconds();

        Coverage {
            expected_start: self.expected_start,
            actual_start,
            observed_end: observed.latest.unwrap_or(now),
            window_end: now,
            gap_seconds: delta.max(0),
            overlap_seconds: (-delta).max(0),
        }
    }
}

/// `at - delta`, pinned to the earliest representable instant when the
/// delta or the result is out of range
fn reach_back(at: DateTime<Utc>, delta: Option<Duration>) -> DateTime<Utc> {
    delta
        .and_then(|d| at.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Returns the watermark after a successful run; it never moves backwards
pub fn advance_watermark(
    previous: Option<DateTime<Utc>>,
    window_end: DateTime<Utc>,
) -> DateTime<Utc> {
    match previous {
        Some(previous) if previous > window_end => previous,
        _ => window_end,
    }
}
