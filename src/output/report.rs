//! Per-batch collection report

use crate::collector::{CollectionResult, FailureKind};

/// Totals across every feed of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub feeds: usize,
    pub succeeded: usize,
    pub transient_failures: usize,
    pub terminal_failures: usize,
    pub items_fetched: usize,
    pub items_stored: usize,
    pub items_skipped: usize,
    pub entry_errors: usize,
}

impl BatchSummary {
    /// Folds a batch of per-feed results into totals
    pub fn from_results(results: &[CollectionResult]) -> Self {
        let mut summary = Self {
            feeds: results.len(),
            ..Self::default()
        };

        for result in results {
            match result.failure {
                None => summary.succeeded += 1,
                Some(FailureKind::Transient) => summary.transient_failures += 1,
                Some(FailureKind::Terminal) => summary.terminal_failures += 1,
            }
            summary.items_fetched += result.items_fetched;
            summary.items_stored += result.items_stored;
            summary.items_skipped += result.items_skipped;
            // Feed-level failures are counted above, not as entry errors
            let feed_level = usize::from(result.failure.is_some());
            summary.entry_errors += result.errors.len().saturating_sub(feed_level);
        }

        summary
    }
}

/// Prints one line per feed followed by batch totals
pub fn print_results(results: &[CollectionResult]) {
    println!("=== Collection Results ===\n");

    for result in results {
        let status = match result.failure {
            None => "ok".to_string(),
            Some(kind) => format!("failed ({})", kind),
        };
        println!(
            "{} [{}] fetched: {}, stored: {}, skipped: {}, took {:.1}s",
            result.feed_name,
            status,
            result.items_fetched,
            result.items_stored,
            result.items_skipped,
            result.duration.as_secs_f64()
        );

        if let (Some(start), Some(end)) = (result.actual_start, result.window_end) {
            println!(
                "  window: {} .. {} (gap {}s, overlap {}s)",
                start.to_rfc3339(),
                end.to_rfc3339(),
                result.gap_seconds,
                result.overlap_seconds
            );
        }

        for error in &result.errors {
            println!("  ! {}", error);
        }
    }

    let summary = BatchSummary::from_results(results);
    println!();
    println!(
        "Feeds: {} ({} ok, {} transient failures, {} terminal failures)",
        summary.feeds, summary.succeeded, summary.transient_failures, summary.terminal_failures
    );
    println!(
        "Items: {} fetched, {} stored, {} skipped, {} entry errors",
        summary.items_fetched, summary.items_stored, summary.items_skipped, summary.entry_errors
    );
}
