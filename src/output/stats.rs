//! Statistics generation from the collection database
//!
//! This module provides functionality for extracting and displaying
//! collection statistics from the storage layer.

use crate::state::ItemStatus;
use crate::storage::{SourceRecord, Storage};
use crate::FeedlineError;
use std::collections::HashMap;

/// Per-source line of the statistics report
#[derive(Debug, Clone)]
pub struct SourceStatistics {
    pub source: SourceRecord,

    /// Items collected for this source so far
    pub items: u64,
}

impl SourceStatistics {
    /// Returns true if the source's last collection attempt failed
    pub fn is_failing(&self) -> bool {
        self.source.error_count > 0
    }
}

/// Collection statistics summary
#[derive(Debug, Clone)]
pub struct CollectionStatistics {
    /// Total number of raw items stored
    pub total_items: u64,

    /// Count of items by processing status
    pub items_by_status: HashMap<ItemStatus, u64>,

    /// Every known source, ordered by name
    pub sources: Vec<SourceStatistics>,
}

impl CollectionStatistics {
    /// Sources whose most recent collection failed
    pub fn failing_sources(&self) -> impl Iterator<Item = &SourceStatistics> {
        self.sources.iter().filter(|s| s.is_failing())
    }

    /// Sources that have never been collected successfully
    pub fn never_collected(&self) -> impl Iterator<Item = &SourceStatistics> {
        self.sources
            .iter()
            .filter(|s| s.source.ingestion_window_end_at.is_none())
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CollectionStatistics)` - Successfully loaded statistics
/// * `Err(FeedlineError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CollectionStatistics, FeedlineError> {
    let total_items = storage.count_raw_items()?;

    let mut items_by_status = HashMap::new();
    for status in ItemStatus::all() {
        let count = storage.count_raw_items_by_status(status)?;
        if count > 0 {
            items_by_status.insert(status, count);
        }
    }

    let mut sources = Vec::new();
    for source in storage.list_sources()? {
        let items = storage.count_raw_items_for_source(source.id)?;
        sources.push(SourceStatistics { source, items });
    }

    Ok(CollectionStatistics {
        total_items,
        items_by_status,
        sources,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CollectionStatistics) {
    println!("=== Collection Statistics ===\n");

    println!("Overview:");
    println!("  Sources: {}", stats.sources.len());
    println!("  Items stored: {}", stats.total_items);
    println!();

    println!("Items by Status:");
    for status in ItemStatus::all() {
        let count = stats.items_by_status.get(&status).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        let percentage = if stats.total_items > 0 {
            (count as f64 / stats.total_items as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Sources:");
    for entry in &stats.sources {
        let watermark = entry
            .source
            .ingestion_window_end_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  - {} [{}] items: {}, covered until: {}{}",
            entry.source.name,
            entry.source.url,
            entry.items,
            watermark,
            if entry.source.is_active { "" } else { " (inactive)" }
        );
    }
    println!();

    let failing: Vec<_> = stats.failing_sources().collect();
    if !failing.is_empty() {
        println!("Failing Sources ({}):", failing.len());
        for entry in failing {
            println!(
                "  - {}: {} consecutive failures, last error: {}",
                entry.source.name,
                entry.source.error_count,
                entry.source.last_error.as_deref().unwrap_or("-")
            );
        }
        println!();
    }

    let never = stats.never_collected().count();
    if never > 0 {
        println!("Sources never collected successfully: {}", never);
    }
}
