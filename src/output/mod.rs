//! Output module for collection reports
//!
//! This module handles:
//! - Printing per-feed results after a collection batch
//! - Loading and printing database statistics

mod report;
pub mod stats;

pub use report::{print_results, BatchSummary};
pub use stats::{load_statistics, print_statistics, CollectionStatistics, SourceStatistics};
