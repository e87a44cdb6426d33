//! Storage traits and error types
//!
//! This module defines the trait interfaces for storage backends and the
//! deduplication gate, plus their error types.

use crate::state::ItemStatus;
use crate::storage::{DuplicateCheck, NewRawItem, NewSource, RawItemRecord, SourceRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    /// A uniqueness constraint rejected the write; the row already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true if this error reports an already-present row
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines the database operations needed by the collector.
pub trait Storage {
    // ===== Source Management =====

    /// Creates the source or refreshes its configured attributes
    ///
    /// Keyed by `(source_type, url)`. Collection bookkeeping (watermark,
    /// error count, last error) is left untouched on refresh.
    fn upsert_source(&mut self, source: &NewSource) -> StorageResult<SourceRecord>;

    /// Gets a source by ID
    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord>;

    /// Gets a source by its natural key
    fn get_source_by_url(&self, source_type: &str, url: &str)
        -> StorageResult<Option<SourceRecord>>;

    /// Lists all sources ordered by name
    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>>;

    /// Records a successful collection
    ///
    /// Sets the watermark and `last_fetched_at`, and clears the error state.
    fn record_collection_success(
        &mut self,
        source_id: i64,
        window_end: DateTime<Utc>,
        fetched_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Records a failed collection: bumps the error count and stores the
    /// (already truncated) error message. The watermark is not touched.
    fn record_collection_failure(&mut self, source_id: i64, error: &str) -> StorageResult<()>;

    // ===== Item Management =====

    /// Inserts a raw item in its own savepoint
    ///
    /// # Returns
    ///
    /// * `Ok(i64)` - The new item ID
    /// * `Err(StorageError::Conflict)` - An item with the same
    ///   `(source_id, external_id)` already exists
    fn insert_raw_item(&mut self, item: &NewRawItem) -> StorageResult<i64>;

    /// Gets an item by ID
    fn get_raw_item(&self, item_id: i64) -> StorageResult<RawItemRecord>;

    /// Gets an item by its per-source identity
    fn get_raw_item_by_external_id(
        &self,
        source_id: i64,
        external_id: &str,
    ) -> StorageResult<Option<RawItemRecord>>;

    // ===== Statistics =====

    /// Gets total item count
    fn count_raw_items(&self) -> StorageResult<u64>;

    /// Counts items by processing status
    fn count_raw_items_by_status(&self, status: ItemStatus) -> StorageResult<u64>;

    /// Counts items collected for one source
    fn count_raw_items_for_source(&self, source_id: i64) -> StorageResult<u64>;
}

/// Answers whether an item has already been observed
///
/// A "not duplicate" answer may still be followed by a losing insert race;
/// callers handle that through [`StorageError::Conflict`].
pub trait DedupGate {
    /// Looks for an item with the same external id, URL or content hash
    /// fetched within the trailing `window_days`
    fn find_duplicate(
        &self,
        external_id: &str,
        url: &str,
        content_hash: &str,
        window_days: u32,
    ) -> StorageResult<DuplicateCheck>;
}
