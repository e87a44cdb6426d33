//! Storage module for persisting collected data
//!
//! This module handles all database operations for the collector, including:
//! - SQLite database initialization and schema management
//! - Source upserts and collection bookkeeping (watermark, error state)
//! - Idempotent raw item inserts
//! - The deduplication gate over recently collected items

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DedupGate, Storage, StorageError, StorageResult};

use crate::config::{FeedConfig, Settings};
use crate::state::ItemStatus;
use crate::FeedlineError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Source type recorded for syndication feeds
pub const SOURCE_TYPE_RSS: &str = "rss";

/// Maximum stored length of `sources.last_error`, in characters
pub const MAX_ERROR_LEN: usize = 1000;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, FeedlineError> {
    SqliteStorage::new(path)
}

/// Attributes used to create or refresh a source
#[derive(Debug, Clone)]
pub struct NewSource {
    pub source_type: String,
    pub name: String,
    pub url: String,
    pub credibility_score: f64,
    pub source_tier: Option<String>,
    pub reporting_type: Option<String>,
    pub config: serde_json::Value,
    pub is_active: bool,
}

impl NewSource {
    /// Builds the source attributes for a configured feed
    pub fn from_feed(feed: &FeedConfig, settings: &Settings) -> Self {
        Self {
            source_type: SOURCE_TYPE_RSS.to_string(),
            name: feed.name.clone(),
            url: feed.url.clone(),
            credibility_score: feed.credibility,
            source_tier: feed.tier.clone(),
            reporting_type: feed.reporting_type.clone(),
            config: feed.source_config(settings),
            is_active: feed.enabled,
        }
    }
}

/// Represents a source in the database
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: i64,
    pub source_type: String,
    pub name: String,
    pub url: String,
    pub credibility_score: f64,
    pub source_tier: Option<String>,
    pub reporting_type: Option<String>,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// End of the last successfully covered interval; `None` until the
    /// first successful collection
    pub ingestion_window_end_at: Option<DateTime<Utc>>,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A raw item about to be inserted
#[derive(Debug, Clone)]
pub struct NewRawItem {
    pub source_id: i64,
    pub external_id: String,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub raw_content: String,
    pub content_hash: String,
    pub language: Option<String>,
    pub processing_status: ItemStatus,
}

/// Represents a raw item in the database
#[derive(Debug, Clone)]
pub struct RawItemRecord {
    pub id: i64,
    pub source_id: i64,
    pub external_id: String,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub raw_content: String,
    pub content_hash: String,
    pub language: Option<String>,
    pub processing_status: ItemStatus,
    pub error_message: Option<String>,
}

/// Which identity matched during a duplicate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateMatch {
    ExternalId,
    Url,
    ContentHash,
}

/// Answer from the deduplication gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub matched_on: Option<DuplicateMatch>,
    pub item_id: Option<i64>,
}

impl DuplicateCheck {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            matched_on: None,
            item_id: None,
        }
    }

    pub fn duplicate(item_id: i64, matched_on: DuplicateMatch) -> Self {
        Self {
            is_duplicate: true,
            matched_on: Some(matched_on),
            item_id: Some(item_id),
        }
    }
}

/// Formats a timestamp the way every timestamp column stores it
///
/// Fixed precision keeps lexicographic and chronological order identical.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp column
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Truncates an error message to [`MAX_ERROR_LEN`] characters
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
