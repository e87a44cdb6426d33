//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage and
//! DedupGate traits.

use crate::state::ItemStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DedupGate, Storage, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, parse_timestamp, DuplicateCheck, DuplicateMatch, NewRawItem, NewSource,
    RawItemRecord, SourceRecord,
};
use crate::FeedlineError;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SOURCE_COLUMNS: &str = "id, source_type, name, url, credibility_score, source_tier,
     reporting_type, config, is_active, last_fetched_at, ingestion_window_end_at,
     error_count, last_error, created_at, updated_at";

const RAW_ITEM_COLUMNS: &str = "id, source_id, external_id, url, title, author, published_at,
     fetched_at, raw_content, content_hash, language, processing_status, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(FeedlineError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, FeedlineError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing and dry runs)
    pub fn new_in_memory() -> Result<Self, FeedlineError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Returns true if SQLite rejected a write because of a UNIQUE or PRIMARY KEY
/// constraint
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_timestamp(&value)
        .ok_or_else(|| conversion_error(idx, format!("invalid timestamp: {}", value)))
}

fn optional_timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(idx)?;
    match value {
        Some(v) => parse_timestamp(&v)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("invalid timestamp: {}", v))),
        None => Ok(None),
    }
}

fn source_from_row(row: &Row) -> rusqlite::Result<SourceRecord> {
    let config_text: String = row.get(7)?;
    let config = serde_json::from_str(&config_text)
        .map_err(|e| conversion_error(7, format!("invalid source config: {}", e)))?;

    Ok(SourceRecord {
        id: row.get(0)?,
        source_type: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        credibility_score: row.get(4)?,
        source_tier: row.get(5)?,
        reporting_type: row.get(6)?,
        config,
        is_active: row.get(8)?,
        last_fetched_at: optional_timestamp_column(row, 9)?,
        ingestion_window_end_at: optional_timestamp_column(row, 10)?,
        error_count: row.get(11)?,
        last_error: row.get(12)?,
        created_at: timestamp_column(row, 13)?,
        updated_at: timestamp_column(row, 14)?,
    })
}

fn raw_item_from_row(row: &Row) -> rusqlite::Result<RawItemRecord> {
    let status: String = row.get(11)?;
    let processing_status = ItemStatus::from_db_string(&status)
        .ok_or_else(|| conversion_error(11, format!("unknown processing status: {}", status)))?;

    Ok(RawItemRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        external_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        author: row.get(5)?,
        published_at: optional_timestamp_column(row, 6)?,
        fetched_at: timestamp_column(row, 7)?,
        raw_content: row.get(8)?,
        content_hash: row.get(9)?,
        language: row.get(10)?,
        processing_status,
        error_message: row.get(12)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Source Management =====

    fn upsert_source(&mut self, source: &NewSource) -> StorageResult<SourceRecord> {
        let now = format_timestamp(&Utc::now());
        let config = serde_json::to_string(&source.config)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO sources (source_type, name, url, credibility_score, source_tier,
             reporting_type, config, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(source_type, url) DO UPDATE SET
                name = excluded.name,
                credibility_score = excluded.credibility_score,
                source_tier = excluded.source_tier,
                reporting_type = excluded.reporting_type,
                config = excluded.config,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
            params![
                source.source_type,
                source.name,
                source.url,
                source.credibility_score,
                source.source_tier,
                source.reporting_type,
                config,
                source.is_active,
                now,
            ],
        )?;

        self.get_source_by_url(&source.source_type, &source.url)?
            .ok_or_else(|| StorageError::SourceNotFound(source.url.clone()))
    }

    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord> {
        let sql = format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS);
        self.conn
            .query_row(&sql, params![source_id], source_from_row)
            .optional()?
            .ok_or_else(|| StorageError::SourceNotFound(format!("Source ID {}", source_id)))
    }

    fn get_source_by_url(
        &self,
        source_type: &str,
        url: &str,
    ) -> StorageResult<Option<SourceRecord>> {
        let sql = format!(
            "SELECT {} FROM sources WHERE source_type = ?1 AND url = ?2",
            SOURCE_COLUMNS
        );
        let source = self
            .conn
            .query_row(&sql, params![source_type, url], source_from_row)
            .optional()?;
        Ok(source)
    }

    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>> {
        let sql = format!("SELECT {} FROM sources ORDER BY name, id", SOURCE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn record_collection_success(
        &mut self,
        source_id: i64,
        window_end: DateTime<Utc>,
        fetched_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        // The watermark never moves backwards
        let updated = self.conn.execute(
            "UPDATE sources SET
                ingestion_window_end_at = CASE
                    WHEN ingestion_window_end_at IS NULL OR ingestion_window_end_at < ?1 THEN ?1
                    ELSE ingestion_window_end_at
                END,
                last_fetched_at = ?2,
                error_count = 0,
                last_error = NULL,
                updated_at = ?2
             WHERE id = ?3",
            params![
                format_timestamp(&window_end),
                format_timestamp(&fetched_at),
                source_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::SourceNotFound(format!(
                "Source ID {}",
                source_id
            )));
        }
        Ok(())
    }

    fn record_collection_failure(&mut self, source_id: i64, error: &str) -> StorageResult<()> {
        let now = format_timestamp(&Utc::now());
        let updated = self.conn.execute(
            "UPDATE sources SET error_count = error_count + 1, last_error = ?1, updated_at = ?2
             WHERE id = ?3",
            params![error, now, source_id],
        )?;

        if updated == 0 {
            return Err(StorageError::SourceNotFound(format!(
                "Source ID {}",
                source_id
            )));
        }
        Ok(())
    }

    // ===== Item Management =====

    fn insert_raw_item(&mut self, item: &NewRawItem) -> StorageResult<i64> {
        let sp = self.conn.savepoint()?;

        let result = sp.execute(
            "INSERT INTO raw_items (source_id, external_id, url, title, author, published_at,
             fetched_at, raw_content, content_hash, language, processing_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                item.source_id,
                item.external_id,
                item.url,
                item.title,
                item.author,
                item.published_at.as_ref().map(format_timestamp),
                format_timestamp(&item.fetched_at),
                item.raw_content,
                item.content_hash,
                item.language,
                item.processing_status.to_db_string(),
            ],
        );

        match result {
            Ok(_) => {
                let id = sp.last_insert_rowid();
                sp.commit()?;
                Ok(id)
            }
            // Dropping the savepoint rolls the failed insert back
            Err(e) if is_unique_violation(&e) => Err(StorageError::Conflict(format!(
                "item {} already exists for source {}",
                item.external_id, item.source_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn get_raw_item(&self, item_id: i64) -> StorageResult<RawItemRecord> {
        let sql = format!("SELECT {} FROM raw_items WHERE id = ?1", RAW_ITEM_COLUMNS);
        self.conn
            .query_row(&sql, params![item_id], raw_item_from_row)
            .optional()?
            .ok_or(StorageError::ItemNotFound(item_id))
    }

    fn get_raw_item_by_external_id(
        &self,
        source_id: i64,
        external_id: &str,
    ) -> StorageResult<Option<RawItemRecord>> {
        let sql = format!(
            "SELECT {} FROM raw_items WHERE source_id = ?1 AND external_id = ?2",
            RAW_ITEM_COLUMNS
        );
        let item = self
            .conn
            .query_row(&sql, params![source_id, external_id], raw_item_from_row)
            .optional()?;
        Ok(item)
    }

    // ===== Statistics =====

    fn count_raw_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_raw_items_by_status(&self, status: ItemStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_items WHERE processing_status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_raw_items_for_source(&self, source_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_items WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl DedupGate for SqliteStorage {
    fn find_duplicate(
        &self,
        external_id: &str,
        url: &str,
        content_hash: &str,
        window_days: u32,
    ) -> StorageResult<DuplicateCheck> {
        if window_days == 0 {
            return Ok(DuplicateCheck::unique());
        }

        let cutoff = Utc::now() - Duration::days(i64::from(window_days));
        let found: Option<(i64, String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, external_id, url, content_hash FROM raw_items
                 WHERE (external_id = ?1 OR url = ?2 OR content_hash = ?3)
                   AND fetched_at >= ?4
                 ORDER BY fetched_at DESC
                 LIMIT 1",
                params![external_id, url, content_hash, format_timestamp(&cutoff)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((id, found_external_id, found_url, found_hash)) = found else {
            return Ok(DuplicateCheck::unique());
        };

        let matched_on = if found_external_id == external_id {
            DuplicateMatch::ExternalId
        } else if found_url == url {
            DuplicateMatch::Url
        } else {
            debug_assert_eq!(found_hash, content_hash);
            DuplicateMatch::ContentHash
        };

        Ok(DuplicateCheck::duplicate(id, matched_on))
    }
}
