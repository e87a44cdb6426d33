//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Feedline database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Configured feeds and their collection bookkeeping
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_type TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    credibility_score REAL NOT NULL DEFAULT 0.5,
    source_tier TEXT,
    reporting_type TEXT,
    config TEXT NOT NULL DEFAULT '{}',
    is_active INTEGER NOT NULL DEFAULT 1,
    last_fetched_at TEXT,
    ingestion_window_end_at TEXT,
    error_count INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(source_type, url)
);

-- Collected entries awaiting downstream processing
CREATE TABLE IF NOT EXISTS raw_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    external_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT,
    author TEXT,
    published_at TEXT,
    fetched_at TEXT NOT NULL,
    raw_content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    language TEXT,
    processing_status TEXT NOT NULL DEFAULT 'pending',
    error_message TEXT,
    UNIQUE(source_id, external_id)
);

CREATE INDEX IF NOT EXISTS idx_raw_items_url ON raw_items(url);
CREATE INDEX IF NOT EXISTS idx_raw_items_external_id ON raw_items(external_id);
CREATE INDEX IF NOT EXISTS idx_raw_items_content_hash ON raw_items(content_hash);
CREATE INDEX IF NOT EXISTS idx_raw_items_fetched_at ON raw_items(fetched_at);
CREATE INDEX IF NOT EXISTS idx_raw_items_status ON raw_items(processing_status);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
