//! Feedline: an incremental news feed collector
//!
//! This crate harvests entries from syndication feeds, extracts article text,
//! deduplicates against earlier observations and persists the results for
//! downstream processing. Collection is watermark-based, rate limited per
//! domain and resilient to failing third-party sources.

pub mod collector;
pub mod config;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use collector::{FailureKind, FetchError};
use thiserror::Error;

/// Main error type for Feedline operations
#[derive(Debug, Error)]
pub enum FeedlineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed feed at {url}: {message}")]
    MalformedFeed { url: String, message: String },

    #[error("Feed collection for {url} timed out after {seconds}s")]
    FeedTimeout { url: String, seconds: u64 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid stage transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CollectionStage,
        to: state::CollectionStage,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FeedlineError {
    /// Classifies this error for source bookkeeping and alerting
    ///
    /// Timeouts, network failures and retryable HTTP statuses are transient;
    /// everything else (malformed documents, 4xx responses, storage faults)
    /// will not resolve by simply trying again.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Fetch(e) => e.failure_kind(),
            Self::FeedTimeout { .. } => FailureKind::Transient,
            _ => FailureKind::Terminal,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Feedline operations
pub type Result<T> = std::result::Result<T, FeedlineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use collector::{CollectionResult, Collector};
pub use config::{Config, ConfigStore, FeedConfig};
pub use state::{CollectionStage, ItemStatus};
pub use url::{domain_key, normalize_url};
