//! Collector module for feed harvesting
//!
//! This module contains the core collection pipeline, including:
//! - Per-domain request pacing
//! - HTTP fetching with retry, backoff and failure classification
//! - Feed parsing into typed entries
//! - Article text extraction
//! - Watermark windows and coverage metrics
//! - The per-feed orchestration state machine

mod extractor;
mod feed;
mod fetcher;
mod orchestrator;
mod rate_limiter;
mod result;
mod window;

pub use extractor::{extract, html_to_text, normalize_whitespace};
pub use feed::{parse_feed, FeedEntry, ParsedFeed};
pub use fetcher::{
    backoff_delay, build_http_client, is_retryable_status, parse_retry_after, FetchError, Fetched,
    Fetcher, Sleeper, TokioSleeper,
};
pub use orchestrator::{
    content_hash, entry_url, fallback_content, Collector, EntryOutcome, SkipReason,
};
pub use rate_limiter::DomainRateLimiter;
pub use result::{CollectionResult, FailureKind};
pub use window::{advance_watermark, Coverage, ObservedRange, WindowPlan};
