//! Collection orchestrator - per-feed collection runs
//!
//! This module sequences one feed's run through its stages:
//! - Resolving (upserting) the source row
//! - Computing the collection window from the source's watermark
//! - Fetching and parsing the feed under one overall time budget
//! - Fetching, extracting, deduplicating and storing each entry
//! - Advancing the watermark, or recording the failure on the source

use crate::collector::extractor::{extract, html_to_text, normalize_whitespace};
use crate::collector::feed::{parse_feed, FeedEntry};
use crate::collector::fetcher::{Fetcher, Sleeper};
use crate::collector::rate_limiter::DomainRateLimiter;
use crate::collector::result::CollectionResult;
use crate::collector::window::{advance_watermark, ObservedRange, WindowPlan};
use crate::config::{Config, ConfigStore, FeedConfig};
use crate::state::{CollectionStage, ItemStatus, StageTracker};
use crate::storage::{
    truncate_error, DedupGate, DuplicateMatch, NewRawItem, NewSource, SqliteStorage, Storage,
    StorageResult,
};
use crate::url::normalize_url;
use crate::FeedlineError;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Why an entry was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither link nor id yields a usable URL
    NoLink,

    /// No article text, summary, description, content or title
    NoContent,

    /// The dedup gate has seen it within the trailing window
    Duplicate(Option<DuplicateMatch>),

    /// The insert lost a uniqueness race; the item already exists
    Conflict,
}

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Stored(i64),
    Skipped(SkipReason),
}

/// Main collector structure
///
/// Owns the configuration store, the storage handle and the fetcher (with
/// its per-domain rate limiter). Request pacing and retry counts are fixed
/// when the collector is built; timeouts, the user agent and the feed list
/// follow configuration reloads.
pub struct Collector {
    config: ConfigStore,
    storage: Arc<Mutex<SqliteStorage>>,
    fetcher: Fetcher,
}

impl Collector {
    /// Creates a new collector
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration store
    /// * `storage` - The database the collector writes to
    ///
    /// # Returns
    ///
    /// * `Ok(Collector)` - Ready to collect
    /// * `Err(FeedlineError)` - Invalid pacing settings or HTTP client failure
    pub fn new(config: ConfigStore, storage: SqliteStorage) -> Result<Self, FeedlineError> {
        let current = config.current();
        let limiter = DomainRateLimiter::new(current.collector.requests_per_second)?;
        let fetcher = Fetcher::new(limiter, current.collector.max_retries)?;

        Ok(Self {
            config,
            storage: Arc::new(Mutex::new(storage)),
            fetcher,
        })
    }

    /// Creates a collector over an in-memory configuration
    pub fn from_config(config: Config, storage: SqliteStorage) -> Result<Self, FeedlineError> {
        Self::new(ConfigStore::from_config(config), storage)
    }

    /// Replaces the sleeper used between retry attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.fetcher = self.fetcher.with_sleeper(sleeper);
        self
    }

    /// Snapshot of the active configuration
    pub fn config(&self) -> Arc<Config> {
        self.config.current()
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    /// Shared handle to the storage backend
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    /// Reloads the configuration file if it changed
    ///
    /// On error the previous configuration stays active, so callers may log
    /// the failure and keep collecting.
    pub fn reload_config(&mut self) -> Result<bool, FeedlineError> {
        Ok(self.config.reload_if_changed()?)
    }

    /// Collects every enabled feed
    ///
    /// The configuration is refreshed once up front; a failed reload is
    /// returned (the previous configuration stays active in the store).
    /// Feeds are collected concurrently, bounded by `max-concurrent-feeds`,
    /// and results come back in configuration order. A failing feed never
    /// affects the others.
    pub async fn collect_all(&mut self) -> Result<Vec<CollectionResult>, FeedlineError> {
        self.reload_config()?;
        Ok(self.collect_enabled().await)
    }

    /// Collects every enabled feed of the active configuration, without
    /// checking the file for changes
    pub async fn collect_enabled(&self) -> Vec<CollectionResult> {
        let config = self.config.current();
        let feeds: Vec<&FeedConfig> = config.enabled_feeds().collect();
        let concurrency = config.collector.max_concurrent_feeds.max(1);

        tracing::info!(
            "Collecting {} feeds ({} at a time)",
            feeds.len(),
            concurrency
        );

        let results: Vec<CollectionResult> = stream::iter(feeds)
            .map(|feed| self.run(&config, feed))
            .buffered(concurrency)
            .collect()
            .await;

        let stored: usize = results.iter().map(|r| r.items_stored).sum();
        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            "Batch finished: {} feeds, {} items stored, {} feeds failed",
            results.len(),
            stored,
            failed
        );

        results
    }

    /// Refreshes configuration and collects the feed called `name`
    pub async fn collect_named(&mut self, name: &str) -> Result<CollectionResult, FeedlineError> {
        self.reload_config()?;
        self.collect_by_name(name).await
    }

    /// Collects the feed called `name` from the active configuration
    pub async fn collect_by_name(&self, name: &str) -> Result<CollectionResult, FeedlineError> {
        let config = self.config.current();
        let feed = config
            .find_feed(name)
            .ok_or_else(|| FeedlineError::InvalidArgument(format!("no feed named '{}'", name)))?;

        Ok(self.run(&config, feed).await)
    }

    /// Collects one feed using the active configuration
    ///
    /// Never fails: feed-level failures are recorded on the source and
    /// reported in the returned result.
    pub async fn collect_feed(&self, feed: &FeedConfig) -> CollectionResult {
        let config = self.config.current();
        self.run(&config, feed).await
    }

    async fn run(&self, config: &Config, feed: &FeedConfig) -> CollectionResult {
        let started = Instant::now();
        let mut result = CollectionResult::new(&feed.name);
        let mut tracker = StageTracker::new(&feed.name);

        if let Err(error) = self.run_stages(config, feed, &mut tracker, &mut result).await {
            self.record_failure(feed, &mut tracker, &mut result, error);
        }

        result.duration = started.elapsed();
        tracing::info!(
            "Feed '{}': fetched {}, stored {}, skipped {}, errors {} ({:.2}s)",
            feed.name,
            result.items_fetched,
            result.items_stored,
            result.items_skipped,
            result.errors.len(),
            result.duration.as_secs_f64()
        );
        result
    }

    async fn run_stages(
        &self,
        config: &Config,
        feed: &FeedConfig,
        tracker: &mut StageTracker,
        result: &mut CollectionResult,
    ) -> Result<(), FeedlineError> {
        tracker.advance(CollectionStage::ResolvingSource)?;
        let new_source = NewSource::from_feed(feed, &config.settings);
        let source = self.with_storage(|s| s.upsert_source(&new_source))?;
        result.source_id = Some(source.id);

        tracker.advance(CollectionStage::Windowing)?;
        let now = Utc::now();
        let plan = WindowPlan::compute(
            source.ingestion_window_end_at,
            now,
            config.settings.default_lookback_hours,
            config.collector.overlap_seconds,
        );
        result.expected_start = Some(plan.expected_start);
        result.actual_start = Some(plan.actual_start);

        tracker.advance(CollectionStage::FetchingFeed)?;
        let budget = config.collector.feed_timeout();
        let observed = match tokio::time::timeout(
            budget,
            self.fetch_and_process(config, feed, source.id, tracker, result),
        )
        .await
        {
            Ok(observed) => observed?,
            Err(_) => {
                return Err(FeedlineError::FeedTimeout {
                    url: feed.url.clone(),
                    seconds: budget.as_secs(),
                })
            }
        };

        let coverage = plan.observe(&observed, now);
        let watermark = advance_watermark(source.ingestion_window_end_at, coverage.window_end);
        self.with_storage(|s| s.record_collection_success(source.id, watermark, Utc::now()))?;

        tracker.advance(CollectionStage::Success)?;
        result.apply_coverage(&coverage);
        if coverage.gap_seconds > 0 {
            tracing::warn!(
                "Feed '{}' has a coverage gap of {}s before {}",
                feed.name,
                coverage.gap_seconds,
                coverage.actual_start
            );
        }

        tracker.advance(CollectionStage::Done)?;
        Ok(())
    }

    /// Fetches the feed and processes its entries in order
    ///
    /// Returns the published-timestamp range of the processed entries.
    async fn fetch_and_process(
        &self,
        config: &Config,
        feed: &FeedConfig,
        source_id: i64,
        tracker: &mut StageTracker,
        result: &mut CollectionResult,
    ) -> Result<ObservedRange, FeedlineError> {
        let fetched = self
            .fetcher
            .fetch(
                &feed.url,
                config.settings.request_timeout(),
                &config.settings.user_agent,
            )
            .await?;
        let parsed = parse_feed(&feed.url, &fetched.body)?;

        tracker.advance(CollectionStage::ProcessingEntries)?;
        let cap = feed.effective_max_items(&config.settings);
        let mut observed = ObservedRange::default();

        for entry in parsed.entries.iter().take(cap) {
            result.items_fetched += 1;
            if let Some(ts) = entry.timestamp() {
                observed.record(ts);
            }

            match self.process_entry(config, feed, source_id, entry).await {
                Ok(EntryOutcome::Stored(id)) => {
                    result.items_stored += 1;
                    tracing::debug!("Stored item {} from '{}'", id, feed.name);
                }
                Ok(EntryOutcome::Skipped(reason)) => {
                    result.items_skipped += 1;
                    tracing::debug!(
                        "Skipped entry {} from '{}': {:?}",
                        entry_label(entry),
                        feed.name,
                        reason
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Entry {} from '{}' failed: {}",
                        entry_label(entry),
                        feed.name,
                        e
                    );
                    result.record_entry_error(entry_label(entry), &e);
                }
            }
        }

        Ok(observed)
    }

    /// Fetches, extracts, deduplicates and stores one entry
    pub async fn process_entry(
        &self,
        config: &Config,
        feed: &FeedConfig,
        source_id: i64,
        entry: &FeedEntry,
    ) -> Result<EntryOutcome, FeedlineError> {
        let Some(url) = entry_url(entry) else {
            return Ok(EntryOutcome::Skipped(SkipReason::NoLink));
        };

        let content = match self.fetch_article(config, &url).await {
            Some(text) => text,
            None => match fallback_content(entry) {
                Some(text) => text,
                None => return Ok(EntryOutcome::Skipped(SkipReason::NoContent)),
            },
        };
        let hash = content_hash(&content);

        let window_days = config.collector.dedup_window_days;
        let check = self.with_storage(|s| s.find_duplicate(&url, &url, &hash, window_days))?;
        if check.is_duplicate {
            return Ok(EntryOutcome::Skipped(SkipReason::Duplicate(check.matched_on)));
        }

        let item = NewRawItem {
            source_id,
            external_id: url.clone(),
            url,
            title: entry.title.as_deref().and_then(html_to_text),
            author: entry.author.clone(),
            published_at: entry.timestamp(),
            fetched_at: Utc::now(),
            raw_content: content,
            content_hash: hash,
            language: feed.language.clone().or_else(|| entry.language.clone()),
            processing_status: ItemStatus::Pending,
        };

        match self.with_storage(|s| s.insert_raw_item(&item)) {
            Ok(id) => Ok(EntryOutcome::Stored(id)),
            Err(FeedlineError::StorageError(e)) if e.is_conflict() => {
                Ok(EntryOutcome::Skipped(SkipReason::Conflict))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetches the article page and extracts its text
    ///
    /// Any failure yields `None` so the caller falls back to feed content.
    async fn fetch_article(&self, config: &Config, url: &str) -> Option<String> {
        let fetched = match self
            .fetcher
            .fetch_text(
                url,
                config.settings.request_timeout(),
                &config.settings.user_agent,
            )
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!("Article fetch failed, using feed content: {}", e);
                return None;
            }
        };

        let text = extract(&fetched.body);
        if text.is_none() {
            tracing::debug!("No article text extracted from {}", url);
        }
        text
    }

    fn record_failure(
        &self,
        feed: &FeedConfig,
        tracker: &mut StageTracker,
        result: &mut CollectionResult,
        error: FeedlineError,
    ) {
        let kind = result.record_failure(&error);
        tracing::warn!(
            "Feed '{}' failed during {} ({}): {}",
            feed.name,
            tracker.current(),
            kind,
            error
        );

        if let Err(e) = tracker.advance(CollectionStage::RecordingFailure) {
            tracing::error!("Feed '{}': {}", feed.name, e);
        }

        if let Some(source_id) = result.source_id {
            let message = truncate_error(&error.to_string());
            if let Err(e) = self.with_storage(|s| s.record_collection_failure(source_id, &message))
            {
                tracing::error!(
                    "Could not record failure for feed '{}': {}",
                    feed.name,
                    e
                );
            }
        }

        if let Err(e) = tracker.advance(CollectionStage::Done) {
            tracing::error!("Feed '{}': {}", feed.name, e);
        }
    }

    /// Runs a storage operation; the lock is never held across an await
    fn with_storage<T>(
        &self,
        op: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T, FeedlineError> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|_| FeedlineError::Storage("storage lock poisoned".to_string()))?;
        Ok(op(&mut storage)?)
    }
}

/// Normalized item URL: the entry link, else its id when that is a URL
pub fn entry_url(entry: &FeedEntry) -> Option<String> {
    let from_link = entry.link.as_deref().and_then(|l| normalize_url(l).ok());
    from_link.or_else(|| {
        entry
            .id
            .as_deref()
            .filter(|id| id.starts_with("http://") || id.starts_with("https://"))
            .and_then(|id| normalize_url(id).ok())
    })
}

/// Text from the feed itself: summary, description, first content block,
/// then title
pub fn fallback_content(entry: &FeedEntry) -> Option<String> {
    entry
        .summary
        .as_deref()
        .and_then(html_to_text)
        .or_else(|| entry.description.as_deref().and_then(html_to_text))
        .or_else(|| entry.content_blocks.first().and_then(|c| html_to_text(c)))
        .or_else(|| {
            entry
                .title
                .as_deref()
                .map(normalize_whitespace)
                .filter(|t| !t.is_empty())
        })
}

/// SHA-256 hex digest of item content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn entry_label(entry: &FeedEntry) -> &str {
    entry
        .link
        .as_deref()
        .or(entry.id.as_deref())
        .unwrap_or("<entry without link>")
}
