use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Current configuration document version
pub const CONFIG_VERSION: u32 = 1;

/// Main configuration structure for Feedline
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Document version; only [`CONFIG_VERSION`] is understood
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Feeds that should be collected, in configuration order
    pub fn enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled)
    }

    /// Looks up a feed by its configured name
    pub fn find_feed(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.name == name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            settings: Settings::default(),
            collector: CollectorConfig::default(),
            feeds: Vec::new(),
        }
    }
}

/// Global request and collection defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Timeout for a single HTTP request (seconds)
    pub request_timeout_seconds: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// How far back the first-ever run of a source reaches (hours)
    pub default_lookback_hours: i64,

    /// Interval between collection batches in watch mode (minutes)
    pub default_interval_minutes: u64,

    /// Per-feed entry cap when a feed does not set its own
    pub default_max_items: usize,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_minutes.saturating_mul(60))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            user_agent: format!("feedline/{}", env!("CARGO_PKG_VERSION")),
            default_lookback_hours: 24,
            default_interval_minutes: 60,
            default_max_items: 50,
        }
    }
}

/// Collector behaviour: pacing, retries, windowing and storage
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CollectorConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Maximum request rate per domain
    pub requests_per_second: f64,

    /// Additional attempts after the first failed one
    pub max_retries: u32,

    /// Wall-clock budget for one feed: feed fetch plus every entry (seconds)
    pub feed_timeout_seconds: u64,

    /// How far before the watermark a subsequent run starts (seconds)
    pub overlap_seconds: i64,

    /// Trailing window consulted by the deduplication gate (days)
    pub dedup_window_days: u32,

    /// Number of feeds collected at the same time
    pub max_concurrent_feeds: usize,
}

impl CollectorConfig {
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_seconds)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            database_path: "feedline.db".to_string(),
            requests_per_second: 1.0,
            max_retries: 2,
            feed_timeout_seconds: 300,
            overlap_seconds: 300,
            dedup_window_days: 7,
            max_concurrent_feeds: 4,
        }
    }
}

/// One configured feed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedConfig {
    pub name: String,

    pub url: String,

    /// Source credibility in [0, 1]
    #[serde(default = "default_credibility")]
    pub credibility: f64,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub interval_minutes: Option<u64>,

    /// Maximum entries processed per collection
    #[serde(default)]
    pub max_items: Option<usize>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub tier: Option<String>,

    #[serde(default)]
    pub reporting_type: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Any other keys, carried into the source's JSON config unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FeedConfig {
    /// Creates an enabled feed with default attributes
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            credibility: default_credibility(),
            categories: Vec::new(),
            interval_minutes: None,
            max_items: None,
            language: None,
            tier: None,
            reporting_type: None,
            enabled: true,
            extra: BTreeMap::new(),
        }
    }

    /// Entry cap for this feed, falling back to the global default
    pub fn effective_max_items(&self, settings: &Settings) -> usize {
        self.max_items.unwrap_or(settings.default_max_items)
    }

    /// Builds the free-form JSON config stored on the source row
    pub fn source_config(&self, settings: &Settings) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map.insert("categories".to_string(), serde_json::json!(self.categories));
        map.insert(
            "max_items".to_string(),
            serde_json::json!(self.effective_max_items(settings)),
        );
        map.insert(
            "interval_minutes".to_string(),
            serde_json::json!(self
                .interval_minutes
                .unwrap_or(settings.default_interval_minutes)),
        );
        if let Some(language) = &self.language {
            map.insert("language".to_string(), serde_json::json!(language));
        }
        serde_json::Value::Object(map)
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_credibility() -> f64 {
    0.5
}

fn default_enabled() -> bool {
    true
}
