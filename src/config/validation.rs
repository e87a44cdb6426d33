use crate::config::types::{CollectorConfig, Config, FeedConfig, Settings, CONFIG_VERSION};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Accepted per-domain request rates
const MIN_REQUESTS_PER_SECOND: f64 = 0.001;
const MAX_REQUESTS_PER_SECOND: f64 = 10_000.0;

/// Ten years
const MAX_LOOKBACK_HOURS: i64 = 87_600;

/// One week
const MAX_OVERLAP_SECONDS: i64 = 604_800;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation(format!(
            "unsupported config version {}, expected {}",
            config.version, CONFIG_VERSION
        )));
    }
    validate_settings(&config.settings)?;
    validate_collector_config(&config.collector)?;
    validate_feeds(&config.feeds)?;
    Ok(())
}

/// Validates global settings
fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.request_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_seconds must be >= 1".to_string(),
        ));
    }

    if settings.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if !(1..=MAX_LOOKBACK_HOURS).contains(&settings.default_lookback_hours) {
        return Err(ConfigError::Validation(format!(
            "default_lookback_hours must be between 1 and {}, got {}",
            MAX_LOOKBACK_HOURS, settings.default_lookback_hours
        )));
    }

    if settings.default_interval_minutes == 0 {
        return Err(ConfigError::Validation(
            "default_interval_minutes must be >= 1".to_string(),
        ));
    }

    if settings.default_max_items == 0 {
        return Err(ConfigError::Validation(
            "default_max_items must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates collector configuration
fn validate_collector_config(config: &CollectorConfig) -> Result<(), ConfigError> {
    if !(MIN_REQUESTS_PER_SECOND..=MAX_REQUESTS_PER_SECOND).contains(&config.requests_per_second)
    {
        return Err(ConfigError::Validation(format!(
            "requests_per_second must be between {} and {}, got {}",
            MIN_REQUESTS_PER_SECOND, MAX_REQUESTS_PER_SECOND, config.requests_per_second
        )));
    }

    if !(0..=MAX_OVERLAP_SECONDS).contains(&config.overlap_seconds) {
        return Err(ConfigError::Validation(format!(
            "overlap_seconds must be between 0 and {}, got {}",
            MAX_OVERLAP_SECONDS, config.overlap_seconds
        )));
    }

    if config.max_concurrent_feeds < 1 || config.max_concurrent_feeds > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_feeds must be between 1 and 64, got {}",
            config.max_concurrent_feeds
        )));
    }

    if config.feed_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "feed_timeout_seconds must be >= 1".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates feed entries
fn validate_feeds(feeds: &[FeedConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut urls = HashSet::new();

    for feed in feeds {
        if feed.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "feed with url '{}' has an empty name",
                feed.url
            )));
        }

        if !names.insert(feed.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate feed name '{}'",
                feed.name
            )));
        }

        let url = Url::parse(&feed.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid feed URL '{}': {}", feed.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Feed URL '{}' must use http or https",
                feed.url
            )));
        }

        if !urls.insert(feed.url.as_str()) {
            return Err(ConfigError::Validation(format!(
                "feed URL '{}' is configured more than once",
                feed.url
            )));
        }

        if !(0.0..=1.0).contains(&feed.credibility) {
            return Err(ConfigError::Validation(format!(
                "credibility of feed '{}' must be within [0, 1], got {}",
                feed.name, feed.credibility
            )));
        }

        if feed.max_items == Some(0) {
            return Err(ConfigError::Validation(format!(
                "max_items of feed '{}' must be >= 1",
                feed.name
            )));
        }
    }

    Ok(())
}
