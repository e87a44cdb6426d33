//! Configuration module for Feedline
//!
//! This module handles loading, parsing, validating and hot-reloading the TOML
//! feed configuration.
//!
//! # Example
//!
//! ```no_run
//! use feedline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("feeds.toml")).unwrap();
//! println!("Collecting {} feeds", config.enabled_feeds().count());
//! ```

mod parser;
mod store;
mod types;
mod validation;

// Re-export types
pub use store::ConfigStore;
pub use types::{CollectorConfig, Config, FeedConfig, Settings, CONFIG_VERSION};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
