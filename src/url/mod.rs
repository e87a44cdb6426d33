//! URL handling module for Feedline
//!
//! This module provides entry URL normalization (the item identity used for
//! deduplication) and the per-domain keys used for request pacing.

mod domain;
mod normalize;

pub use domain::{domain_key, extract_domain, UNKNOWN_DOMAIN};
pub use normalize::normalize_url;
