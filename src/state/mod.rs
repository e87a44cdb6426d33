//! State module for tracking collection progress
//!
//! # Components
//!
//! - `ItemStatus`: Processing status of a collected item (pending, classified, ...)
//! - `CollectionStage`: Stage of a single feed run, with `StageTracker` enforcing transitions

mod item_status;
mod stage;

// Re-export main types
pub use item_status::ItemStatus;
pub use stage::{CollectionStage, StageTracker};
