//! # LSTN Common Library
//!
//! Shared code for the LSTN services including:
//! - Listening-history data model (scrobbles, stats snapshots)
//! - Event types (StatsEvent enum) and EventBus
//! - Timestamp and period-key helpers

pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
