//! Core domain types, configuration and the series cache

pub mod cache;
pub mod config;
pub mod log;
pub mod provider;
pub mod series;

// Re-export main types for cleaner imports
pub use cache::{CacheStatus, EtfCache};
pub use provider::SeriesProvider;
pub use series::{Observation, Series, SeriesPoint, SeriesRecord, Ticker};
