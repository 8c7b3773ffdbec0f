//! Configuration module for scraping and queue workers
//!
//! This module provides `ScrapeConfig` and `WorkerConfig` with validated
//! builders and sensible defaults, plus environment-backed proxy settings.

// Sub-modules
pub mod builder;
pub mod env;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::{ScrapeConfigBuilder, WorkerConfigBuilder};
pub use types::{ProxySettings, ScrapeConfig, WorkerConfig};
