//! Retry and classification around the detail fetcher
//!
//! [`Scraper::scrape`] turns one URL into a [`ProductRecord`] or a terminal
//! [`ScrapeError`]. Only session rejections are retried here, each after a
//! forced cookie refresh; everything else fails fast and is left to the
//! queue's redelivery policy.

pub mod error;
pub mod factory;
pub mod orchestrator;

pub use error::ScrapeError;
pub use factory::ScraperFactory;
pub use orchestrator::{ScrapeReport, Scraper};

pub use crate::fetcher::ProductRecord;
