//! Production wiring for [`Scraper`]

use std::sync::Arc;

use super::Scraper;
use crate::browser_setup::BrowserCookieSource;
use crate::config::ScrapeConfig;
use crate::fetcher::{DetailFetch, HttpDetailFetcher};
use crate::session::{CookieSource, SessionCache};

/// Builds scrapers that share one HTTP client but own their session
pub struct ScraperFactory {
    config: ScrapeConfig,
    source: Arc<dyn CookieSource>,
    fetcher: Arc<dyn DetailFetch>,
}

impl ScraperFactory {
    /// Browser cookie source plus reqwest fetcher
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        Ok(Self::with_parts(
            config,
            Arc::new(BrowserCookieSource::new(config)),
            Arc::new(HttpDetailFetcher::new(config)?),
        ))
    }

    #[must_use]
    pub fn with_parts(
        config: &ScrapeConfig,
        source: Arc<dyn CookieSource>,
        fetcher: Arc<dyn DetailFetch>,
    ) -> Self {
        Self {
            config: config.clone(),
            source,
            fetcher,
        }
    }

    /// A scraper with a fresh, empty session cache
    #[must_use]
    pub fn build(&self) -> Scraper {
        let session = Arc::new(SessionCache::with_ttl(
            Arc::clone(&self.source),
            self.config.use_proxy(),
            self.config.cookie_ttl(),
        ));
        Scraper::new(session, Arc::clone(&self.fetcher), &self.config)
    }
}
