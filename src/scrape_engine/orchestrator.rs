//! Bounded retry loop over the detail fetcher

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ScrapeError;
use crate::config::ScrapeConfig;
use crate::fetcher::{DetailFetch, ProductRecord, RetSignal, parse_product};
use crate::session::SessionCache;
use crate::utils::extract_item_id;

/// Scrapes single URLs with one session cache and one fetcher
///
/// Cheap to clone; clones share the session cache.
#[derive(Clone)]
pub struct Scraper {
    session: Arc<SessionCache>,
    fetcher: Arc<dyn DetailFetch>,
    request_timeout: Duration,
    max_token_retries: u32,
}

impl Scraper {
    #[must_use]
    pub fn new(
        session: Arc<SessionCache>,
        fetcher: Arc<dyn DetailFetch>,
        config: &ScrapeConfig,
    ) -> Self {
        Self::with_limits(
            session,
            fetcher,
            config.request_timeout(),
            config.max_token_retries(),
        )
    }

    #[must_use]
    pub fn with_limits(
        session: Arc<SessionCache>,
        fetcher: Arc<dyn DetailFetch>,
        request_timeout: Duration,
        max_token_retries: u32,
    ) -> Self {
        Self {
            session,
            fetcher,
            request_timeout,
            max_token_retries,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionCache> {
        &self.session
    }

    #[must_use]
    pub fn max_token_retries(&self) -> u32 {
        self.max_token_retries
    }

    /// Scrape one product URL
    ///
    /// At most `max_token_retries + 1` fetches are made. Each session-invalid
    /// signal except the last forces a cookie refresh before the next attempt.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`ScrapeError`]. A malformed URL is rejected
    /// before the session or the network is touched.
    pub async fn scrape(&self, url: &str) -> Result<ProductRecord, ScrapeError> {
        if extract_item_id(url).is_none() {
            warn!("Rejecting URL without item id: {url}");
            return Err(ScrapeError::MalformedUrl(url.to_string()));
        }

        let started = Instant::now();
        let attempts = self.max_token_retries + 1;
        let mut cookies = self
            .session
            .ensure(url)
            .await
            .map_err(|e| ScrapeError::session(&e))?;
        let mut last_signal = String::new();

        for attempt in 1..=attempts {
            let raw = match tokio::time::timeout(
                self.request_timeout,
                self.fetcher.fetch(url, &cookies),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        "Detail request for {url} exceeded {:?}",
                        self.request_timeout
                    );
                    return Err(ScrapeError::RequestTimeout(self.request_timeout));
                }
            };

            match raw.signal() {
                RetSignal::SessionInvalid(signal) => {
                    warn!("Session rejected for {url} ({signal}), attempt {attempt}/{attempts}");
                    last_signal = signal;
                    if attempt < attempts {
                        cookies = self
                            .session
                            .refresh(url)
                            .await
                            .map_err(|e| ScrapeError::session(&e))?;
                    } else {
                        // Leave no rejected set behind for the next job
                        self.session.invalidate(&cookies);
                    }
                }
                RetSignal::Permanent(signal) => {
                    warn!("Permanent API error for {url}: {signal}");
                    return Err(ScrapeError::PermanentApiError { signal });
                }
                RetSignal::Success(_) | RetSignal::Unknown(_) => {
                    let record = parse_product(raw.body(), url)?;
                    info!(
                        "Scraped item {} in {:.2}s",
                        record.item_id,
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(record);
                }
            }
        }

        debug!("Token retries exhausted for {url}");
        Err(ScrapeError::TokenRetryExhausted {
            attempts,
            signal: last_signal,
        })
    }

    /// Scrape and fold the outcome into a printable report
    pub async fn scrape_report(&self, url: &str) -> ScrapeReport {
        match self.scrape(url).await {
            Ok(record) => ScrapeReport::Product(record),
            Err(e) => ScrapeReport::Failure {
                url: url.to_string(),
                error: e.to_string(),
            },
        }
    }
}

/// Result of an on-demand scrape: the record, or the URL with its error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapeReport {
    Product(ProductRecord),
    Failure {
        #[serde(rename = "URL")]
        url: String,
        #[serde(rename = "ERROR")]
        error: String,
    },
}

impl ScrapeReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Product(_))
    }
}
