//! Core configuration types for scraping and queue workers
//!
//! `ScrapeConfig` drives a single scrape (signing, HTTP timeouts, session
//! lifetime, browser behavior). `WorkerConfig` drives the queue consumer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the session, fetcher and retry orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub(crate) api_url: String,
    pub(crate) app_key: String,

    /// Deadline wrapped around one fetch attempt
    ///
    /// Exceeding it is a terminal `RequestTimeout` for the attempt.
    ///
    /// Default: 15 seconds
    pub(crate) request_timeout: Duration,

    /// Overall HTTP client timeout
    ///
    /// Default: 30 seconds
    pub(crate) http_timeout: Duration,

    /// TCP/TLS connect phase timeout
    ///
    /// Default: 5 seconds
    pub(crate) connect_timeout: Duration,

    /// Per-read timeout on the response body
    ///
    /// Default: 30 seconds
    pub(crate) read_timeout: Duration,

    /// Write phase budget
    ///
    /// reqwest has no dedicated write timeout, so this is folded into the
    /// overall client timeout when it is larger.
    ///
    /// Default: 10 seconds
    pub(crate) write_timeout: Duration,

    /// Maximum age of a cached cookie set
    ///
    /// Default: 600 seconds
    pub(crate) cookie_ttl: Duration,

    /// Session refreshes allowed per scrape
    ///
    /// Default: 2 (so at most 3 fetch attempts)
    pub(crate) max_token_retries: u32,

    /// Route both the browser and the HTTP client through the proxy
    pub(crate) use_proxy: bool,

    /// Proxy endpoint, required when `use_proxy` is set
    pub(crate) proxy: Option<ProxySettings>,

    pub(crate) headless: bool,

    /// Timeout for the browser navigation that mints cookies
    ///
    /// Default: 60 seconds
    pub(crate) navigation_timeout: Duration,

    /// Pause after navigation so the page's scripts can set cookies
    ///
    /// Default: 2 seconds
    pub(crate) cookie_settle_delay: Duration,
}

/// Configuration for the job consumer loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent in-flight jobs
    pub(crate) max_concurrency: usize,
    /// Upper bound on messages requested per poll
    pub(crate) max_batch_size: usize,
    /// Long-poll wait passed to the queue
    pub(crate) poll_wait: Duration,
    /// Sleep after an empty poll
    pub(crate) idle_sleep: Duration,
    /// Consecutive empty polls before exiting
    pub(crate) max_idle_polls: u32,
    /// How long a received message stays hidden from other consumers
    pub(crate) visibility_timeout: Duration,
    /// Receives allowed before a message is dead-lettered
    pub(crate) max_receive_count: u32,
    /// SQLite database backing the queue and stores
    pub(crate) database_path: PathBuf,
}

/// HTTP proxy endpoint with credentials
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxySettings {
    /// `host:port`
    pub server: String,
    pub username: String,
    /// Never written out; reads back empty when absent
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl std::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
