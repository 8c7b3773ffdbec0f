//! Builders for `ScrapeConfig` and `WorkerConfig`
//!
//! Every field has a default, so `ScrapeConfig::builder().build()` is valid.
//! `build()` validates the combination and returns an error instead of
//! silently clamping values.

use anyhow::{Result, anyhow, bail};
use std::path::PathBuf;
use std::time::Duration;

use super::types::{ProxySettings, ScrapeConfig, WorkerConfig};
use crate::utils::{
    API_URL, APP_KEY, COOKIE_TTL, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_IDLE_POLLS, DEFAULT_REQUEST_TIMEOUT, MAX_TOKEN_RETRIES,
};

pub struct ScrapeConfigBuilder {
    api_url: String,
    app_key: String,
    request_timeout: Duration,
    http_timeout: Duration,
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    cookie_ttl: Duration,
    max_token_retries: u32,
    use_proxy: bool,
    proxy: Option<ProxySettings>,
    headless: bool,
    navigation_timeout: Duration,
    cookie_settle_delay: Duration,
}

impl Default for ScrapeConfigBuilder {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            app_key: APP_KEY.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            http_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            cookie_ttl: COOKIE_TTL,
            max_token_retries: MAX_TOKEN_RETRIES,
            use_proxy: false,
            proxy: None,
            headless: true,
            navigation_timeout: Duration::from_secs(60),
            cookie_settle_delay: Duration::from_secs(2),
        }
    }
}

impl ScrapeConfig {
    #[must_use]
    pub fn builder() -> ScrapeConfigBuilder {
        ScrapeConfigBuilder::default()
    }
}

impl ScrapeConfigBuilder {
    /// Override the detail endpoint (tests point this at a mock server)
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    #[must_use]
    pub fn app_key(mut self, key: impl Into<String>) -> Self {
        self.app_key = key.into();
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn cookie_ttl(mut self, ttl: Duration) -> Self {
        self.cookie_ttl = ttl;
        self
    }

    #[must_use]
    pub fn max_token_retries(mut self, retries: u32) -> Self {
        self.max_token_retries = retries;
        self
    }

    /// Enable the proxy; settings must be supplied through [`Self::proxy`]
    #[must_use]
    pub fn use_proxy(mut self, enabled: bool) -> Self {
        self.use_proxy = enabled;
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: Option<ProxySettings>) -> Self {
        self.proxy = proxy;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn cookie_settle_delay(mut self, delay: Duration) -> Self {
        self.cookie_settle_delay = delay;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Fails when the API URL does not parse, a timeout is zero, or the proxy
    /// is enabled without settings.
    pub fn build(self) -> Result<ScrapeConfig> {
        url::Url::parse(&self.api_url)
            .map_err(|e| anyhow!("Invalid api_url '{}': {e}", self.api_url))?;

        if self.app_key.is_empty() {
            bail!("app_key must not be empty");
        }

        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("http_timeout", self.http_timeout),
            ("connect_timeout", self.connect_timeout),
            ("read_timeout", self.read_timeout),
            ("navigation_timeout", self.navigation_timeout),
        ] {
            if value.is_zero() {
                bail!("{name} must be greater than zero");
            }
        }

        if self.use_proxy && self.proxy.is_none() {
            bail!("use_proxy is set but no proxy settings were provided");
        }

        // The write phase shares the overall budget
        let http_timeout = self.http_timeout.max(self.write_timeout);

        Ok(ScrapeConfig {
            api_url: self.api_url,
            app_key: self.app_key,
            request_timeout: self.request_timeout,
            http_timeout,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            cookie_ttl: self.cookie_ttl,
            max_token_retries: self.max_token_retries,
            use_proxy: self.use_proxy,
            proxy: self.proxy,
            headless: self.headless,
            navigation_timeout: self.navigation_timeout,
            cookie_settle_delay: self.cookie_settle_delay,
        })
    }
}

pub struct WorkerConfigBuilder {
    max_concurrency: usize,
    max_batch_size: usize,
    poll_wait: Duration,
    idle_sleep: Duration,
    max_idle_polls: u32,
    visibility_timeout: Duration,
    max_receive_count: u32,
    database_path: PathBuf,
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            poll_wait: Duration::from_secs(20),
            idle_sleep: Duration::from_secs(5),
            max_idle_polls: DEFAULT_MAX_IDLE_POLLS,
            visibility_timeout: Duration::from_secs(300),
            max_receive_count: 5,
            database_path: PathBuf::from("pdpscrape.sqlite"),
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

impl WorkerConfigBuilder {
    #[must_use]
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    #[must_use]
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.max_batch_size = n;
        self
    }

    #[must_use]
    pub fn poll_wait(mut self, wait: Duration) -> Self {
        self.poll_wait = wait;
        self
    }

    #[must_use]
    pub fn idle_sleep(mut self, sleep: Duration) -> Self {
        self.idle_sleep = sleep;
        self
    }

    #[must_use]
    pub fn max_idle_polls(mut self, polls: u32) -> Self {
        self.max_idle_polls = polls;
        self
    }

    #[must_use]
    pub fn visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_receive_count(mut self, count: u32) -> Self {
        self.max_receive_count = count;
        self
    }

    #[must_use]
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Fails when a count is zero.
    pub fn build(self) -> Result<WorkerConfig> {
        if self.max_concurrency == 0 {
            bail!("max_concurrency must be at least 1");
        }
        if self.max_batch_size == 0 {
            bail!("max_batch_size must be at least 1");
        }
        if self.max_idle_polls == 0 {
            bail!("max_idle_polls must be at least 1");
        }
        if self.max_receive_count == 0 {
            bail!("max_receive_count must be at least 1");
        }

        Ok(WorkerConfig {
            max_concurrency: self.max_concurrency,
            max_batch_size: self.max_batch_size,
            poll_wait: self.poll_wait,
            idle_sleep: self.idle_sleep,
            max_idle_polls: self.max_idle_polls,
            visibility_timeout: self.visibility_timeout,
            max_receive_count: self.max_receive_count,
            database_path: self.database_path,
        })
    }
}
