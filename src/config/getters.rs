//! Getter methods for `ScrapeConfig` and `WorkerConfig`

use anyhow::{Context, anyhow};
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::types::{ProxySettings, ScrapeConfig, WorkerConfig};

impl ScrapeConfig {
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    #[must_use]
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    #[must_use]
    pub fn cookie_ttl(&self) -> Duration {
        self.cookie_ttl
    }

    #[must_use]
    pub fn max_token_retries(&self) -> u32 {
        self.max_token_retries
    }

    #[must_use]
    pub fn use_proxy(&self) -> bool {
        self.use_proxy
    }

    /// Proxy settings, only when the proxy is enabled
    #[must_use]
    pub fn proxy(&self) -> Option<&ProxySettings> {
        if self.use_proxy {
            self.proxy.as_ref()
        } else {
            None
        }
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    #[must_use]
    pub fn cookie_settle_delay(&self) -> Duration {
        self.cookie_settle_delay
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    #[must_use]
    pub fn poll_wait(&self) -> Duration {
        self.poll_wait
    }

    #[must_use]
    pub fn idle_sleep(&self) -> Duration {
        self.idle_sleep
    }

    #[must_use]
    pub fn max_idle_polls(&self) -> u32 {
        self.max_idle_polls
    }

    #[must_use]
    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    #[must_use]
    pub fn max_receive_count(&self) -> u32 {
        self.max_receive_count
    }

    #[must_use]
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }
}

impl ProxySettings {
    /// Proxy URL with percent-encoded credentials, for the HTTP client
    ///
    /// # Errors
    ///
    /// Fails when `server` is not a usable `host[:port]`.
    pub fn http_url(&self) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.server_url())
            .with_context(|| format!("Invalid proxy server: {}", self.server))?;
        url.set_username(&self.username)
            .and_then(|()| url.set_password(Some(&self.password)))
            .map_err(|()| anyhow!("Proxy server {} cannot carry credentials", self.server))?;
        Ok(url)
    }

    /// Proxy URL without credentials, for `--proxy-server`
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("http://{}", self.server)
    }
}
