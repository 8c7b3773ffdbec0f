//! reqwest-backed detail fetcher

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::COOKIE;

use super::{DetailFetch, FetchError, RawResponse};
use crate::config::ScrapeConfig;
use crate::session::CookieSet;
use crate::signing::{SignedRequest, build_signed_request};
use crate::utils::extract_item_id;

/// Sends signed detail requests over a shared connection pool
///
/// The client is cheap to clone and safe to share between workers.
#[derive(Debug, Clone)]
pub struct HttpDetailFetcher {
    client: Client,
    api_url: String,
    app_key: String,
}

impl HttpDetailFetcher {
    /// Build the fetcher from config
    ///
    /// # Errors
    ///
    /// Fails if the proxy URL is invalid or the TLS backend cannot be
    /// initialized.
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(config.http_timeout())
            .pool_idle_timeout(config.http_timeout());

        if let Some(proxy) = config.proxy() {
            builder = builder.proxy(reqwest::Proxy::all(proxy.http_url()?)?);
        }

        Ok(Self {
            client: builder.build()?,
            api_url: config.api_url().to_string(),
            app_key: config.app_key().to_string(),
        })
    }

    /// Sign a request for `item_id` at the current wall-clock time
    #[must_use]
    pub fn signed_request(&self, item_id: &str, cookies: &CookieSet) -> SignedRequest {
        build_signed_request(
            &self.api_url,
            &self.app_key,
            cookies.token(),
            item_id,
            chrono::Utc::now().timestamp_millis(),
        )
    }
}

#[async_trait]
impl DetailFetch for HttpDetailFetcher {
    async fn fetch(&self, url: &str, cookies: &CookieSet) -> Result<RawResponse, FetchError> {
        let item_id =
            extract_item_id(url).ok_or_else(|| FetchError::MalformedUrl(url.to_string()))?;
        let request = self.signed_request(&item_id, cookies);

        let mut builder = self
            .client
            .post(&request.api_url)
            .query(&request.query)
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if !cookies.is_empty() {
            builder = builder.header(COOKIE, cookies.header_value());
        }

        let response = builder.send().await.map_err(|e| {
            log::warn!("Detail request for {url} failed: {e}");
            FetchError::from_reqwest(&e)
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        if !status.is_success() {
            log::debug!("Detail endpoint answered HTTP {status} for {url}");
        }

        let raw = RawResponse::from_slice(&bytes)?;
        log::info!("Response status for {url}: {}", raw.ret_signal());
        Ok(raw)
    }
}
