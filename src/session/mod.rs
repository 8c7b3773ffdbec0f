//! Cookie session cache with single-flight refresh
//!
//! A [`SessionCache`] owns the cookie set for one consumer. Cookies are minted
//! by an external [`CookieSource`] (a scripted browser in production) and kept
//! until they are older than the TTL or the gateway reports the token invalid.
//!
//! Concurrency model:
//! - `current` holds the last good set behind a short, non-async lock so the
//!   fresh-cache path never waits on a refresh in progress elsewhere.
//! - `refresh_lock` serializes every fetch. `ensure` re-checks staleness after
//!   acquiring it, so N cold callers collapse into one fetch.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::utils::{COOKIE_TTL, SESSION_COOKIE, TOKEN_COOKIE};

/// Capability that produces a fresh cookie map for a URL
///
/// The production implementation drives a headless browser; tests substitute
/// a stub.
#[async_trait]
pub trait CookieSource: Send + Sync {
    async fn fetch_cookies(&self, url: &str, use_proxy: bool) -> Result<HashMap<String, String>>;
}

/// An immutable set of session cookies and the moment it was fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSet {
    cookies: HashMap<String, String>,
    fetched_at: Instant,
}

impl CookieSet {
    #[must_use]
    pub fn new(cookies: HashMap<String, String>, fetched_at: Instant) -> Self {
        Self {
            cookies,
            fetched_at,
        }
    }

    #[must_use]
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Session token used for signing; empty when the cookie is absent
    #[must_use]
    pub fn token(&self) -> &str {
        self.get(TOKEN_COOKIE).unwrap_or_default()
    }

    #[must_use]
    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    #[must_use]
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// `Cookie` header value, names sorted for a stable order
    #[must_use]
    pub fn header_value(&self) -> String {
        let mut pairs: Vec<(&String, &String)> = self.cookies.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Cookie cache owned by one consumer
pub struct SessionCache {
    source: Arc<dyn CookieSource>,
    use_proxy: bool,
    ttl: Duration,
    current: RwLock<Option<Arc<CookieSet>>>,
    refresh_lock: Mutex<()>,
}

impl SessionCache {
    #[must_use]
    pub fn new(source: Arc<dyn CookieSource>, use_proxy: bool) -> Self {
        Self::with_ttl(source, use_proxy, COOKIE_TTL)
    }

    #[must_use]
    pub fn with_ttl(source: Arc<dyn CookieSource>, use_proxy: bool, ttl: Duration) -> Self {
        Self {
            source,
            use_proxy,
            ttl,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn use_proxy(&self) -> bool {
        self.use_proxy
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Snapshot of the cached set, if one is fresh
    fn fresh(&self) -> Option<Arc<CookieSet>> {
        self.current
            .read()
            .as_ref()
            .filter(|set| !set.is_stale(self.ttl))
            .map(Arc::clone)
    }

    /// Return a fresh cookie set, fetching one if the cache is empty or stale
    ///
    /// Concurrent callers on a cold cache trigger exactly one fetch and all
    /// observe the same set.
    ///
    /// # Errors
    ///
    /// Propagates the cookie source's failure; the cache keeps its prior
    /// state so the next call retries.
    pub async fn ensure(&self, url: &str) -> Result<Arc<CookieSet>> {
        if let Some(set) = self.fresh() {
            return Ok(set);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(set) = self.fresh() {
            debug!("Session refreshed by a concurrent caller");
            return Ok(set);
        }

        self.fetch_and_store(url).await
    }

    /// Replace the cached set regardless of its age
    ///
    /// Used when the gateway reports the current token as invalid.
    ///
    /// # Errors
    ///
    /// Propagates the cookie source's failure; the cache keeps its prior
    /// state.
    pub async fn refresh(&self, url: &str) -> Result<Arc<CookieSet>> {
        let _guard = self.refresh_lock.lock().await;
        info!("Refreshing session cookies");
        self.fetch_and_store(url).await
    }

    /// Drop the cached set if it is still `stale`
    ///
    /// A set installed by a concurrent refresh is left in place.
    pub fn invalidate(&self, stale: &Arc<CookieSet>) {
        let mut current = self.current.write();
        if current.as_ref().is_some_and(|set| Arc::ptr_eq(set, stale)) {
            *current = None;
        }
    }

    /// Caller must hold `refresh_lock`
    async fn fetch_and_store(&self, url: &str) -> Result<Arc<CookieSet>> {
        let cookies = self.source.fetch_cookies(url, self.use_proxy).await?;

        let presence = |name: &str| if cookies.contains_key(name) { "ok" } else { "missing" };
        info!(
            cookies = cookies.len(),
            token = presence(TOKEN_COOKIE),
            session = presence(SESSION_COOKIE),
            "Fetched session cookies"
        );

        let set = Arc::new(CookieSet::new(cookies, Instant::now()));
        *self.current.write() = Some(Arc::clone(&set));
        Ok(set)
    }
}
