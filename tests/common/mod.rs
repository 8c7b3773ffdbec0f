//! Stubs and fixtures shared by the integration tests

use async_trait::async_trait;
use kodegen_tools_pdpscrape::{
    CookieSet, CookieSource, DetailFetch, FetchError, JobStatus, MemoryStatusStore,
    ProductRecord, RawResponse, RecordStore, ScrapeConfig, Scraper, ScraperFactory, SessionCache,
    StatusRecord, StatusStore, StoreError,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Cookie source that mints `tok{n}_...` tokens and counts calls
#[derive(Default)]
pub struct StubCookieSource {
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl StubCookieSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CookieSource for StubCookieSource {
    async fn fetch_cookies(
        &self,
        _url: &str,
        _use_proxy: bool,
    ) -> anyhow::Result<HashMap<String, String>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(HashMap::from([
            ("_m_h5_tk".to_string(), format!("tok{n}_1700000000000")),
            ("cookie2".to_string(), format!("c{n}")),
        ]))
    }
}

/// Fetcher answering per URL from a script; unscripted URLs get a product
///
/// Tracks total calls and the peak number of concurrent fetches.
#[derive(Default)]
pub struct StubFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Value>>>,
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Queue responses for `url`; the last one repeats
    pub fn script(self, url: &str, responses: Vec<Value>) -> Self {
        self.scripts.lock().insert(url.to_string(), responses.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> Value {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => {
                queue.pop_front().unwrap_or_else(|| product_body(url))
            }
            Some(queue) => queue.front().cloned().unwrap_or_else(|| product_body(url)),
            None => product_body(url),
        }
    }
}

#[async_trait]
impl DetailFetch for StubFetcher {
    async fn fetch(&self, url: &str, _cookies: &CookieSet) -> Result<RawResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let body = self.next_response(url);

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(RawResponse::new(body))
    }
}

/// Record store whose writes always fail
#[derive(Default)]
pub struct FailingRecordStore {
    attempts: AtomicUsize,
}

#[allow(dead_code)]
impl FailingRecordStore {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn put(&self, _record: &ProductRecord) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::InvalidMessage("disk full".to_string()))
    }
}

/// Status store that refuses `SUCCESS` writes and keeps everything else
#[derive(Default)]
pub struct SuccessRejectingStatusStore {
    pub inner: MemoryStatusStore,
}

#[async_trait]
impl StatusStore for SuccessRejectingStatusStore {
    async fn get(&self, url_hash: &str) -> Result<Option<StatusRecord>, StoreError> {
        self.inner.get(url_hash).await
    }

    async fn put(&self, record: StatusRecord) -> Result<(), StoreError> {
        if record.status == JobStatus::Success {
            return Err(StoreError::InvalidStatus("status table is read-only".to_string()));
        }
        self.inner.put(record).await
    }
}

/// Full successful detail body for `url`
#[allow(dead_code)]
pub fn product_body(url: &str) -> Value {
    let id = kodegen_tools_pdpscrape::extract_item_id(url).unwrap_or_default();
    json!({
        "ret": ["SUCCESS::调用成功"],
        "data": {
            "trackParams": {"itemId": id, "categoryId": "50025969"},
            "itemDO": {
                "title": format!("Item {id}"),
                "soldPrice": "99.5",
                "browseCnt": 120,
                "wantCnt": 7,
                "collectCnt": 3,
                "quantity": 1,
                "gmtCreate": 1_700_000_000_000_i64,
                "imageInfos": [{"photoSearchUrl": format!("https://img.example/{id}.jpg")}]
            },
            "sellerDO": {"sellerId": "seller-1"}
        }
    })
}

#[allow(dead_code)]
pub fn token_error() -> Value {
    json!({"ret": ["FAIL_SYS_TOKEN_EXOIRED::令牌过期"]})
}

#[allow(dead_code)]
pub fn blocked() -> Value {
    json!({"ret": ["FAIL_SYS_ILLEGAL_ACCESS::blocked"]})
}

#[allow(dead_code)]
pub fn item_url(id: u32) -> String {
    format!("https://www.goofish.com/item?spm=a21ybx.item&id={id}")
}

/// Scraper over the stubs with default limits
#[allow(dead_code)]
pub fn stub_scraper(source: Arc<StubCookieSource>, fetcher: Arc<StubFetcher>) -> Scraper {
    let session = Arc::new(SessionCache::new(source, false));
    Scraper::with_limits(session, fetcher, Duration::from_secs(15), 2)
}

/// Factory over the stubs; every built scraper gets its own session
#[allow(dead_code)]
pub fn stub_factory(source: Arc<StubCookieSource>, fetcher: Arc<StubFetcher>) -> ScraperFactory {
    let config = ScrapeConfig::builder()
        .build()
        .expect("default scrape config");
    ScraperFactory::with_parts(&config, source, fetcher)
}
