pub mod batch;
pub mod browser_profile;
pub mod browser_setup;
pub mod config;
pub mod export;
pub mod fetcher;
pub mod ingest;
pub mod job_queue;
pub mod scrape_engine;
pub mod session;
pub mod signing;
pub mod utils;
pub mod worker;

pub use browser_setup::{
    BrowserCookieSource, download_managed_browser, find_browser_executable, launch_browser,
};
pub use config::{ProxySettings, ScrapeConfig, WorkerConfig};
pub use fetcher::{
    DetailFetch, FetchError, HttpDetailFetcher, NetworkErrorKind, ProductRecord, RawResponse,
    RetSignal, parse_product,
};
pub use job_queue::{
    JobQueue, JobStatus, MemoryQueue, MemoryRecordStore, MemoryStatusStore, QueueMessage,
    RecordStore, SqliteJobStore, StatusRecord, StatusStore, StoreError,
};
pub use scrape_engine::{ScrapeError, ScrapeReport, Scraper, ScraperFactory};
pub use session::{CookieSet, CookieSource, SessionCache};
pub use signing::{SignedRequest, build_signed_request, sign};
pub use utils::{extract_item_id, url_hash};
pub use worker::{ConsumerSummary, JobConsumer, JobOutcome};
