//! Shared protocol and runtime constants
//!
//! Default values used throughout the scraper. Values that belong to the
//! remote mobile-API protocol are fixed; runtime knobs have builder overrides
//! in [`crate::config`].

use std::time::Duration;

/// Detail endpoint of the marketplace's mobile API gateway
pub const API_URL: &str = "https://h5api.m.goofish.com/h5/mtop.taobao.idle.pc.detail/1.0/";

/// API name sent as the `api` query parameter
pub const API_NAME: &str = "mtop.taobao.idle.pc.detail";

/// Application key mixed into every request signature
pub const APP_KEY: &str = "34839810";

/// Client script version advertised as `jsv`
pub const JSV_VERSION: &str = "2.7.2";

/// Cookie holding the session token used for signing
pub const TOKEN_COOKIE: &str = "_m_h5_tk";

/// Secondary session cookie, only checked for diagnostics
pub const SESSION_COOKIE: &str = "cookie2";

/// Substrings of the `ret` signal meaning the session must be refreshed
///
/// `FAIL_SYS_TOKEN` covers the expired, empty and illegal token variants.
pub const TOKEN_ERRORS: [&str; 3] = ["FAIL_SYS_TOKEN", "TOKEN_EMPTY", "RGV587_ERROR"];

/// Substring of the `ret` signal marking a successful call
pub const SUCCESS_SIGNAL: &str = "SUCCESS";

/// Session refreshes allowed per scrape before giving up
pub const MAX_TOKEN_RETRIES: u32 = 2;

/// Maximum age of a cached cookie set
pub const COOKIE_TTL: Duration = Duration::from_secs(600);

/// Per-attempt deadline wrapped around a detail fetch
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Origin sent on API requests
pub const SITE_ORIGIN: &str = "https://www.goofish.com";

/// Desktop Chrome user agent shared by the browser and the HTTP client
///
/// Keep the `sec-ch-ua` header in [`crate::signing`] in sync with this version.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Concurrent in-flight jobs per consumer process
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Messages requested per queue poll
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

/// Empty polls tolerated before a worker shuts itself down
///
/// With the default 5 second idle sleep this is one minute of inactivity.
pub const DEFAULT_MAX_IDLE_POLLS: u32 = 12;
