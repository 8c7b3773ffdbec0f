//! Headless Chrome launch and browser-backed cookie minting
//!
//! The gateway only hands out a usable `_m_h5_tk` token to something that
//! looks like a real browser visiting the product page, so session cookies
//! are obtained by loading the page in Chrome and reading its cookie jar.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::browser_profile::BrowserProfile;
use crate::config::{ProxySettings, ScrapeConfig};
use crate::session::CookieSource;
use crate::utils::CHROME_USER_AGENT;

/// Environment variable that pins the Chrome executable
pub const CHROMIUM_PATH_VAR: &str = "CHROMIUM_PATH";

/// Hides the usual automation tells before any page script runs
const STEALTH_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['es-ES', 'es', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
if (!window.chrome) { window.chrome = {}; }
if (!window.chrome.runtime) { window.chrome.runtime = {}; }
const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
    window.navigator.permissions.query = (parameters) =>
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters);
}
";

fn candidate_paths() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    }
}

/// Locate a Chrome or Chromium executable
///
/// `CHROMIUM_PATH` wins when it points at an existing file, then the usual
/// install locations, then `which` on Unix.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CHROMIUM_PATH_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from {CHROMIUM_PATH_VAR}: {}", path.display());
            return Ok(path);
        }
        warn!(
            "{CHROMIUM_PATH_VAR} points to a missing file: {}",
            path.display()
        );
    }

    if let Some(path) = candidate_paths()
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
    {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!("Found browser on PATH: {found}");
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    Err(anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache directory
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kodegen-pdpscrape")
        .join("chromium");
    info!("Downloading managed Chromium into {}", cache_dir.display());

    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// Launch Chrome with the scraper's fingerprint
///
/// Only the proxy server is handed to Chrome. Authenticated proxies need a
/// CDP auth handler that this launcher does not install, so credentials are
/// used by the HTTP client alone.
pub async fn launch_browser(
    headless: bool,
    proxy: Option<&ProxySettings>,
    profile: &BrowserProfile,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = match find_browser_executable() {
        Ok(path) => path,
        Err(e) => {
            warn!("{e}, falling back to a managed download");
            download_managed_browser().await?
        }
    };

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(1920, 1080)
        .user_data_dir(profile.path())
        .chrome_executable(chrome_path);

    builder = if headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    if let Some(proxy) = proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy.server_url()));
    }

    let config = builder
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--lang=es-ES")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-breakpad")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio")
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with profile {}", profile.path().display());
    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let msg = e.to_string();
                // chromiumoxide cannot decode some newer CDP events; those are noise
                if msg.contains("data did not match any variant of untagged enum Message")
                    || msg.contains("Failed to deserialize WS response")
                {
                    trace!("Suppressed CDP decode error: {msg}");
                } else {
                    error!("Browser handler error: {e:?}");
                }
            }
        }
        debug!("Browser handler task completed");
    });

    Ok((browser, handler_task))
}

/// [`CookieSource`] that loads the target page in headless Chrome
#[derive(Debug, Clone)]
pub struct BrowserCookieSource {
    headless: bool,
    proxy: Option<ProxySettings>,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl BrowserCookieSource {
    #[must_use]
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            headless: config.headless(),
            proxy: config.proxy().cloned(),
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.cookie_settle_delay(),
        }
    }

    async fn collect(&self, browser: &Browser, url: &str) -> Result<HashMap<String, String>> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams {
            source: STEALTH_SCRIPT.to_string(),
            include_command_line_api: None,
            world_name: None,
            run_immediately: None,
        })
        .await
        .context("Failed to inject stealth script")?;

        info!("Navigating to: {url}");
        tokio::time::timeout(self.navigation_timeout, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await
        .map_err(|_| anyhow!("Navigation to {url} timed out"))?
        .with_context(|| format!("Failed to navigate to {url}"))?;

        // The token cookie is set by page scripts after DOMContentLoaded
        tokio::time::sleep(self.settle_delay).await;

        let cookies = page.get_cookies().await.context("Failed to read cookies")?;
        Ok(cookies.into_iter().map(|c| (c.name, c.value)).collect())
    }
}

#[async_trait]
impl CookieSource for BrowserCookieSource {
    async fn fetch_cookies(&self, url: &str, use_proxy: bool) -> Result<HashMap<String, String>> {
        let proxy = if use_proxy {
            Some(
                self.proxy
                    .as_ref()
                    .ok_or_else(|| anyhow!("Proxy requested but no proxy settings configured"))?,
            )
        } else {
            None
        };

        let profile = BrowserProfile::create()?;
        let (mut browser, handler_task) = launch_browser(self.headless, proxy, &profile).await?;

        let result = self.collect(&browser, url).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {e}");
        }
        if let Err(e) = browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        handler_task.abort();

        result
    }
}
