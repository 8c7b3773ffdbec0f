//! Tests for the scrape and worker configuration builders

use kodegen_tools_pdpscrape::{ProxySettings, ScrapeConfig, WorkerConfig};
use std::path::Path;
use std::time::Duration;

fn proxy() -> ProxySettings {
    ProxySettings {
        server: "proxy.local:8000".to_string(),
        username: "alice".to_string(),
        password: "s3cret".to_string(),
    }
}

#[test]
fn test_scrape_defaults() {
    let config = ScrapeConfig::builder().build().unwrap();

    assert_eq!(
        config.api_url(),
        "https://h5api.m.goofish.com/h5/mtop.taobao.idle.pc.detail/1.0/"
    );
    assert_eq!(config.app_key(), "34839810");
    assert_eq!(config.request_timeout(), Duration::from_secs(15));
    assert_eq!(config.cookie_ttl(), Duration::from_secs(600));
    assert_eq!(config.max_token_retries(), 2);
    assert!(config.headless());
    assert!(!config.use_proxy());
    assert!(config.proxy().is_none());
}

#[test]
fn test_scrape_overrides() {
    let config = ScrapeConfig::builder()
        .api_url("http://127.0.0.1:9999/detail")
        .request_timeout(Duration::from_secs(3))
        .max_token_retries(0)
        .headless(false)
        .use_proxy(true)
        .proxy(Some(proxy()))
        .build()
        .unwrap();

    assert_eq!(config.api_url(), "http://127.0.0.1:9999/detail");
    assert_eq!(config.request_timeout(), Duration::from_secs(3));
    assert_eq!(config.max_token_retries(), 0);
    assert!(!config.headless());
    assert_eq!(
        config.proxy().map(ProxySettings::server_url).as_deref(),
        Some("http://proxy.local:8000")
    );
}

#[test]
fn test_serialized_config_omits_proxy_password() {
    let config = ScrapeConfig::builder()
        .use_proxy(true)
        .proxy(Some(proxy()))
        .build()
        .unwrap();

    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("s3cret"), "{json}");
    assert!(json.contains("proxy.local:8000"));

    let restored: ProxySettings =
        serde_json::from_str(r#"{"server":"proxy.local:8000","username":"alice"}"#).unwrap();
    assert!(restored.password.is_empty());
}

#[test]
fn test_proxy_settings_ignored_when_disabled() {
    let config = ScrapeConfig::builder()
        .proxy(Some(proxy()))
        .build()
        .unwrap();

    assert!(config.proxy().is_none());
}

#[test]
fn test_scrape_rejects_bad_values() {
    assert!(ScrapeConfig::builder().api_url("not a url").build().is_err());
    assert!(ScrapeConfig::builder().app_key("").build().is_err());
    assert!(
        ScrapeConfig::builder()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err()
    );
    assert!(ScrapeConfig::builder().use_proxy(true).build().is_err());
}

#[test]
fn test_worker_defaults() {
    let config = WorkerConfig::builder().build().unwrap();

    assert_eq!(config.max_concurrency(), 3);
    assert_eq!(config.max_batch_size(), 10);
    assert_eq!(config.poll_wait(), Duration::from_secs(20));
    assert_eq!(config.idle_sleep(), Duration::from_secs(5));
    assert_eq!(config.max_idle_polls(), 12);
    assert_eq!(config.max_receive_count(), 5);
    assert_eq!(config.database_path(), Path::new("pdpscrape.sqlite"));
}

#[test]
fn test_worker_rejects_zero_counts() {
    assert!(WorkerConfig::builder().max_concurrency(0).build().is_err());
    assert!(WorkerConfig::builder().max_batch_size(0).build().is_err());
    assert!(WorkerConfig::builder().max_idle_polls(0).build().is_err());
    assert!(WorkerConfig::builder().max_receive_count(0).build().is_err());
}

#[test]
fn test_worker_config_serializes() {
    let config = WorkerConfig::builder()
        .max_concurrency(8)
        .database_path("/var/lib/pdpscrape/jobs.sqlite")
        .build()
        .unwrap();

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["max_concurrency"], 8);
    assert_eq!(json["database_path"], "/var/lib/pdpscrape/jobs.sqlite");
}
