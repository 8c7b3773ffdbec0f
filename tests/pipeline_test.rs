//! Enqueue, consume and export through the SQLite store

use kodegen_tools_pdpscrape::export::{count_rows, parse_fields, write_records};
use kodegen_tools_pdpscrape::ingest::enqueue_urls;
use kodegen_tools_pdpscrape::worker::shutdown_channel;
use kodegen_tools_pdpscrape::{JobConsumer, SqliteJobStore, StatusStore, WorkerConfig, url_hash};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{StubCookieSource, StubFetcher, blocked, item_url, stub_scraper};

fn worker_config(dir: &tempfile::TempDir) -> WorkerConfig {
    WorkerConfig::builder()
        .database_path(dir.path().join("jobs.sqlite"))
        .max_concurrency(2)
        .poll_wait(Duration::from_millis(300))
        .idle_sleep(Duration::from_millis(50))
        .max_idle_polls(2)
        .visibility_timeout(Duration::from_secs(300))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_enqueue_consume_export() {
    let dir = tempfile::tempdir().unwrap();
    let config = worker_config(&dir);
    let store = Arc::new(SqliteJobStore::from_config(&config).await.unwrap());

    let good = item_url(101);
    let other = item_url(102);
    let bad = item_url(103);
    let csv = format!("URL\n{good}\n\n{other}\n{bad}\n");
    let sent = enqueue_urls(csv.as_bytes(), store.as_ref()).await.unwrap();
    assert_eq!(sent, 3);
    assert_eq!(store.queue_depth().await.unwrap(), 3);

    let source = Arc::new(StubCookieSource::default());
    let fetcher = Arc::new(StubFetcher::new().script(&bad, vec![blocked()]));
    let consumer = JobConsumer::new(
        stub_scraper(source.clone(), fetcher.clone()),
        store.clone(),
        store.clone(),
        store.clone(),
        config.clone(),
    );

    let (_tx, rx) = shutdown_channel();
    let summary = consumer.run(rx).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.idle_exit);
    assert_eq!(source.calls(), 1);

    // acknowledged messages are gone; the failure waits for its visibility timeout
    assert_eq!(store.queue_depth().await.unwrap(), 1);

    let failed = store.get(&url_hash(&bad)).await.unwrap().unwrap();
    assert_eq!(failed.error.as_deref(), Some("FAIL_SYS_ILLEGAL_ACCESS::blocked"));

    let counts = store.status_counts().await.unwrap();
    assert!(counts.contains(&("SUCCESS".to_string(), 2)));
    assert!(counts.contains(&("FAILED".to_string(), 1)));

    let products = store.all_products().await.unwrap();
    assert_eq!(products.len(), 2);
    let stored = store.product(&good).await.unwrap().unwrap();
    assert_eq!(stored.title, "Item 101");
    assert_eq!(stored.images, vec!["https://img.example/101.jpg".to_string()]);

    let fields = parse_fields("item_id, title ,url").unwrap();
    let mut output = Vec::new();
    let written = write_records(&products, Some(&fields), &mut output).unwrap();
    assert_eq!(written, 2);
    let text = String::from_utf8(output.clone()).unwrap();
    assert_eq!(text.lines().next(), Some("ITEM_ID,TITLE,URL"));
    assert!(text.contains(&format!("101,Item 101,{good}")));

    // an export has no ERROR column to count by
    assert!(count_rows(output.as_slice(), "ERROR").is_err());
}

#[tokio::test]
async fn test_reopened_store_skips_finished_urls() {
    let dir = tempfile::tempdir().unwrap();
    let config = worker_config(&dir);
    let url = item_url(201);

    let fetcher = Arc::new(StubFetcher::new());
    {
        let store = Arc::new(SqliteJobStore::from_config(&config).await.unwrap());
        enqueue_urls(format!("URL\n{url}\n").as_bytes(), store.as_ref())
            .await
            .unwrap();
        let consumer = JobConsumer::new(
            stub_scraper(Arc::new(StubCookieSource::default()), fetcher.clone()),
            store.clone(),
            store.clone(),
            store.clone(),
            config.clone(),
        );
        let (_tx, rx) = shutdown_channel();
        assert_eq!(consumer.run(rx).await.succeeded, 1);
    }

    // a second producer sends the same URL against the reopened database
    let store = Arc::new(SqliteJobStore::from_config(&config).await.unwrap());
    enqueue_urls(format!("URL\n{url}\n").as_bytes(), store.as_ref())
        .await
        .unwrap();
    let consumer = JobConsumer::new(
        stub_scraper(Arc::new(StubCookieSource::default()), fetcher.clone()),
        store.clone(),
        store.clone(),
        store.clone(),
        config,
    );
    let (_tx, rx) = shutdown_channel();
    let summary = consumer.run(rx).await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(store.queue_depth().await.unwrap(), 0);
    assert_eq!(store.all_products().await.unwrap().len(), 1);
}
