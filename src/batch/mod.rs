//! CSV-in, CSV-out batch scraping without a persistent queue
//!
//! URLs from the input's `URL` column are shared between `workers` tasks.
//! Each worker gets its own [`Scraper`] from the factory, and so its own
//! session cache. Every URL yields exactly one output row, flushed as soon as
//! it is written so an interrupted run keeps its progress.

use anyhow::{Context, Result};
use dashmap::DashSet;
use futures::future::join_all;
use log::info;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::fetcher::ProductRecord;
use crate::scrape_engine::Scraper;
use crate::utils::url_rows;

/// Output columns, in order
pub const OUTPUT_FIELDS: [&str; 13] = [
    "ITEM_ID",
    "CATEGORY_ID",
    "TITLE",
    "IMAGES",
    "SOLD_PRICE",
    "BROWSE_COUNT",
    "WANT_COUNT",
    "COLLECT_COUNT",
    "QUANTITY",
    "GMT_CREATE",
    "SELLER_ID",
    "URL",
    "ERROR",
];

/// Error recorded for a URL that appeared earlier in the same input
pub const DUPLICATE_URL: &str = "DUPLICATE_URL";

/// One output row; field order matches [`OUTPUT_FIELDS`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BatchRow {
    pub item_id: String,
    pub category_id: String,
    pub title: String,
    /// JSON array text
    pub images: String,
    pub sold_price: String,
    pub browse_count: String,
    pub want_count: String,
    pub collect_count: String,
    pub quantity: String,
    pub gmt_create: String,
    pub seller_id: String,
    pub url: String,
    pub error: String,
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl BatchRow {
    #[must_use]
    pub fn from_record(record: &ProductRecord) -> Self {
        Self {
            item_id: record.item_id.clone(),
            category_id: record.category_id.clone(),
            title: record.title.clone(),
            images: serde_json::to_string(&record.images).unwrap_or_else(|_| "[]".to_string()),
            sold_price: record.sold_price.clone(),
            browse_count: opt(record.browse_count),
            want_count: opt(record.want_count),
            collect_count: opt(record.collect_count),
            quantity: opt(record.quantity),
            gmt_create: opt(record.gmt_create),
            seller_id: record.seller_id.clone(),
            url: record.url.clone(),
            error: String::new(),
        }
    }

    #[must_use]
    pub fn failure(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            error: error.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.trim().is_empty()
    }
}

/// Totals for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
    pub duplicates: usize,
}

/// Read non-blank values of the `URL` column
///
/// # Errors
///
/// Fails on malformed CSV or when there is no `URL` column.
pub fn read_urls<R: io::Read>(reader: R) -> Result<Vec<String>> {
    url_rows(reader)?.collect()
}

/// [`read_urls`] over a file
pub fn load_urls(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open input CSV: {}", path.display()))?;
    read_urls(file)
}

struct Shared<W: io::Write> {
    queue: Mutex<VecDeque<String>>,
    seen: DashSet<String>,
    writer: Mutex<csv::Writer<W>>,
    done: AtomicUsize,
    total: usize,
}

#[derive(Default)]
struct WorkerTally {
    ok: usize,
    errors: usize,
    duplicates: usize,
}

impl<W: io::Write> Shared<W> {
    fn next_url(&self) -> Option<String> {
        self.queue.lock().pop_front()
    }

    fn write(&self, row: &BatchRow, label: &str) -> Result<()> {
        {
            let mut writer = self.writer.lock();
            writer.serialize(row).context("Failed to write output row")?;
            writer.flush().context("Failed to flush output")?;
        }
        let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        info!("[{n}/{}] {label} - {}", self.total, row.url);
        Ok(())
    }
}

async fn worker<W: io::Write>(shared: &Shared<W>, scraper: Scraper) -> Result<WorkerTally> {
    let mut tally = WorkerTally::default();
    while let Some(url) = shared.next_url() {
        if !shared.seen.insert(url.clone()) {
            shared.write(&BatchRow::failure(&url, DUPLICATE_URL), "SKIP")?;
            tally.duplicates += 1;
            continue;
        }

        let row = match scraper.scrape(&url).await {
            Ok(record) => BatchRow::from_record(&record),
            Err(e) => BatchRow::failure(&url, e.to_string()),
        };
        if row.is_ok() {
            tally.ok += 1;
            shared.write(&row, "OK")?;
        } else {
            tally.errors += 1;
            shared.write(&row, "ERROR")?;
        }
    }
    Ok(tally)
}

/// Scrape `urls` with up to `workers` concurrent workers into `output`
///
/// The worker count is clamped to `1..=urls.len()`. `make_scraper` is called
/// once per worker.
///
/// # Errors
///
/// Fails only when the output cannot be written; scrape failures become rows.
pub async fn run_batch<W, F>(
    urls: Vec<String>,
    workers: usize,
    make_scraper: F,
    output: W,
) -> Result<BatchSummary>
where
    W: io::Write,
    F: Fn() -> Scraper,
{
    let total = urls.len();
    let mut writer = csv::Writer::from_writer(output);
    if total == 0 {
        writer
            .write_record(OUTPUT_FIELDS)
            .context("Failed to write header")?;
        writer.flush().context("Failed to flush output")?;
        info!("No URLs to scrape");
        return Ok(BatchSummary::default());
    }

    let workers = workers.clamp(1, total);
    info!("Scraping {total} URL(s) with {workers} worker(s)");

    let shared = Shared {
        queue: Mutex::new(urls.into()),
        seen: DashSet::new(),
        writer: Mutex::new(writer),
        done: AtomicUsize::new(0),
        total,
    };

    let tallies = join_all((0..workers).map(|_| worker(&shared, make_scraper()))).await;

    let mut summary = BatchSummary {
        total,
        ..BatchSummary::default()
    };
    for tally in tallies {
        let tally = tally?;
        summary.ok += tally.ok;
        summary.errors += tally.errors;
        summary.duplicates += tally.duplicates;
    }
    Ok(summary)
}

/// Read `input`, scrape, and write `output`
pub async fn run_batch_file<F>(
    input: &Path,
    output: &Path,
    workers: usize,
    make_scraper: F,
) -> Result<BatchSummary>
where
    F: Fn() -> Scraper,
{
    let urls = load_urls(input)?;
    let file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create output CSV: {}", output.display()))?;
    let summary = run_batch(urls, workers, make_scraper, file).await?;
    info!("CSV written to {}", output.display());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_urls_skips_blanks() {
        let input = "ID,URL\n1,https://x/item?id=1\n2,  \n3, https://x/item?id=3 \n";
        assert_eq!(
            read_urls(input.as_bytes()).unwrap(),
            vec!["https://x/item?id=1", "https://x/item?id=3"]
        );
    }

    #[test]
    fn test_read_urls_requires_column() {
        assert!(read_urls("LINK\nhttps://x\n".as_bytes()).is_err());
    }

    #[test]
    fn test_row_columns_match_output_fields() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .serialize(BatchRow::failure("https://x/item?id=1", "E"))
            .unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, OUTPUT_FIELDS.join(","));
    }

    #[test]
    fn test_row_from_record() {
        let record = ProductRecord {
            item_id: "1".into(),
            images: vec!["https://img/a.jpg".into(), "https://img/b.jpg".into()],
            browse_count: Some(12),
            gmt_create: Some(1_700_000_000_000),
            url: "https://x/item?id=1".into(),
            ..ProductRecord::default()
        };
        let row = BatchRow::from_record(&record);
        assert_eq!(row.images, r#"["https://img/a.jpg","https://img/b.jpg"]"#);
        assert_eq!(row.browse_count, "12");
        assert_eq!(row.want_count, "");
        assert_eq!(row.gmt_create, "1700000000000");
        assert!(row.is_ok());
    }
}
