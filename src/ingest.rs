//! Feed a CSV of product URLs into the job queue

use anyhow::{Context, Result};
use log::info;
use std::io;
use std::path::Path;

use crate::job_queue::{JobBody, JobQueue};
use crate::utils::url_rows;

/// Messages sent per queue call
pub const SEND_BATCH_SIZE: usize = 10;

/// Stream the `URL` column of `reader` into `queue`
///
/// Blank URLs are skipped. Returns the number of messages sent.
///
/// # Errors
///
/// Fails on malformed CSV, a missing `URL` column, or a queue error.
pub async fn enqueue_urls<R: io::Read>(reader: R, queue: &dyn JobQueue) -> Result<usize> {
    let mut batch = Vec::with_capacity(SEND_BATCH_SIZE);
    let mut total = 0;

    for url in url_rows(reader)? {
        batch.push(JobBody::new(url?).to_message()?);

        if batch.len() == SEND_BATCH_SIZE {
            total += queue.send(&batch).await.context("Failed to send batch")?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        total += queue.send(&batch).await.context("Failed to send batch")?;
    }

    Ok(total)
}

/// [`enqueue_urls`] over a file
pub async fn enqueue_file(path: &Path, queue: &dyn JobQueue) -> Result<usize> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open input CSV: {}", path.display()))?;
    let total = enqueue_urls(file, queue).await?;
    info!("Sent {total} URLs to the queue from {}", path.display());
    Ok(total)
}
