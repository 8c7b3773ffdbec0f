//! Idempotent, bounded-concurrency queue consumer
//!
//! Per message:
//! 1. decode `{"url"}`; undecodable bodies are left for dead-lettering
//! 2. skip and acknowledge when the status store already says `SUCCESS`
//! 3. mark `IN_PROGRESS` and scrape
//! 4. on success persist the record, mark `SUCCESS`, then acknowledge
//! 5. on failure mark `FAILED` with the error and leave the message alone
//!
//! Step 4's order means a crash after the record write but before the
//! acknowledgement ends in a redelivery that step 2 swallows.

use dashmap::DashSet;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use super::ShutdownSignal;
use crate::config::WorkerConfig;
use crate::fetcher::ProductRecord;
use crate::job_queue::{
    JobQueue, JobStatus, QueueMessage, RecordStore, StatusRecord, StatusStore, StoreError,
};
use crate::scrape_engine::Scraper;
use crate::utils::url_hash;

/// What happened to one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Scraped, stored and acknowledged
    Succeeded,
    /// Already `SUCCESS`; acknowledged without fetching
    Skipped,
    /// Scrape or store failure; left for redelivery
    Failed(String),
    /// Body was not a job; left for dead-lettering
    Rejected(String),
    /// Same URL already in flight here; left for redelivery
    Deferred,
}

/// Totals for one consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub deferred: usize,
    pub idle_exit: bool,
}

impl ConsumerSummary {
    fn record(&mut self, result: Result<JobOutcome, JoinError>) {
        match result {
            Ok(JobOutcome::Succeeded) => self.succeeded += 1,
            Ok(JobOutcome::Skipped) => self.skipped += 1,
            Ok(JobOutcome::Failed(_)) => self.failed += 1,
            Ok(JobOutcome::Rejected(_)) => self.rejected += 1,
            Ok(JobOutcome::Deferred) => self.deferred += 1,
            Err(e) => {
                error!("Job task panicked: {e}");
                self.failed += 1;
            }
        }
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.rejected + self.deferred
    }
}

impl fmt::Display for ConsumerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "succeeded={} failed={} skipped={} rejected={} deferred={}",
            self.succeeded, self.failed, self.skipped, self.rejected, self.deferred
        )
    }
}

/// Removes a url hash from the in-flight set when the job ends, panics included
struct InFlight {
    set: Arc<DashSet<String>>,
    key: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// Drains a [`JobQueue`] through a [`Scraper`]
///
/// Each consumer owns the scraper's session cache; clones share it and the
/// in-flight set.
#[derive(Clone)]
pub struct JobConsumer {
    scraper: Scraper,
    queue: Arc<dyn JobQueue>,
    status: Arc<dyn StatusStore>,
    records: Arc<dyn RecordStore>,
    config: WorkerConfig,
    in_flight: Arc<DashSet<String>>,
}

impl JobConsumer {
    #[must_use]
    pub fn new(
        scraper: Scraper,
        queue: Arc<dyn JobQueue>,
        status: Arc<dyn StatusStore>,
        records: Arc<dyn RecordStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            scraper,
            queue,
            status,
            records,
            config,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Poll until the idle limit or a shutdown signal, then drain in-flight jobs
    pub async fn run(&self, mut shutdown: ShutdownSignal) -> ConsumerSummary {
        let concurrency = self.config.max_concurrency();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut active = FuturesUnordered::new();
        let mut summary = ConsumerSummary::default();
        let mut idle_polls = 0u32;
        let mut signal_closed = false;

        info!(
            "Consumer started: concurrency={concurrency}, batch={}, idle limit={} polls",
            self.config.max_batch_size(),
            self.config.max_idle_polls()
        );

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, draining {} in-flight job(s)", active.len());
                break;
            }

            // collect finished jobs without blocking
            while let Some(Some(result)) = active.next().now_or_never() {
                summary.record(result);
            }

            let capacity = semaphore
                .available_permits()
                .min(self.config.max_batch_size());
            if capacity == 0 {
                if let Some(result) = active.next().await {
                    summary.record(result);
                }
                continue;
            }

            let received = tokio::select! {
                changed = shutdown.changed(), if !signal_closed => {
                    signal_closed = changed.is_err();
                    continue;
                }
                received = self.queue.receive(capacity, self.config.poll_wait()) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    error!("Queue receive failed: {e}");
                    self.pause(&mut shutdown, &mut signal_closed).await;
                    continue;
                }
            };

            if messages.is_empty() {
                if active.is_empty() {
                    idle_polls += 1;
                    debug!(
                        "No messages ({idle_polls}/{})",
                        self.config.max_idle_polls()
                    );
                    if idle_polls >= self.config.max_idle_polls() {
                        info!("Idle limit reached, stopping consumer");
                        summary.idle_exit = true;
                        break;
                    }
                }
                self.pause(&mut shutdown, &mut signal_closed).await;
                continue;
            }

            idle_polls = 0;
            debug!("Received {} message(s)", messages.len());
            for message in messages {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    error!("Semaphore closed unexpectedly");
                    break;
                };
                let consumer = self.clone();
                active.push(tokio::spawn(async move {
                    let _permit = permit;
                    consumer.process(message).await
                }));
            }
        }

        while let Some(result) = active.next().await {
            summary.record(result);
        }

        info!("Consumer finished: {summary}");
        summary
    }

    /// Idle sleep that wakes early on shutdown
    async fn pause(&self, shutdown: &mut ShutdownSignal, signal_closed: &mut bool) {
        tokio::select! {
            changed = shutdown.changed(), if !*signal_closed => {
                *signal_closed = changed.is_err();
            }
            () = tokio::time::sleep(self.config.idle_sleep()) => {}
        }
    }

    /// Handle one message end to end
    pub async fn process(&self, message: QueueMessage) -> JobOutcome {
        let job = match message.job() {
            Ok(job) => job,
            Err(e) => {
                warn!("Rejecting message {}: {e}", message.receipt);
                return JobOutcome::Rejected(e.to_string());
            }
        };
        let url = job.url.trim();
        let key = url_hash(url);

        if !self.in_flight.insert(key.clone()) {
            info!("{url} is already being scraped, leaving duplicate for redelivery");
            return JobOutcome::Deferred;
        }
        let _in_flight = InFlight {
            set: Arc::clone(&self.in_flight),
            key: key.clone(),
        };

        match self.run_job(&message, url, &key).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Store failure while processing {url}: {e}");
                JobOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_job(
        &self,
        message: &QueueMessage,
        url: &str,
        key: &str,
    ) -> Result<JobOutcome, StoreError> {
        info!("Processing {url} (delivery {})", message.receive_count);

        if let Some(prior) = self.status.get(key).await?
            && prior.status == JobStatus::Success
        {
            info!("Skipping {url}, already scraped");
            self.queue.delete(&message.receipt).await?;
            return Ok(JobOutcome::Skipped);
        }

        self.status
            .put(StatusRecord::new(url, JobStatus::InProgress, None))
            .await?;

        let started = Instant::now();
        let detail = match self.scraper.scrape(url).await {
            Ok(record) => match self.persist(&record, url).await {
                Ok(()) => {
                    if let Err(e) = self.queue.delete(&message.receipt).await {
                        // SUCCESS is recorded, so a redelivery is skipped
                        warn!("Failed to acknowledge {url}: {e}");
                    }
                    info!("OK {url} in {:.2}s", started.elapsed().as_secs_f64());
                    return Ok(JobOutcome::Succeeded);
                }
                Err(e) => {
                    error!("Failed to save {url}: {e}");
                    e.to_string()
                }
            },
            Err(e) => {
                let detail = e.to_string();
                warn!(
                    "FAILED {url} after {:.2}s: {detail}",
                    started.elapsed().as_secs_f64()
                );
                detail
            }
        };

        // The message stays unacked either way and comes back after the
        // visibility timeout
        let failed = StatusRecord::new(url, JobStatus::Failed, Some(detail.clone()));
        if let Err(e) = self.status.put(failed).await {
            error!("Failed to record FAILED for {url}: {e}");
        }
        Ok(JobOutcome::Failed(detail))
    }

    async fn persist(&self, record: &ProductRecord, url: &str) -> Result<(), StoreError> {
        self.records.put(record).await?;
        self.status
            .put(StatusRecord::new(url, JobStatus::Success, None))
            .await
    }
}
