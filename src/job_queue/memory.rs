//! In-process queue and stores
//!
//! Redelivery is explicit: unacknowledged messages stay in flight until
//! [`MemoryQueue::redeliver_unacked`] puts them back, which stands in for a
//! visibility timeout lapsing.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{
    JobQueue, JobStatus, QueueMessage, RecordStore, StatusRecord, StatusStore, StoreError,
};
use crate::fetcher::ProductRecord;
use crate::utils::url_hash;

#[derive(Debug, Clone)]
struct Entry {
    body: String,
    receive_count: u32,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Entry>,
    in_flight: HashMap<String, Entry>,
}

/// FIFO queue with receipts
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    next_receipt: AtomicU64,
    deleted: AtomicUsize,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue pre-filled with `bodies`
    #[must_use]
    pub fn with_messages<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = Self::new();
        queue.state.lock().pending.extend(bodies.into_iter().map(|body| Entry {
            body: body.into(),
            receive_count: 0,
        }));
        queue
    }

    /// Move every unacknowledged message back to the head of the queue
    pub fn redeliver_unacked(&self) -> usize {
        let mut state = self.state.lock();
        let mut returned: Vec<(String, Entry)> = state.in_flight.drain().collect();
        returned.sort_by(|a, b| a.0.cmp(&b.0));
        let count = returned.len();
        for (_, entry) in returned.into_iter().rev() {
            state.pending.push_front(entry);
        }
        drop(state);
        if count > 0 {
            self.notify.notify_waiters();
        }
        count
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Messages acknowledged so far
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }

    fn take(&self, max: usize) -> Vec<QueueMessage> {
        let mut state = self.state.lock();
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut entry) = state.pending.pop_front() else {
                break;
            };
            entry.receive_count += 1;
            // zero-padded so receipts sort in delivery order
            let receipt = format!("{:020}", self.next_receipt.fetch_add(1, Ordering::SeqCst));
            batch.push(QueueMessage {
                receipt: receipt.clone(),
                body: entry.body.clone(),
                receive_count: entry.receive_count,
            });
            state.in_flight.insert(receipt, entry);
        }
        batch
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn send(&self, bodies: &[String]) -> Result<usize, StoreError> {
        {
            let mut state = self.state.lock();
            state.pending.extend(bodies.iter().map(|body| Entry {
                body: body.clone(),
                receive_count: 0,
            }));
        }
        self.notify.notify_waiters();
        Ok(bodies.len())
    }

    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, StoreError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            let batch = self.take(max);
            if !batch.is_empty() || max == 0 {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn delete(&self, receipt: &str) -> Result<(), StoreError> {
        if self.state.lock().in_flight.remove(receipt).is_some() {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Status store with a write counter
#[derive(Default)]
pub struct MemoryStatusStore {
    rows: DashMap<String, StatusRecord>,
    puts: AtomicUsize,
}

impl MemoryStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status_of(&self, url: &str) -> Option<StatusRecord> {
        self.rows.get(&url_hash(url)).map(|row| row.clone())
    }

    /// Calls to `put`, including those ignored for a `SUCCESS` row
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, url_hash: &str) -> Result<Option<StatusRecord>, StoreError> {
        Ok(self.rows.get(url_hash).map(|row| row.clone()))
    }

    async fn put(&self, record: StatusRecord) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.rows
            .entry(record.url_hash.clone())
            .and_modify(|row| {
                if row.status != JobStatus::Success {
                    *row = record.clone();
                }
            })
            .or_insert(record);
        Ok(())
    }
}

/// Record store with a write counter
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: DashMap<String, ProductRecord>,
    puts: AtomicUsize,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<ProductRecord> {
        self.rows.get(&url_hash(url)).map(|row| row.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: &ProductRecord) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.rows.insert(url_hash(&record.url), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receive_hides_until_redelivered() {
        let queue = MemoryQueue::with_messages(["a", "b", "c"]);

        let first = queue.receive(2, Duration::ZERO).await.unwrap();
        assert_eq!(
            first.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
            ["a", "b"]
        );
        assert_eq!(queue.pending_len(), 1);
        assert_eq!(queue.in_flight_len(), 2);

        queue.delete(&first[0].receipt).await.unwrap();
        assert_eq!(queue.redeliver_unacked(), 1);

        let second = queue.receive(10, Duration::ZERO).await.unwrap();
        let delivered: Vec<_> = second
            .iter()
            .map(|m| (m.body.as_str(), m.receive_count))
            .collect();
        assert_eq!(delivered, [("b", 2), ("c", 1)]);
        assert_eq!(queue.deleted_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_waits_then_returns_empty() {
        let queue = MemoryQueue::new();
        let started = Instant::now();
        let batch = queue.receive(5, Duration::from_secs(20)).await.unwrap();
        assert!(batch.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_wakes_on_send() {
        let queue = std::sync::Arc::new(MemoryQueue::new());
        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive(5, Duration::from_secs(20)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        queue.send(&["late".to_string()]).await.unwrap();

        let batch = receiver.await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "late");
    }

    #[tokio::test]
    async fn test_status_store_never_downgrades_success() {
        let store = MemoryStatusStore::new();
        let url = "https://x/item?id=1";

        store.put(StatusRecord::new(url, JobStatus::InProgress, None)).await.unwrap();
        store.put(StatusRecord::new(url, JobStatus::Success, None)).await.unwrap();
        store
            .put(StatusRecord::new(url, JobStatus::Failed, Some("late".into())))
            .await
            .unwrap();

        let row = store.get(&url_hash(url)).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Success);
        assert_eq!(row.error, None);
        assert_eq!(store.put_count(), 3);
    }
}
