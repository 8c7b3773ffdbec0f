//! SQLite-backed queue, status store and record store
//!
//! One database file holds all three so a single host can run producers,
//! workers and exporters against the same state. WAL mode lets readers
//! proceed while a worker writes.
//!
//! Queue semantics follow a hosted queue with a visibility timeout: a
//! received message gets a fresh receipt and is hidden until
//! `visibility_timeout` elapses. Messages that were received
//! `max_receive_count` times and come due again move to `dead_letters`.

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::{JobQueue, QueueMessage, RecordStore, StatusRecord, StatusStore, StoreError};
use crate::config::WorkerConfig;
use crate::fetcher::ProductRecord;
use crate::utils::url_hash;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    body TEXT NOT NULL,
    receipt TEXT,
    visible_at INTEGER NOT NULL,
    receive_count INTEGER NOT NULL DEFAULT 0,
    sent_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_visible ON queue(visible_at);
CREATE INDEX IF NOT EXISTS idx_queue_receipt ON queue(receipt);

CREATE TABLE IF NOT EXISTS dead_letters (
    id INTEGER PRIMARY KEY,
    body TEXT NOT NULL,
    receive_count INTEGER NOT NULL,
    dead_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS job_status (
    url_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    error TEXT
);

CREATE TABLE IF NOT EXISTS products (
    url_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    item_id TEXT NOT NULL,
    record TEXT NOT NULL,
    saved_at INTEGER NOT NULL
);
";

/// Empty-queue polling interval while a receive is long-polling
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Queue and stores in one SQLite database
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
    visibility_timeout: Duration,
    max_receive_count: u32,
}

impl SqliteJobStore {
    /// Open or create the database at `path`
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be applied.
    pub async fn open(
        path: &Path,
        visibility_timeout: Duration,
        max_receive_count: u32,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            visibility_timeout,
            max_receive_count: max_receive_count.max(1),
        })
    }

    /// Open using the worker's database path and queue policy
    ///
    /// # Errors
    ///
    /// See [`SqliteJobStore::open`].
    pub async fn from_config(config: &WorkerConfig) -> Result<Self, StoreError> {
        Self::open(
            config.database_path(),
            config.visibility_timeout(),
            config.max_receive_count(),
        )
        .await
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Move due messages that exhausted their receives to `dead_letters`
    async fn dead_letter_exhausted(&self, now: i64) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT OR REPLACE INTO dead_letters (id, body, receive_count, dead_at)
            SELECT id, body, receive_count, ?1 FROM queue
            WHERE visible_at <= ?1 AND receive_count >= ?2
            ",
        )
        .bind(now)
        .bind(i64::from(self.max_receive_count))
        .execute(&mut *tx)
        .await?;

        let moved = sqlx::query("DELETE FROM queue WHERE visible_at <= ?1 AND receive_count >= ?2")
            .bind(now)
            .bind(i64::from(self.max_receive_count))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if moved > 0 {
            log::warn!("Moved {moved} message(s) to dead_letters");
        }
        Ok(moved)
    }

    async fn try_receive(&self, max: usize) -> Result<Vec<QueueMessage>, StoreError> {
        let now = Self::now_ms();
        self.dead_letter_exhausted(now).await?;

        let visibility_ms = i64::try_from(self.visibility_timeout.as_millis()).unwrap_or(i64::MAX);
        let hidden_until = now.saturating_add(visibility_ms);
        let batch_id = Uuid::new_v4().to_string();
        let limit = i64::try_from(max).unwrap_or(i64::MAX);

        let mut rows: Vec<(i64, String, String, i64)> = sqlx::query_as(
            r"
            UPDATE queue
            SET receipt = ?1 || '-' || id,
                visible_at = ?2,
                receive_count = receive_count + 1
            WHERE id IN (
                SELECT id FROM queue WHERE visible_at <= ?3 ORDER BY id LIMIT ?4
            )
            RETURNING id, body, receipt, receive_count
            ",
        )
        .bind(&batch_id)
        .bind(hidden_until)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.sort_by_key(|(id, ..)| *id);
        let messages = rows
            .into_iter()
            .map(|(_, body, receipt, receive_count)| QueueMessage {
                receipt,
                body,
                receive_count: u32::try_from(receive_count).unwrap_or(u32::MAX),
            })
            .collect();
        Ok(messages)
    }

    /// Messages waiting or in flight
    pub async fn queue_depth(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn dead_letter_count(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Row count per job status
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM job_status GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Every stored product, oldest first
    pub async fn all_products(&self) -> Result<Vec<ProductRecord>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT record FROM products ORDER BY saved_at, url_hash")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(record,)| serde_json::from_str(&record).map_err(StoreError::from))
            .collect()
    }

    pub async fn product(&self, url: &str) -> Result<Option<ProductRecord>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT record FROM products WHERE url_hash = ?")
                .bind(url_hash(url))
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(record,)| serde_json::from_str(&record).map_err(StoreError::from))
            .transpose()
    }
}

#[async_trait]
impl JobQueue for SqliteJobStore {
    async fn send(&self, bodies: &[String]) -> Result<usize, StoreError> {
        let now = Self::now_ms();
        let mut tx = self.pool.begin().await?;
        for body in bodies {
            sqlx::query("INSERT INTO queue (body, visible_at, sent_at) VALUES (?, ?, ?)")
                .bind(body)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(bodies.len())
    }

    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, StoreError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let deadline = Instant::now() + wait;
        loop {
            let batch = self.try_receive(max).await?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(batch);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn delete(&self, receipt: &str) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM queue WHERE receipt = ?")
            .bind(receipt)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            log::debug!("Receipt {receipt} no longer valid, message was redelivered or removed");
        }
        Ok(())
    }
}

#[async_trait]
impl StatusStore for SqliteJobStore {
    async fn get(&self, url_hash: &str) -> Result<Option<StatusRecord>, StoreError> {
        let row: Option<(String, String, String, i64, Option<String>)> = sqlx::query_as(
            "SELECT url_hash, url, status, updated_at, error FROM job_status WHERE url_hash = ?",
        )
        .bind(url_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(url_hash, url, status, updated_at, error)| -> Result<_, StoreError> {
            Ok(StatusRecord {
                url_hash,
                url,
                status: status.parse()?,
                updated_at,
                error,
            })
        })
        .transpose()
    }

    async fn put(&self, record: StatusRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO job_status (url_hash, url, status, updated_at, error)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url_hash) DO UPDATE SET
                url = excluded.url,
                status = excluded.status,
                updated_at = excluded.updated_at,
                error = excluded.error
            WHERE job_status.status <> 'SUCCESS'
            ",
        )
        .bind(&record.url_hash)
        .bind(&record.url)
        .bind(record.status.as_str())
        .bind(record.updated_at)
        .bind(&record.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteJobStore {
    async fn put(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        sqlx::query(
            r"
            INSERT INTO products (url_hash, url, item_id, record, saved_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url_hash) DO UPDATE SET
                item_id = excluded.item_id,
                record = excluded.record,
                saved_at = excluded.saved_at
            ",
        )
        .bind(url_hash(&record.url))
        .bind(&record.url)
        .bind(&record.item_id)
        .bind(json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
