//! Queue, status store and record store abstractions
//!
//! The consumer only sees the three traits. [`SqliteJobStore`] backs all of
//! them with one database for single-host runs; the in-memory versions in
//! [`memory`] serve the batch mode and tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::fetcher::ProductRecord;
use crate::utils::url_hash;

pub use memory::{MemoryQueue, MemoryRecordStore, MemoryStatusStore};
pub use sqlite::SqliteJobStore;

/// Errors raised by the queue and the stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown job status: {0}")]
    InvalidStatus(String),

    #[error("Invalid message body: {0}")]
    InvalidMessage(String),
}

/// Lifecycle state of a job; a missing row means unseen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Success,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// One row of the status store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub url_hash: String,
    pub url: String,
    pub status: JobStatus,
    /// Epoch seconds
    pub updated_at: i64,
    pub error: Option<String>,
}

impl StatusRecord {
    /// Stamp a status for `url` at the current time
    #[must_use]
    pub fn new(url: &str, status: JobStatus, error: Option<String>) -> Self {
        Self {
            url_hash: url_hash(url),
            url: url.to_string(),
            status,
            updated_at: chrono::Utc::now().timestamp(),
            error,
        }
    }
}

/// Body of a work item, `{"url": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobBody {
    pub url: String,
}

impl JobBody {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Serialize for [`JobQueue::send`]
    ///
    /// # Errors
    ///
    /// Serialization of a plain string field does not fail in practice.
    pub fn to_message(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A received message and the receipt needed to delete it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub receipt: String,
    pub body: String,
    /// Deliveries so far, including this one
    pub receive_count: u32,
}

impl QueueMessage {
    /// Decode the body as a [`JobBody`]
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidMessage` when the body is not
    /// `{"url": string}` or the URL is blank.
    pub fn job(&self) -> Result<JobBody, StoreError> {
        let job: JobBody = serde_json::from_str(&self.body)
            .map_err(|e| StoreError::InvalidMessage(format!("{e}: {}", self.body)))?;
        if job.url.trim().is_empty() {
            return Err(StoreError::InvalidMessage(format!("blank url: {}", self.body)));
        }
        Ok(job)
    }
}

/// At-least-once work queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue raw bodies, returning how many were accepted
    async fn send(&self, bodies: &[String]) -> Result<usize, StoreError>;

    /// Receive up to `max` messages, waiting up to `wait` for the first one
    ///
    /// Received messages stay hidden from other receivers until deleted or
    /// until the queue's visibility policy redelivers them.
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, StoreError>;

    /// Acknowledge a message
    async fn delete(&self, receipt: &str) -> Result<(), StoreError>;
}

/// Job status keyed by `url_hash`
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, url_hash: &str) -> Result<Option<StatusRecord>, StoreError>;

    /// Write a status; implementations never move a `SUCCESS` row elsewhere
    async fn put(&self, record: StatusRecord) -> Result<(), StoreError>;
}

/// Product records keyed by the hash of their source URL
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, record: &ProductRecord) -> Result<(), StoreError>;
}
