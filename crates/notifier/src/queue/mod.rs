//! Durable, at-least-once work-item store.
//!
//! Every mutation (claim, complete, release, fail, retry, flush) is atomic per
//! item, so two workers never hold the same item and a failure is never lost.

mod memory;
mod postgres;

pub use memory::MemoryJobQueue;
pub use postgres::PgJobQueue;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use taskmail_common::types::{FailedJob, JobKind, QueuedJob};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Queue store shared by the dispatch service, workers and the monitor.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a work item, available immediately.
    async fn push(
        &self,
        queue: &str,
        kind: JobKind,
        payload: serde_json::Value,
    ) -> Result<Uuid, QueueError>;

    /// Claim the next available item on `queue`, incrementing its attempts.
    ///
    /// Items reserved longer than `reservation_timeout` ago count as abandoned
    /// and may be claimed again.
    async fn reserve(
        &self,
        queue: &str,
        reservation_timeout: Duration,
    ) -> Result<Option<QueuedJob>, QueueError>;

    /// Remove a completed item.
    async fn delete(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Drop the reservation and make the item available again after `delay`.
    async fn release(&self, job_id: Uuid, delay: Duration) -> Result<(), QueueError>;

    /// Move an item to the failed store.
    async fn fail(&self, job: &QueuedJob, exception: &str) -> Result<(), QueueError>;

    /// Count pending items, optionally only those of one kind.
    async fn pending_count(&self, kind: Option<JobKind>) -> Result<i64, QueueError>;

    /// Count failed items, optionally only those of one kind.
    async fn failed_count(&self, kind: Option<JobKind>) -> Result<i64, QueueError>;

    /// Most recently created pending items of `kind`, newest first.
    async fn recent_pending(&self, kind: JobKind, limit: i64)
    -> Result<Vec<QueuedJob>, QueueError>;

    /// Most recently failed items of `kind`, newest first.
    async fn recent_failed(&self, kind: JobKind, limit: i64) -> Result<Vec<FailedJob>, QueueError>;

    /// Move a failed item back to pending with its attempts reset.
    async fn retry_failed(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Purge the failed store. Returns the number of items removed.
    async fn flush_failed(&self) -> Result<u64, QueueError>;
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
