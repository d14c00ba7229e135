//! Observability surface over the notification queue.
//!
//! Reads are filtered to `task_assigned` work items by their `kind` tag.
//! Administrative operations delegate to the queue's own retry/flush
//! primitives. Authorization is enforced by the callers (HTTP layer, CLI).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskmail_common::types::{FailedJob, JobKind, QueuedJob};

use crate::cache::StatsCache;
use crate::queue::{JobQueue, QueueError};

/// How long a stats snapshot is served from cache.
pub const STATS_CACHE_TTL: Duration = Duration::from_secs(30);

/// List size used by the HTTP endpoints.
pub const API_LIST_LIMIT: i64 = 20;

/// List size used by the operator CLI.
pub const CLI_LIST_LIMIT: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending_jobs: i64,
    pub failed_jobs: i64,
    /// Pending notification work items.
    pub email_jobs: i64,
    /// Failed notification work items.
    pub failed_email_jobs: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingJobView {
    pub id: Uuid,
    pub queue: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub available_at: DateTime<Utc>,
    pub reserved_at: Option<DateTime<Utc>>,
}

impl From<QueuedJob> for PendingJobView {
    fn from(job: QueuedJob) -> Self {
        Self {
            id: job.id,
            queue: job.queue,
            attempts: job.attempts,
            created_at: job.created_at,
            available_at: job.available_at,
            reserved_at: job.reserved_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJobView {
    pub id: Uuid,
    pub queue: String,
    pub exception: String,
    pub failed_at: DateTime<Utc>,
}

impl From<FailedJob> for FailedJobView {
    fn from(job: FailedJob) -> Self {
        Self {
            id: job.id,
            queue: job.queue,
            exception: job.exception,
            failed_at: job.failed_at,
        }
    }
}

pub struct QueueMonitor {
    queue: Arc<dyn JobQueue>,
    cache: Arc<dyn StatsCache>,
}

impl QueueMonitor {
    pub fn new(queue: Arc<dyn JobQueue>, cache: Arc<dyn StatsCache>) -> Self {
        Self { queue, cache }
    }

    /// Queue counts, served from cache for up to [`STATS_CACHE_TTL`].
    ///
    /// A cache outage only costs a recount.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        match self.cache.get().await {
            Ok(Some(stats)) => return Ok(stats),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Queue stats cache read failed"),
        }

        let stats = QueueStats {
            pending_jobs: self.queue.pending_count(None).await?,
            failed_jobs: self.queue.failed_count(None).await?,
            email_jobs: self.queue.pending_count(Some(JobKind::TaskAssigned)).await?,
            failed_email_jobs: self.queue.failed_count(Some(JobKind::TaskAssigned)).await?,
            last_updated: Utc::now(),
        };

        if let Err(e) = self.cache.put(&stats, STATS_CACHE_TTL).await {
            tracing::warn!(error = %e, "Queue stats cache write failed");
        }

        Ok(stats)
    }

    pub async fn list_pending(&self, limit: i64) -> Result<Vec<PendingJobView>, QueueError> {
        let jobs = self
            .queue
            .recent_pending(JobKind::TaskAssigned, limit)
            .await?;
        Ok(jobs.into_iter().map(PendingJobView::from).collect())
    }

    pub async fn list_failed(&self, limit: i64) -> Result<Vec<FailedJobView>, QueueError> {
        let jobs = self
            .queue
            .recent_failed(JobKind::TaskAssigned, limit)
            .await?;
        Ok(jobs.into_iter().map(FailedJobView::from).collect())
    }

    /// Return one failed item to pending.
    pub async fn retry(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.queue.retry_failed(job_id).await?;
        tracing::info!(job_id = %job_id, "Failed job queued for retry");
        Ok(())
    }

    /// Purge every failed item.
    pub async fn clear_failed(&self) -> Result<u64, QueueError> {
        let removed = self.queue.flush_failed().await?;
        tracing::info!(removed, "Failed jobs cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::cache::LocalStatsCache;
    use crate::queue::MemoryJobQueue;

    const TTL: Duration = Duration::from_secs(60);

    fn monitor(queue: Arc<MemoryJobQueue>) -> QueueMonitor {
        QueueMonitor::new(queue, Arc::new(LocalStatsCache::new()))
    }

    async fn failed_job(queue: &MemoryJobQueue) -> Uuid {
        queue
            .push("default", JobKind::TaskAssigned, json!({}))
            .await
            .unwrap();
        let job = queue.reserve("default", TTL).await.unwrap().unwrap();
        queue.fail(&job, "Connection refused").await.unwrap();
        job.id
    }

    #[tokio::test]
    async fn test_stats_are_cached() {
        let queue = Arc::new(MemoryJobQueue::new());
        let monitor = monitor(queue.clone());
        queue
            .push("default", JobKind::TaskAssigned, json!({}))
            .await
            .unwrap();

        let first = monitor.stats().await.unwrap();
        assert_eq!(first.pending_jobs, 1);
        assert_eq!(first.email_jobs, 1);

        queue
            .push("default", JobKind::TaskAssigned, json!({}))
            .await
            .unwrap();
        let second = monitor.stats().await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_failed_item_views() {
        let queue = Arc::new(MemoryJobQueue::new());
        let monitor = monitor(queue.clone());
        let id = failed_job(&queue).await;

        let failed = monitor.list_failed(API_LIST_LIMIT).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, id);
        assert_eq!(failed[0].exception, "Connection refused");
        assert!(monitor.list_pending(API_LIST_LIMIT).await.unwrap().is_empty());

        let stats = monitor.stats().await.unwrap();
        assert_eq!(stats.failed_jobs, 1);
        assert_eq!(stats.failed_email_jobs, 1);
    }

    #[tokio::test]
    async fn test_retry_returns_item_to_pending() {
        let queue = Arc::new(MemoryJobQueue::new());
        let monitor = monitor(queue.clone());
        let id = failed_job(&queue).await;

        monitor.retry(id).await.unwrap();

        let pending = monitor.list_pending(API_LIST_LIMIT).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert!(monitor.list_failed(API_LIST_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_unknown_job_is_reported() {
        let monitor = monitor(Arc::new(MemoryJobQueue::new()));
        assert!(matches!(
            monitor.retry(Uuid::new_v4()).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_failed_empties_store() {
        let queue = Arc::new(MemoryJobQueue::new());
        let monitor = monitor(queue.clone());
        failed_job(&queue).await;
        failed_job(&queue).await;

        assert_eq!(monitor.clear_failed().await.unwrap(), 2);
        assert!(monitor.list_failed(API_LIST_LIMIT).await.unwrap().is_empty());
    }
}
