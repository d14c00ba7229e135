use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use taskmail_common::types::{FailedJob, JobKind, QueuedJob};

use super::{JobQueue, QueueError, to_chrono};

#[derive(Default)]
struct Store {
    jobs: Vec<QueuedJob>,
    failed: Vec<FailedJob>,
}

/// In-process queue with the same semantics as [`super::PgJobQueue`].
///
/// Not durable: items are lost when the process exits. Used by the API when
/// `QUEUE_CONNECTION=memory` and by tests.
#[derive(Default)]
pub struct MemoryJobQueue {
    store: Mutex<Store>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn push(
        &self,
        queue: &str,
        kind: JobKind,
        payload: serde_json::Value,
    ) -> Result<Uuid, QueueError> {
        let now = Utc::now();
        let job = QueuedJob {
            id: Uuid::new_v4(),
            queue: queue.to_string(),
            kind,
            payload,
            attempts: 0,
            reserved_at: None,
            available_at: now,
            created_at: now,
        };
        let id = job.id;
        self.store.lock().await.jobs.push(job);
        Ok(id)
    }

    async fn reserve(
        &self,
        queue: &str,
        reservation_timeout: Duration,
    ) -> Result<Option<QueuedJob>, QueueError> {
        let now = Utc::now();
        let abandoned_before = now - to_chrono(reservation_timeout);
        let mut store = self.store.lock().await;

        let next = store
            .jobs
            .iter_mut()
            .filter(|job| job.queue == queue)
            .filter(|job| match job.reserved_at {
                None => job.available_at <= now,
                Some(reserved_at) => reserved_at <= abandoned_before,
            })
            .min_by_key(|job| (job.available_at, job.created_at));

        Ok(next.map(|job| {
            job.reserved_at = Some(now);
            job.attempts += 1;
            job.clone()
        }))
    }

    async fn delete(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.store.lock().await.jobs.retain(|job| job.id != job_id);
        Ok(())
    }

    async fn release(&self, job_id: Uuid, delay: Duration) -> Result<(), QueueError> {
        let mut store = self.store.lock().await;
        let job = store
            .jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or(QueueError::NotFound(job_id))?;
        job.reserved_at = None;
        job.available_at = Utc::now() + to_chrono(delay);
        Ok(())
    }

    async fn fail(&self, job: &QueuedJob, exception: &str) -> Result<(), QueueError> {
        let mut store = self.store.lock().await;
        store.jobs.retain(|j| j.id != job.id);
        store.failed.push(FailedJob {
            id: job.id,
            queue: job.queue.clone(),
            kind: job.kind,
            payload: job.payload.clone(),
            exception: exception.to_string(),
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn pending_count(&self, kind: Option<JobKind>) -> Result<i64, QueueError> {
        let store = self.store.lock().await;
        let count = store
            .jobs
            .iter()
            .filter(|job| kind.is_none_or(|k| job.kind == k))
            .count();
        Ok(count as i64)
    }

    async fn failed_count(&self, kind: Option<JobKind>) -> Result<i64, QueueError> {
        let store = self.store.lock().await;
        let count = store
            .failed
            .iter()
            .filter(|job| kind.is_none_or(|k| job.kind == k))
            .count();
        Ok(count as i64)
    }

    async fn recent_pending(
        &self,
        kind: JobKind,
        limit: i64,
    ) -> Result<Vec<QueuedJob>, QueueError> {
        let store = self.store.lock().await;
        let mut jobs: Vec<QueuedJob> = store
            .jobs
            .iter()
            .filter(|job| job.kind == kind)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn recent_failed(&self, kind: JobKind, limit: i64) -> Result<Vec<FailedJob>, QueueError> {
        let store = self.store.lock().await;
        let mut jobs: Vec<FailedJob> = store
            .failed
            .iter()
            .filter(|job| job.kind == kind)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn retry_failed(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut store = self.store.lock().await;
        let index = store
            .failed
            .iter()
            .position(|job| job.id == job_id)
            .ok_or(QueueError::NotFound(job_id))?;
        let failed = store.failed.remove(index);
        let now = Utc::now();
        store.jobs.push(QueuedJob {
            id: failed.id,
            queue: failed.queue,
            kind: failed.kind,
            payload: failed.payload,
            attempts: 0,
            reserved_at: None,
            available_at: now,
            created_at: now,
        });
        Ok(())
    }

    async fn flush_failed(&self) -> Result<u64, QueueError> {
        let mut store = self.store.lock().await;
        let removed = store.failed.len() as u64;
        store.failed.clear();
        Ok(removed)
    }
}
