//! Queue worker: drains notification work items under the retry policy.
//!
//! Each claimed item is attempted once. Success deletes it, a failure either
//! releases it with the scheduled backoff or, once the attempt cap is
//! reached, moves it to the failed store. Attempts on one item are strictly
//! sequential because the queue hands an item to one worker at a time.

use std::sync::Arc;
use std::time::Duration;

use taskmail_common::types::QueuedJob;

use crate::executor::DeliveryExecutor;
use crate::policy::{RetryDecision, RetryPolicy};
use crate::queue::{JobQueue, QueueError};
use crate::record::NotificationRecord;

/// Failure recorded for an item claimed more often than the policy allows.
pub const MAX_ATTEMPTS_EXCEEDED: &str = "Max attempts exceeded";

/// What happened to a claimed work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered,
    Released { attempts: i32, delay: Duration },
    Failed { attempts: i32 },
}

pub struct QueueWorker {
    queue: Arc<dyn JobQueue>,
    executor: Arc<DeliveryExecutor>,
    policy: RetryPolicy,
    queue_name: String,
    poll_interval: Duration,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        executor: Arc<DeliveryExecutor>,
        queue_name: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            executor,
            policy: RetryPolicy::default(),
            queue_name: queue_name.into(),
            poll_interval,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Work until the task is cancelled. Idles for the poll interval when the
    /// queue is empty or the store is unreachable.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            queue = %self.queue_name,
            driver = %self.executor.driver(),
            max_attempts = self.policy.max_attempts,
            "Queue worker started"
        );

        loop {
            match self.work_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Queue worker iteration failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Claim and process at most one item. `None` when nothing was available.
    pub async fn work_once(&self) -> Result<Option<JobOutcome>, QueueError> {
        let Some(job) = self
            .queue
            .reserve(&self.queue_name, self.policy.reservation_timeout)
            .await?
        else {
            return Ok(None);
        };

        // A worker that died mid-attempt leaves a reservation that expires and
        // gets reclaimed, so the claim count can pass the cap without a send.
        if self.policy.exceeded(job.attempts) {
            self.queue.fail(&job, MAX_ATTEMPTS_EXCEEDED).await?;
            tracing::error!(
                job_id = %job.id,
                attempts = job.attempts,
                error = MAX_ATTEMPTS_EXCEEDED,
                "Task assignment email failed after all retries"
            );
            return Ok(Some(JobOutcome::Failed {
                attempts: job.attempts,
            }));
        }

        let record = match NotificationRecord::from_payload(&job.payload) {
            Ok(record) => record,
            Err(e) => {
                // Undecodable payloads cannot succeed on retry.
                let exception = QueueError::from(e).to_string();
                tracing::error!(job_id = %job.id, error = %exception, "Discarding work item");
                self.queue.fail(&job, &exception).await?;
                return Ok(Some(JobOutcome::Failed {
                    attempts: job.attempts,
                }));
            }
        };

        let result = self.executor.attempt(&record).await;
        if result.success {
            self.queue.delete(job.id).await?;
            tracing::info!(
                job_id = %job.id,
                task_id = %record.task.id,
                user_email = %record.recipient.email,
                reassignment = record.is_reassignment(),
                attempts = job.attempts,
                "Task assignment email delivered"
            );
            return Ok(Some(JobOutcome::Delivered));
        }

        let error = result.error.unwrap_or_else(|| "unknown error".to_string());
        self.handle_failure(&job, &record, &error).await.map(Some)
    }

    async fn handle_failure(
        &self,
        job: &QueuedJob,
        record: &NotificationRecord,
        error: &str,
    ) -> Result<JobOutcome, QueueError> {
        match self.policy.decide(job.attempts) {
            RetryDecision::Retry { delay } => {
                self.queue.release(job.id, delay).await?;
                tracing::warn!(
                    job_id = %job.id,
                    task_id = %record.task.id,
                    attempts = job.attempts,
                    retry_in_secs = delay.as_secs(),
                    error = %error,
                    "Task assignment email attempt failed, will retry"
                );
                Ok(JobOutcome::Released {
                    attempts: job.attempts,
                    delay,
                })
            }
            RetryDecision::GiveUp => {
                self.queue.fail(job, error).await?;
                tracing::error!(
                    job_id = %job.id,
                    task_id = %record.task.id,
                    task_title = %record.task.title,
                    attempts = job.attempts,
                    error = %error,
                    "Task assignment email failed after all retries"
                );
                Ok(JobOutcome::Failed {
                    attempts: job.attempts,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    use crate::executor::tests::RecordingTransport;
    use crate::monitor::{API_LIST_LIMIT, QueueMonitor};
    use crate::cache::LocalStatsCache;
    use crate::queue::MemoryJobQueue;
    use crate::record::tests::{make_task, make_user};
    use taskmail_common::types::JobKind;

    const QUEUE: &str = "default";

    fn immediate_policy() -> RetryPolicy {
        RetryPolicy {
            backoff: vec![Duration::ZERO; 3],
            ..Default::default()
        }
    }

    fn worker(queue: Arc<MemoryJobQueue>, transport: Arc<RecordingTransport>) -> QueueWorker {
        let executor = Arc::new(DeliveryExecutor::new(transport, "http://localhost:3000"));
        QueueWorker::new(queue, executor, QUEUE, Duration::from_millis(10))
            .with_policy(immediate_policy())
    }

    async fn enqueue(queue: &MemoryJobQueue) -> uuid::Uuid {
        let user = make_user("jane@example.com");
        let record = NotificationRecord::new(user.clone(), make_task(&user), None);
        queue
            .push(QUEUE, record.kind(), record.to_payload().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let queue = Arc::new(MemoryJobQueue::new());
        let worker = worker(queue, Arc::new(RecordingTransport::default()));
        assert_eq!(worker.work_once().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_success_removes_item() {
        let queue = Arc::new(MemoryJobQueue::new());
        let transport = Arc::new(RecordingTransport::default());
        let worker = worker(queue.clone(), transport.clone());
        enqueue(&queue).await;

        assert_eq!(worker.work_once().await.unwrap(), Some(JobOutcome::Delivered));
        assert_eq!(queue.pending_count(None).await.unwrap(), 0);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_releases_with_scheduled_backoff() {
        let queue = Arc::new(MemoryJobQueue::new());
        let transport = Arc::new(RecordingTransport::failing("Connection refused"));
        let executor = Arc::new(DeliveryExecutor::new(transport, "http://localhost:3000"));
        let worker = QueueWorker::new(queue.clone(), executor, QUEUE, Duration::from_millis(10));
        enqueue(&queue).await;

        assert_eq!(
            worker.work_once().await.unwrap(),
            Some(JobOutcome::Released {
                attempts: 1,
                delay: Duration::from_secs(60)
            })
        );
        // Not available again until the backoff elapses
        assert_eq!(worker.work_once().await.unwrap(), None);
        assert_eq!(queue.pending_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_three_failures_move_item_to_failed_store() {
        let queue = Arc::new(MemoryJobQueue::new());
        let transport = Arc::new(RecordingTransport::failing("Connection refused"));
        let worker = worker(queue.clone(), transport.clone());
        let monitor = QueueMonitor::new(queue.clone(), Arc::new(LocalStatsCache::new()));
        let id = enqueue(&queue).await;

        assert!(matches!(
            worker.work_once().await.unwrap(),
            Some(JobOutcome::Released { attempts: 1, .. })
        ));
        assert!(matches!(
            worker.work_once().await.unwrap(),
            Some(JobOutcome::Released { attempts: 2, .. })
        ));
        assert_eq!(
            worker.work_once().await.unwrap(),
            Some(JobOutcome::Failed { attempts: 3 })
        );
        assert_eq!(transport.calls(), 3);
        assert!(logs_contain("Task assignment email failed after all retries"));

        assert!(monitor.list_pending(API_LIST_LIMIT).await.unwrap().is_empty());
        let failed = monitor.list_failed(API_LIST_LIMIT).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, id);
        assert!(failed[0].exception.contains("Connection refused"));

        monitor.retry(id).await.unwrap();
        let pending = monitor.list_pending(API_LIST_LIMIT).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_reclaimed_item_past_cap_is_failed_without_sending() {
        let queue = Arc::new(MemoryJobQueue::new());
        let transport = Arc::new(RecordingTransport::default());
        let executor = Arc::new(DeliveryExecutor::new(transport.clone(), "http://localhost:3000"));
        let worker = QueueWorker::new(queue.clone(), executor, QUEUE, Duration::from_millis(10))
            .with_policy(RetryPolicy {
                reservation_timeout: Duration::ZERO,
                ..immediate_policy()
            });
        let id = enqueue(&queue).await;

        // Three claims abandoned by workers that never finished
        for _ in 0..3 {
            assert!(queue.reserve(QUEUE, Duration::ZERO).await.unwrap().is_some());
        }

        assert_eq!(
            worker.work_once().await.unwrap(),
            Some(JobOutcome::Failed { attempts: 4 })
        );
        assert_eq!(transport.calls(), 0);
        assert_eq!(queue.pending_count(None).await.unwrap(), 0);
        assert!(logs_contain("Task assignment email failed after all retries"));

        let monitor = QueueMonitor::new(queue.clone(), Arc::new(LocalStatsCache::new()));
        let failed = monitor.list_failed(API_LIST_LIMIT).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, id);
        assert_eq!(failed[0].exception, MAX_ATTEMPTS_EXCEEDED);
    }

    #[tokio::test]
    async fn test_undecodable_payload_fails_immediately() {
        let queue = Arc::new(MemoryJobQueue::new());
        let transport = Arc::new(RecordingTransport::default());
        let worker = worker(queue.clone(), transport.clone());
        queue
            .push(QUEUE, JobKind::TaskAssigned, json!({"garbage": true}))
            .await
            .unwrap();

        assert_eq!(
            worker.work_once().await.unwrap(),
            Some(JobOutcome::Failed { attempts: 1 })
        );
        assert_eq!(transport.calls(), 0);
        assert_eq!(queue.failed_count(None).await.unwrap(), 1);
    }
}
